use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::domain::entity::Value;

/// 比較演算子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            FilterOperator::Equal => "=",
            FilterOperator::NotEqual => "<>",
            FilterOperator::Greater => ">",
            FilterOperator::GreaterOrEqual => ">=",
            FilterOperator::Less => "<",
            FilterOperator::LessOrEqual => "<=",
        };
        f.write_str(op)
    }
}

/// LIKE 比較でのワイルドカードの位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchMode {
    Exact,
    Start,
    End,
    Anywhere,
}

impl MatchMode {
    pub fn matches(&self, text: &str, needle: &str) -> bool {
        match self {
            MatchMode::Exact => text == needle,
            MatchMode::Start => text.starts_with(needle),
            MatchMode::End => text.ends_with(needle),
            MatchMode::Anywhere => text.contains(needle),
        }
    }

    /// '%' を含む LIKE パターンを検索文字列とモードに分解する (先頭と末尾の '%' のみサポート)
    pub fn from_pattern(pattern: &str) -> (String, MatchMode) {
        let starts = pattern.starts_with('%');
        let ends = pattern.len() > 1 && pattern.ends_with('%');
        match (starts, ends) {
            (true, true) => (pattern[1..pattern.len() - 1].to_string(), MatchMode::Anywhere),
            (true, false) => (pattern[1..].to_string(), MatchMode::End),
            (false, true) => (pattern[..pattern.len() - 1].to_string(), MatchMode::Start),
            (false, false) => (pattern.to_string(), MatchMode::Exact),
        }
    }

    fn to_pattern(self, needle: &str) -> String {
        match self {
            MatchMode::Exact => needle.to_string(),
            MatchMode::Start => format!("{}%", needle),
            MatchMode::End => format!("%{}", needle),
            MatchMode::Anywhere => format!("%{}%", needle),
        }
    }
}

/// クエリの絞り込み条件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Criterion {
    /// 単一条件（プロパティ名、演算子、値）
    Compare {
        property: String,
        operator: FilterOperator,
        value: Value,
    },

    /// 文字列の部分一致
    Like {
        property: String,
        needle: String,
        mode: MatchMode,
    },

    /// 複数条件（ANDまたはOR）
    And(Vec<Criterion>),
    Or(Vec<Criterion>),
}

impl Criterion {
    pub fn compare(property: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        Criterion::Compare {
            property: property.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn eq(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(property, FilterOperator::Equal, value)
    }

    pub fn ne(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(property, FilterOperator::NotEqual, value)
    }

    pub fn gt(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(property, FilterOperator::Greater, value)
    }

    pub fn ge(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(property, FilterOperator::GreaterOrEqual, value)
    }

    pub fn lt(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(property, FilterOperator::Less, value)
    }

    pub fn le(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(property, FilterOperator::LessOrEqual, value)
    }

    pub fn like(property: impl Into<String>, needle: impl Into<String>, mode: MatchMode) -> Self {
        Criterion::Like {
            property: property.into(),
            needle: needle.into(),
            mode,
        }
    }

    /// 条件に現れるプロパティ名をすべて集める
    pub fn property_names(&self) -> Vec<&str> {
        match self {
            Criterion::Compare { property, .. } | Criterion::Like { property, .. } => vec![property.as_str()],
            Criterion::And(criteria) | Criterion::Or(criteria) => {
                criteria.iter().flat_map(Criterion::property_names).collect()
            }
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::Compare { property, operator, value } => {
                if let Value::Text(s) = value {
                    write!(f, "{} {} '{}'", property, operator, s)
                } else {
                    write!(f, "{} {} {}", property, operator, value)
                }
            }
            Criterion::Like { property, needle, mode } => {
                write!(f, "{} like '{}'", property, mode.to_pattern(needle))
            }
            Criterion::And(criteria) => write!(f, "({})", criteria.iter().join(" and ")),
            Criterion::Or(criteria) => write!(f, "({})", criteria.iter().join(" or ")),
        }
    }
}

use derive_more::Display;
use strum::EnumString;
use serde::{Deserialize, Serialize};
use std::fmt;


/// エンティティのプロパティがとりうるデータ型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
pub enum DataType {
    #[strum(serialize = "BOOLEAN")]
    Boolean,

    #[strum(serialize = "INTEGER")]
    Integer,

    #[strum(serialize = "LONG")]
    Long,

    #[strum(serialize = "FLOAT")]
    Float,

    #[strum(serialize = "DOUBLE")]
    Double,

    #[strum(serialize = "TEXT")]
    Text,

    #[strum(serialize = "TIMESTAMP")]
    Timestamp,

    #[strum(serialize = "NULL")]
    Null,
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Integer | DataType::Long | DataType::Float | DataType::Double)
    }

    pub fn is_text(&self) -> bool {
        matches!(self, DataType::Text)
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, DataType::Boolean)
    }

    pub fn is_timestamp(&self) -> bool {
        matches!(self, DataType::Timestamp)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DataType::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Constraint {
    // 識別子プロパティ
    Id,
    // NOT NULL 制約
    NotNull,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Id => write!(f, "ID"),
            Constraint::NotNull => write!(f, "NOT NULL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn parses_upper_case_names() {
        assert_eq!(DataType::from_str("LONG").unwrap(), DataType::Long);
        assert_eq!(DataType::from_str("TIMESTAMP").unwrap(), DataType::Timestamp);
        assert!(DataType::from_str("long").is_err());
    }

    #[test]
    fn numeric_types() {
        assert!(DataType::Double.is_numeric());
        assert!(DataType::Integer.is_numeric());
        assert!(!DataType::Text.is_numeric());
        assert!(!DataType::Timestamp.is_numeric());
    }
}

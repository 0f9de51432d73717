use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::entity::Value;
use crate::{Error, Result};

const COUNT_PREFIX: &str = "select count(*) ";

/// プレースホルダーを含むテキスト形式のクエリ
///
/// 位置パラメータ (`?`) と名前付きパラメータ (`:name`) をバインドできる。
/// 解釈はクエリ実行側に任せる。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextQuery {
    text: String,
    positional: Vec<Value>,
    named: BTreeMap<String, Value>,
    first_result: Option<usize>,
    max_results: Option<usize>,
}

impl TextQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// 0 始まりの位置にパラメータをバインドする
    pub fn bind_positional(&mut self, index: usize, value: Value) -> &mut Self {
        if self.positional.len() <= index {
            self.positional.resize(index + 1, Value::Null);
        }
        self.positional[index] = value;
        self
    }

    pub fn bind_named(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.named.insert(name.into(), value);
        self
    }

    pub fn set_first_result(&mut self, first_result: usize) -> &mut Self {
        self.first_result = Some(first_result);
        self
    }

    pub fn set_max_results(&mut self, max_results: usize) -> &mut Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn positional_params(&self) -> &[Value] {
        &self.positional
    }

    pub fn named_params(&self) -> &BTreeMap<String, Value> {
        &self.named
    }

    pub fn first_result(&self) -> Option<usize> {
        self.first_result
    }

    pub fn max_results(&self) -> Option<usize> {
        self.max_results
    }
}

/// テキストクエリから件数を数えるクエリを作る
///
/// 最初の `from` キーワードから `order by` の手前までを取り出し、`select count(*) ` を前置する。
/// 文字列の置き換えだけで行うため、範囲内にサブクエリ (`select`) を含むクエリや
/// `from` を含まないクエリはエラーにする。文字列リテラル内の `order by` も区別しない。
///
/// ```
/// use rustydao::domain::query::prepare_count_query;
///
/// let count = prepare_count_query("select u from GenericUser as u where u.age<30 order by u.age desc").unwrap();
/// assert_eq!(count, "select count(*) from GenericUser as u where u.age<30 ");
/// ```
pub fn prepare_count_query(text: &str) -> Result<String> {
    let from = find_keyword(text, "from")
        .ok_or_else(|| Error::invalid_argument(format!("query has no from clause and can not be counted: {}", text)))?;

    let range = &text[from..];
    let range = match range.find("order by") {
        Some(end) => &range[..end],
        None => range,
    };

    if find_keyword(range, "select").is_some() {
        return Err(Error::invalid_argument(format!(
            "query with a nested select can not be counted automatically: {}",
            text
        )));
    }

    Ok(format!("{}{}", COUNT_PREFIX, range))
}

/// 文字列リテラルの外にある位置プレースホルダー `?` の数を数える
pub fn count_positional_placeholders(text: &str) -> usize {
    let mut in_literal = false;
    let mut count = 0;
    for ch in text.chars() {
        match ch {
            '\'' => in_literal = !in_literal,
            '?' if !in_literal => count += 1,
            _ => {}
        }
    }
    count
}

// 単語として現れる最初のキーワードの位置
fn find_keyword(text: &str, keyword: &str) -> Option<usize> {
    text.match_indices(keyword).map(|(i, _)| i).find(|&i| {
        let before = text[..i].chars().next_back();
        let after = text[i + keyword.len()..].chars().next();
        let starts_word = before.map_or(true, |c| !(c.is_alphanumeric() || c == '_' || c == '.'));
        let ends_word = after.map_or(true, char::is_whitespace);
        starts_word && ends_word
    })
}

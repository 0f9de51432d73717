use crate::domain::entity::value::{Value, ValueError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 1行のデータを表現する
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// プロパティ名と値のマッピング
    pub values: HashMap<String, Value>,
}

impl Row {
    /// 新しい空の行を作成する
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// プロパティ名と値のペアから新しい行を作成する
    pub fn from_values(values: HashMap<String, Value>) -> Self {
        Self { values }
    }

    /// 特定のプロパティの値を取得する
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// 特定のプロパティの値を型変換して取得する
    pub fn get_as<'a, T>(&'a self, name: &str) -> Result<T, ValueError>
    where
        T: TryFrom<&'a Value, Error = ValueError>,
    {
        let value = self.values.get(name).ok_or(ValueError::NullValueNotAllowed)?;
        T::try_from(value)
    }

    /// 特定のプロパティの値を設定する
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// ビルダーパターンで値を設定する
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value.into());
        self
    }

    /// 指定したプロパティだけを残した行を作成する
    pub fn project(&self, names: &[String]) -> Row {
        let values = names
            .iter()
            .map(|name| (name.clone(), self.values.get(name).cloned().unwrap_or(Value::Null)))
            .collect();
        Row { values }
    }
}

impl Default for Row {
    fn default() -> Self {
        Self::new()
    }
}

/// クエリ結果の行から型付きの値を組み立てる
pub trait FromRow: Sized {
    fn from_row(row: Row) -> Result<Self, ValueError>;
}

impl FromRow for Row {
    fn from_row(row: Row) -> Result<Self, ValueError> {
        Ok(row)
    }
}

/// 保存のために型付きの値を行に変換する
pub trait ToRow {
    fn to_row(&self) -> Row;
}

impl ToRow for Row {
    fn to_row(&self) -> Row {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_access() {
        let row = Row::new().with("name", "jo").with("age", 30);

        assert_eq!(row.get_as::<String>("name").unwrap(), "jo");
        assert_eq!(row.get_as::<i64>("age").unwrap(), 30);
        assert_eq!(row.get_as::<i32>("missing"), Err(ValueError::NullValueNotAllowed));
        assert!(row.get_as::<bool>("name").is_err());
    }

    #[test]
    fn projection_fills_missing_with_null() {
        let row = Row::new().with("name", "jo").with("age", 30);
        let projected = row.project(&["name".to_string(), "email".to_string()]);

        assert_eq!(projected.values.len(), 2);
        assert_eq!(projected.get("name"), Some(&Value::Text("jo".into())));
        assert_eq!(projected.get("email"), Some(&Value::Null));
    }
}

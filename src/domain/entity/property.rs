use crate::domain::entity::data_type::{DataType, Constraint};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use std::fmt;

/// エンティティのプロパティ定義
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct Property {
    /// プロパティ名
    #[builder(setter(into))]
    pub name: String,

    /// データ型
    pub data_type: DataType,

    /// 制約
    #[builder(default)]
    pub constraints: Vec<Constraint>,
}

impl Property {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            constraints: Vec::new(),
        }
    }

    // identifier property
    pub fn id(mut self) -> Self {
        self.constraints.push(Constraint::Id);
        self.constraints.push(Constraint::NotNull); // 識別子は not null 制約を持つ
        self
    }

    // NOT NULL constraint
    pub fn not_null(mut self) -> Self {
        if !self.constraints.contains(&Constraint::NotNull) {
            self.constraints.push(Constraint::NotNull);
        }
        self
    }

    /// このプロパティが識別子かどうかをチェックする
    pub fn is_id(&self) -> bool {
        self.constraints.contains(&Constraint::Id)
    }

    /// このプロパティがNOT NULL制約を持つかどうかをチェックする
    pub fn is_not_null(&self) -> bool {
        self.constraints.contains(&Constraint::NotNull)
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.data_type)?;
        for constraint in &self.constraints {
            write!(f, " {}", constraint)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_property_is_not_null() {
        let property = Property::new("id", DataType::Long).id();
        assert!(property.is_id());
        assert!(property.is_not_null());
        assert_eq!(property.to_string(), "id Long ID NOT NULL");
    }

    #[test]
    fn builder_defaults_to_no_constraints() {
        let property = Property::builder().name("name").data_type(DataType::Text).build();
        assert!(property.constraints.is_empty());
        assert!(!property.is_id());
    }
}

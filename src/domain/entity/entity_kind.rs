use crate::domain::entity::property::Property;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum EntityKindError {
    #[error("Property '{0}' already exists in entity")]
    PropertyAlreadyExists(String),

    #[error("Property '{0}' not found in entity")]
    PropertyNotFound(String),

    #[error("Entity must have at least one property")]
    NoProperties,

    #[error("Multiple identifier properties not allowed")]
    MultipleIds,
}

/// リポジトリが扱うエンティティの種類
/// 型パラメータからの推論ではなく、明示的にリポジトリへ渡す
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityKind {
    // entity name
    pub name: String,

    // entity properties
    pub properties: Vec<Property>,
}

impl EntityKind {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    pub fn add_property(&mut self, property: Property) -> Result<(), EntityKindError> {
        // 同名のプロパティが既に存在するかチェック
        if self.get_property(&property.name).is_some() {
            return Err(EntityKindError::PropertyAlreadyExists(property.name));
        }
        // 識別子は1つだけ
        if property.is_id() && self.id_property().is_some() {
            return Err(EntityKindError::MultipleIds);
        }

        self.properties.push(property);
        Ok(())
    }

    /// ビルダーパターンでプロパティを追加する
    pub fn with_property(mut self, property: Property) -> Result<Self, EntityKindError> {
        self.add_property(property)?;
        Ok(self)
    }

    /// 名前でプロパティを検索する
    pub fn get_property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// 識別子プロパティを取得する
    pub fn id_property(&self) -> Option<&Property> {
        self.properties.iter().find(|p| p.is_id())
    }

    /// エンティティ定義が有効かチェックする
    pub fn validate(&self) -> Result<(), EntityKindError> {
        if self.properties.is_empty() {
            return Err(EntityKindError::NoProperties);
        }

        Ok(())
    }

    pub fn property_names(&self) -> Vec<&str> {
        self.properties.iter().map(|p| p.name.as_str()).collect()
    }
}

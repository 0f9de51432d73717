use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::domain::entity::{DataType, EntityKind, EntityKindError, Property, Row, Value, ValueError};
use crate::domain::query::{Criterion, FilterOperator};
use crate::domain::repository::ExecutionError;
use thiserror::Error;

/// ストレージエラー
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Entity {0} not found")]
    EntityNotFound(String),

    #[error("Entity {0} already exists")]
    EntityAlreadyExists(String),

    #[error("Invalid entity definition: {0}")]
    InvalidEntity(#[from] EntityKindError),

    #[error("Property {0} not found in entity {1}")]
    PropertyNotFound(String, String),

    #[error("Invalid value for property {0}: {1}")]
    InvalidValue(String, ValueError),

    #[error("Not null constraint violation for property {0}")]
    NotNullViolation(String),

    #[error("Duplicate id {0}")]
    IdViolation(Value),

    #[error("Id property {0} can not be updated")]
    IdUpdate(String),

    #[error("Internal storage error: {0}")]
    Internal(String),
}

impl From<StorageError> for ExecutionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::EntityNotFound(name) => ExecutionError::EntityNotFound(name),
            StorageError::PropertyNotFound(property, entity) => ExecutionError::PropertyNotFound(property, entity),
            other => ExecutionError::StorageError(other.to_string()),
        }
    }
}

/// エンティティのデータを保持する構造体
#[derive(Debug, Clone)]
struct EntityData {
    kind: EntityKind,
    rows: Vec<Row>,
}

impl EntityData {
    fn new(kind: EntityKind) -> Self {
        Self { kind, rows: Vec::new() }
    }

    fn property(&self, name: &str) -> Result<&Property, StorageError> {
        self.kind
            .get_property(name)
            .ok_or_else(|| StorageError::PropertyNotFound(name.to_string(), self.kind.name.clone()))
    }

    // 値をプロパティの型に合わせて変換する
    fn coerce(&self, name: &str, value: &Value) -> Result<Value, StorageError> {
        let property = self.property(name)?;
        if value.is_null() && (property.is_not_null() || property.is_id()) {
            return Err(StorageError::NotNullViolation(name.to_string()));
        }
        value
            .cast_to(property.data_type)
            .map_err(|e| StorageError::InvalidValue(name.to_string(), e))
    }

    fn validate_row(&self, row: Row) -> Result<Row, StorageError> {
        // 定義にないプロパティは受け付けない
        for name in row.values.keys() {
            self.property(name)?;
        }

        let mut validated = Row::new();
        for property in &self.kind.properties {
            let value = row.get(&property.name).unwrap_or(&Value::Null);
            validated.set(property.name.clone(), self.coerce(&property.name, value)?);
        }
        Ok(validated)
    }

    fn insert_row(&mut self, row: Row) -> Result<(), StorageError> {
        let row = self.validate_row(row)?;

        if let Some(id) = self.kind.id_property() {
            if let Some(value) = row.get(&id.name) {
                let duplicated = self
                    .rows
                    .iter()
                    .any(|existing| existing.get(&id.name).map_or(false, |v| v.sql_eq(value)));
                if duplicated {
                    return Err(StorageError::IdViolation(value.clone()));
                }
            }
        }

        self.rows.push(row);
        Ok(())
    }

    // id が一致する行は置き換え、なければ末尾に追加する
    fn save_row(&mut self, row: Row) -> Result<(), StorageError> {
        let row = self.validate_row(row)?;

        let position = self.kind.id_property().and_then(|id| {
            let value = row.get(&id.name)?;
            self.rows
                .iter()
                .position(|existing| existing.get(&id.name).map_or(false, |v| v.sql_eq(value)))
        });
        match position {
            Some(idx) => self.rows[idx] = row,
            None => self.rows.push(row),
        }
        Ok(())
    }

    /// 条件に現れるプロパティがすべて定義されているか確認する
    fn check_criteria(&self, criteria: &[Criterion]) -> Result<(), StorageError> {
        for name in criteria.iter().flat_map(Criterion::property_names) {
            self.property(name)?;
        }
        Ok(())
    }

    fn matches_all(&self, row: &Row, criteria: &[Criterion]) -> bool {
        criteria.iter().all(|c| self.eval_criterion(row, c))
    }

    fn eval_criterion(&self, row: &Row, criterion: &Criterion) -> bool {
        match criterion {
            Criterion::Compare { property, operator, value } => {
                let row_value = match row.get(property) {
                    Some(v) => v,
                    None => return false,
                };
                // 比較値はプロパティの型に揃える。揃えられなければそのまま比べる
                let value = self
                    .kind
                    .get_property(property)
                    .and_then(|p| value.cast_to(p.data_type).ok())
                    .unwrap_or_else(|| value.clone());

                let ordering = match row_value.compare(&value) {
                    Some(ordering) => ordering,
                    None => return false,
                };
                match operator {
                    FilterOperator::Equal => ordering.is_eq(),
                    FilterOperator::NotEqual => ordering.is_ne(),
                    FilterOperator::Greater => ordering.is_gt(),
                    FilterOperator::GreaterOrEqual => ordering.is_ge(),
                    FilterOperator::Less => ordering.is_lt(),
                    FilterOperator::LessOrEqual => ordering.is_le(),
                }
            }
            Criterion::Like { property, needle, mode } => match row.get(property) {
                Some(Value::Text(text)) => mode.matches(text, needle),
                _ => false,
            },
            Criterion::And(criteria) => criteria.iter().all(|c| self.eval_criterion(row, c)),
            Criterion::Or(criteria) => criteria.iter().any(|c| self.eval_criterion(row, c)),
        }
    }

    fn update_rows(&mut self, updates: &[(String, Value)], criteria: &[Criterion]) -> Result<usize, StorageError> {
        // 更新前に値を検証する
        let mut coerced = Vec::with_capacity(updates.len());
        for (name, value) in updates {
            if self.property(name)?.is_id() {
                return Err(StorageError::IdUpdate(name.clone()));
            }
            coerced.push((name.clone(), self.coerce(name, value)?));
        }

        let indices_to_update = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| self.matches_all(row, criteria))
            .map(|(i, _)| i)
            .collect::<Vec<_>>();

        for idx in &indices_to_update {
            if let Some(row) = self.rows.get_mut(*idx) {
                for (name, value) in &coerced {
                    row.set(name.clone(), value.clone());
                }
            }
        }

        Ok(indices_to_update.len())
    }

    fn delete_rows(&mut self, criteria: &[Criterion]) -> usize {
        let initial_len = self.rows.len();
        let rows = std::mem::take(&mut self.rows);
        self.rows = rows.into_iter().filter(|row| !self.matches_all(row, criteria)).collect();
        initial_len - self.rows.len()
    }
}

/// インメモリストレージの実装
///
/// エンティティごとに行を登録順で保持する。条件はすべて AND で評価する。
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entities: RwLock<HashMap<String, EntityData>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, EntityData>>, StorageError> {
        self.entities
            .read()
            .map_err(|e| StorageError::Internal(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, EntityData>>, StorageError> {
        self.entities
            .write()
            .map_err(|e| StorageError::Internal(format!("lock poisoned: {}", e)))
    }

    /// エンティティの種類を登録する
    pub fn register_entity(&self, kind: EntityKind) -> Result<(), StorageError> {
        kind.validate()?;
        let mut entities = self.write()?;

        if entities.contains_key(&kind.name) {
            return Err(StorageError::EntityAlreadyExists(kind.name));
        }

        entities.insert(kind.name.clone(), EntityData::new(kind));
        Ok(())
    }

    pub fn entity_exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.read()?.contains_key(name))
    }

    /// エンティティの定義を取得する
    pub fn get_entity(&self, name: &str) -> Result<EntityKind, StorageError> {
        let entities = self.read()?;
        entities
            .get(name)
            .map(|data| data.kind.clone())
            .ok_or_else(|| StorageError::EntityNotFound(name.to_string()))
    }

    /// 登録されているエンティティ名を名前順で取得する
    pub fn entity_names(&self) -> Result<Vec<String>, StorageError> {
        let mut names: Vec<String> = self.read()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// 行を挿入する
    pub fn insert_row(&self, entity: &str, row: Row) -> Result<(), StorageError> {
        let mut entities = self.write()?;
        let data = entities
            .get_mut(entity)
            .ok_or_else(|| StorageError::EntityNotFound(entity.to_string()))?;

        data.insert_row(row)
    }

    /// 複数行を挿入する
    pub fn insert_rows(&self, entity: &str, rows: Vec<Row>) -> Result<(), StorageError> {
        let mut entities = self.write()?;
        let data = entities
            .get_mut(entity)
            .ok_or_else(|| StorageError::EntityNotFound(entity.to_string()))?;

        for row in rows {
            data.insert_row(row)?;
        }
        Ok(())
    }

    /// 行を保存する。同じ id の行があれば置き換える
    pub fn save_row(&self, entity: &str, row: Row) -> Result<(), StorageError> {
        let mut entities = self.write()?;
        let data = entities
            .get_mut(entity)
            .ok_or_else(|| StorageError::EntityNotFound(entity.to_string()))?;

        data.save_row(row)
    }

    /// 条件に合う行を登録順で取得する
    pub fn select_rows(&self, entity: &str, criteria: &[Criterion]) -> Result<Vec<Row>, StorageError> {
        let entities = self.read()?;
        let data = entities
            .get(entity)
            .ok_or_else(|| StorageError::EntityNotFound(entity.to_string()))?;
        data.check_criteria(criteria)?;

        Ok(data
            .rows
            .iter()
            .filter(|row| data.matches_all(row, criteria))
            .cloned()
            .collect())
    }

    /// プロパティの型を取得する
    pub fn property_type(&self, entity: &str, property: &str) -> Result<DataType, StorageError> {
        let entities = self.read()?;
        let data = entities
            .get(entity)
            .ok_or_else(|| StorageError::EntityNotFound(entity.to_string()))?;
        Ok(data.property(property)?.data_type)
    }

    /// 条件に合う行を更新し、更新した行数を返す
    pub fn update_rows(
        &self,
        entity: &str,
        updates: &[(String, Value)],
        criteria: &[Criterion],
    ) -> Result<usize, StorageError> {
        let mut entities = self.write()?;
        let data = entities
            .get_mut(entity)
            .ok_or_else(|| StorageError::EntityNotFound(entity.to_string()))?;
        data.check_criteria(criteria)?;

        data.update_rows(updates, criteria)
    }

    /// 条件に合う行を削除し、削除した行数を返す
    pub fn delete_rows(&self, entity: &str, criteria: &[Criterion]) -> Result<usize, StorageError> {
        let mut entities = self.write()?;
        let data = entities
            .get_mut(entity)
            .ok_or_else(|| StorageError::EntityNotFound(entity.to_string()))?;
        data.check_criteria(criteria)?;

        Ok(data.delete_rows(criteria))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::query::MatchMode;

    fn storage() -> MemoryStorage {
        let storage = MemoryStorage::new();
        let kind = EntityKind::new("GenericUser")
            .with_property(Property::new("id", DataType::Long).id())
            .unwrap()
            .with_property(Property::new("name", DataType::Text).not_null())
            .unwrap()
            .with_property(Property::new("age", DataType::Integer))
            .unwrap();
        storage.register_entity(kind).unwrap();
        storage
            .insert_rows(
                "GenericUser",
                vec![
                    Row::new().with("id", 1i64).with("name", "john").with("age", 31),
                    Row::new().with("id", 2i64).with("name", "jodie").with("age", 24),
                    Row::new().with("id", 3i64).with("name", "ken"),
                ],
            )
            .unwrap();
        storage
    }

    #[test]
    fn coerces_and_fills_missing_properties() {
        let storage = storage();
        let rows = storage.select_rows("GenericUser", &[Criterion::eq("id", 3)]).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&Value::Long(3)));
        assert_eq!(rows[0].get("age"), Some(&Value::Null));
    }

    #[test]
    fn null_never_matches_comparisons() {
        let storage = storage();
        let young = storage.select_rows("GenericUser", &[Criterion::lt("age", 30)]).unwrap();
        let not_31 = storage.select_rows("GenericUser", &[Criterion::ne("age", 31)]).unwrap();

        assert_eq!(young.len(), 1);
        assert_eq!(not_31.len(), 1);
    }

    #[test]
    fn or_group_and_like() {
        let storage = storage();
        let criteria = [Criterion::Or(vec![
            Criterion::like("name", "ke", MatchMode::Start),
            Criterion::gt("age", 30),
        ])];
        let rows = storage.select_rows("GenericUser", &criteria).unwrap();

        let names: Vec<_> = rows.iter().filter_map(|r| r.get("name").and_then(Value::as_str)).collect();
        assert_eq!(names, vec!["john", "ken"]);
    }

    #[test]
    fn rejects_unknown_properties() {
        let storage = storage();
        let err = storage.select_rows("GenericUser", &[Criterion::eq("nickname", "jo")]).unwrap_err();
        assert!(matches!(err, StorageError::PropertyNotFound(ref p, _) if p == "nickname"));
    }

    #[test]
    fn rejects_duplicate_ids_and_missing_names() {
        let storage = storage();
        let duplicate = Row::new().with("id", 1i64).with("name", "again");
        let nameless = Row::new().with("id", 9i64);

        assert!(matches!(storage.insert_row("GenericUser", duplicate), Err(StorageError::IdViolation(_))));
        assert!(matches!(storage.insert_row("GenericUser", nameless), Err(StorageError::NotNullViolation(_))));
    }

    #[test]
    fn updates_and_deletes_matching_rows() {
        let storage = storage();

        let updated = storage
            .update_rows("GenericUser", &[("age".to_string(), Value::from(40))], &[Criterion::eq("name", "ken")])
            .unwrap();
        assert_eq!(updated, 1);

        let deleted = storage.delete_rows("GenericUser", &[Criterion::ge("age", 31)]).unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(storage.select_rows("GenericUser", &[]).unwrap().len(), 1);
    }

    #[test]
    fn save_replaces_in_place_or_appends() {
        let storage = storage();
        storage
            .save_row("GenericUser", Row::new().with("id", 2i64).with("name", "jodie").with("age", 25))
            .unwrap();
        storage
            .save_row("GenericUser", Row::new().with("id", 4i64).with("name", "lisa"))
            .unwrap();

        let rows = storage.select_rows("GenericUser", &[]).unwrap();
        let ids: Vec<_> = rows.iter().filter_map(|r| r.get("id").and_then(Value::as_i64)).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(rows[1].get("age"), Some(&Value::Integer(25)));

        let nameless = Row::new().with("id", 1i64);
        assert!(matches!(storage.save_row("GenericUser", nameless), Err(StorageError::NotNullViolation(_))));
    }

    #[test]
    fn id_can_not_be_updated() {
        let storage = storage();
        let err = storage
            .update_rows("GenericUser", &[("id".to_string(), Value::from(5i64))], &[])
            .unwrap_err();
        assert!(matches!(err, StorageError::IdUpdate(_)));
    }

    #[test]
    fn unknown_entity() {
        let storage = MemoryStorage::new();
        assert!(matches!(storage.select_rows("Nobody", &[]), Err(StorageError::EntityNotFound(_))));
        assert!(storage.entity_names().unwrap().is_empty());
    }
}

#![allow(dead_code)]

mod counting_executor;

pub use counting_executor::CountingExecutor;

use rustydao::domain::entity::{Constraint, DataType, EntityKind, Property, Row};
use rustydao::infrastructure::storage::MemoryStorage;
use std::sync::Arc;

pub const USER: &str = "GenericUser";

pub fn user_kind() -> EntityKind {
    EntityKind::new(USER)
        .with_property(Property::new("id", DataType::Long).id())
        .and_then(|k| {
            k.with_property(
                Property::builder()
                    .name("name")
                    .data_type(DataType::Text)
                    .constraints(vec![Constraint::NotNull])
                    .build(),
            )
        })
        .and_then(|k| k.with_property(Property::builder().name("login_name").data_type(DataType::Text).build()))
        .and_then(|k| k.with_property(Property::builder().name("age").data_type(DataType::Integer).build()))
        .expect("valid entity")
}

pub fn user(id: i64, name: &str, login_name: &str, age: i32) -> Row {
    Row::new()
        .with("id", id)
        .with("name", name)
        .with("login_name", login_name)
        .with("age", age)
}

/// 既知の行を持つストレージ
pub fn seeded_storage() -> Arc<MemoryStorage> {
    let storage = Arc::new(MemoryStorage::new());
    storage.register_entity(user_kind()).expect("registered");
    storage
        .insert_rows(
            USER,
            vec![
                user(1, "john", "jsmith", 30),
                user(2, "alice", "jo_alice", 30),
                user(3, "bob", "bobby", 30),
                user(4, "joanna", "anna", 25),
                user(5, "mary", "maryjo", 30),
                user(6, "jo", "jo", 41),
                user(7, "kate", "kate", 30),
            ],
        )
        .expect("inserted");
    storage
}

pub mod data_type;
pub mod value;
pub mod property;
pub mod entity_kind;
pub mod row;
// src/domain/entity/mod.rs

pub use data_type::{DataType, Constraint};
pub use value::{Value, ValueError};
pub use property::Property;
pub use entity_kind::{EntityKind, EntityKindError};
pub use row::{Row, FromRow, ToRow};

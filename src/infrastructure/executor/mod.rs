pub mod memory_executor;

pub use memory_executor::{MemoryQueryExecutor, COUNT_PROPERTY};

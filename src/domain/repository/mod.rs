pub mod query_executor;
pub mod generic_repository;

pub use query_executor::{ExecutionError, QueryExecutor};
pub use generic_repository::GenericRepository;

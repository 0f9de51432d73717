pub mod domain;
pub mod infrastructure;
pub mod interface;

use crate::domain::orm::ParseError;
use crate::domain::repository::ExecutionError;

// RustyDAO version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// DAO result type
pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Property filter parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),
}

impl Error {
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}

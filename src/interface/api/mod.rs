pub mod handler;
pub mod server;

pub use handler::{ApiError, AppState, PageResponse, QueryRequest};
pub use server::{create_router, start_server, ServerConfig};

use std::sync::Arc;

use rustydao::domain::entity::{Constraint, DataType, EntityKind, Property, Row};
use rustydao::infrastructure::storage::MemoryStorage;
use rustydao::interface::api::{start_server, ServerConfig};
use rustydao::VERSION;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn text_property(name: &str) -> Property {
    Property::builder()
        .name(name)
        .data_type(DataType::Text)
        .constraints(vec![Constraint::NotNull])
        .build()
}

// 起動時に登録するサンプルデータ
fn seed(storage: &MemoryStorage) -> Result<(), Box<dyn std::error::Error>> {
    let kind = EntityKind::new("GenericUser")
        .with_property(Property::new("id", DataType::Long).id())?
        .with_property(text_property("name"))?
        .with_property(text_property("login_name"))?
        .with_property(Property::builder().name("age").data_type(DataType::Integer).build())?
        .with_property(Property::builder().name("registered_at").data_type(DataType::Timestamp).build())?;
    storage.register_entity(kind)?;

    let names = ["alice", "bob", "carol", "dave", "ellen", "frank", "grace", "heidi", "ivan", "judy"];
    let rows = names
        .iter()
        .zip(1i64..)
        .map(|(name, id)| {
            Row::new()
                .with("id", id)
                .with("name", *name)
                .with("login_name", format!("{}{}", name, id))
                .with("age", 18 + (id as i32 * 7) % 40)
                .with("registered_at", format!("2023-04-{:02} 09:00:00", id))
        })
        .collect();
    storage.insert_rows("GenericUser", rows)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    info!("RustyDAO version: {}", VERSION);

    let config = ServerConfig::from_env();
    let storage = Arc::new(MemoryStorage::new());
    seed(&storage)?;

    start_server(config, storage).await
}

use axum::{
    routing::{get, post},
    Extension, Router, Server,
};
use figment::{
    providers::{Env, Serialized},
    Figment,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::infrastructure::storage::MemoryStorage;
use crate::interface::api::handler::{
    find_entity_page_handler, get_entities_handler, health_check_handler, query_page_handler, AppState,
};

/// 設定を上書きする環境変数の接頭辞 (RUSTYDAO_PORT など)
const ENV_PREFIX: &str = "RUSTYDAO_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    /// page_size を指定しないリクエストのページサイズ
    pub default_page_size: i32,
    /// リクエストで指定できるページサイズの上限
    pub max_page_size: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080, // デフォルトポート番号
            default_page_size: 20,
            max_page_size: 500,
        }
    }
}

impl ServerConfig {
    /// デフォルト値に環境変数を重ねた設定ソース
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default())).merge(Env::prefixed(ENV_PREFIX))
    }

    /// 環境変数から設定を読み込む。解釈できない値はキーごとにデフォルトを使う
    pub fn from_env() -> Self {
        Self::from_figment(&Self::figment())
    }

    pub fn from_figment(figment: &Figment) -> Self {
        let defaults = Self::default();
        Self {
            port: extract_or(figment, "port", defaults.port),
            default_page_size: extract_or(figment, "default_page_size", defaults.default_page_size),
            max_page_size: extract_or(figment, "max_page_size", defaults.max_page_size),
        }
    }
}

fn extract_or<T: DeserializeOwned>(figment: &Figment, key: &str, default: T) -> T {
    figment.extract_inner(key).unwrap_or_else(|e| {
        warn!("{}{} を解釈できないため、デフォルト値を使います: {}", ENV_PREFIX, key.to_uppercase(), e);
        default
    })
}

/// ルーターを組み立てる
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check_handler))
        .route("/api/entities", get(get_entities_handler))
        .route("/api/entities/:name", get(find_entity_page_handler))
        .route("/api/entities/:name/query", post(query_page_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(Extension(state)),
        )
}

pub async fn start_server(config: ServerConfig, storage: Arc<MemoryStorage>) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = Arc::new(AppState::new(storage, config));
    let app = create_router(state);

    info!("サーバーを{}で起動中...", addr);

    // サーバーの起動
    Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.default_page_size, 20);
        assert_eq!(config.max_page_size, 500);
    }

    #[test]
    fn env_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("RUSTYDAO_PORT", "9090");
            jail.set_env("RUSTYDAO_MAX_PAGE_SIZE", "100");

            let config = ServerConfig::from_env();
            assert_eq!(config.port, 9090);
            assert_eq!(config.default_page_size, 20);
            assert_eq!(config.max_page_size, 100);
            Ok(())
        });
    }

    #[test]
    fn unparseable_env_falls_back_per_key() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("RUSTYDAO_PORT", "eighty");
            jail.set_env("RUSTYDAO_DEFAULT_PAGE_SIZE", "50");

            let config = ServerConfig::from_env();
            assert_eq!(config.port, 8080);
            assert_eq!(config.default_page_size, 50);
            Ok(())
        });
    }
}

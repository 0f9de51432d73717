use axum::{
    extract::{Extension, Json, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::domain::entity::{Row, Value};
use crate::domain::orm::{Page, PropertyFilter};
use crate::domain::repository::{ExecutionError, GenericRepository, QueryExecutor};
use crate::infrastructure::executor::MemoryQueryExecutor;
use crate::infrastructure::storage::{MemoryStorage, StorageError};
use crate::interface::api::server::ServerConfig;

/// 一覧取得でフィルターとして扱うパラメータの接頭辞 (`filter_EQ_S_name=jo`)
pub const FILTER_PREFIX: &str = "filter";

/// ハンドラー間で共有する状態
pub struct AppState {
    pub storage: Arc<MemoryStorage>,
    pub executor: Arc<dyn QueryExecutor>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(storage: Arc<MemoryStorage>, config: ServerConfig) -> Self {
        let executor: Arc<dyn QueryExecutor> = Arc::new(MemoryQueryExecutor::new(Arc::clone(&storage)));
        Self {
            storage,
            executor,
            config,
        }
    }

    fn repository(&self, entity: &str) -> Result<GenericRepository<Row>, ApiError> {
        let kind = self.storage.get_entity(entity)?;
        Ok(GenericRepository::new(Arc::clone(&self.executor), kind))
    }

    // 省略時はデフォルト、上限を超える指定は上限に丸める
    fn page_size(&self, requested: Option<i32>) -> i32 {
        requested
            .unwrap_or(self.config.default_page_size)
            .min(self.config.max_page_size)
    }
}

/// API エラー
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Dao(#[from] crate::Error),

    #[error("{0}")]
    Storage(#[from] StorageError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Storage(StorageError::EntityNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Dao(crate::Error::Parse(_)) | ApiError::Dao(crate::Error::InvalidArgument(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Dao(crate::Error::Execution(e)) => match e {
                ExecutionError::EntityNotFound(_) | ExecutionError::ObjectNotFound(_, _) => StatusCode::NOT_FOUND,
                ExecutionError::PropertyNotFound(_, _)
                | ExecutionError::MalformedQuery(_)
                | ExecutionError::UnboundParameter(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponse { error: self.to_string() });

        (status, body).into_response()
    }
}

/// エラーレスポンス
#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

/// テキストクエリのリクエスト
#[derive(Deserialize, Debug, Default)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub params: Vec<serde_json::Value>,
    #[serde(default)]
    pub named_params: HashMap<String, serde_json::Value>,
    pub page_no: Option<i32>,
    pub page_size: Option<i32>,
}

/// ページのレスポンス
#[derive(Serialize, Debug)]
pub struct PageResponse {
    pub page_no: i32,
    pub page_size: i32,
    pub total_count: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_previous: bool,
    pub result: Vec<serde_json::Value>,
}

impl From<Page<Row>> for PageResponse {
    fn from(page: Page<Row>) -> Self {
        Self {
            page_no: page.page_no(),
            page_size: page.page_size(),
            total_count: page.total_count(),
            total_pages: page.total_pages(),
            has_next: page.has_next(),
            has_previous: page.has_previous(),
            result: page.into_result().iter().map(row_to_json).collect(),
        }
    }
}

/// ヘルスチェックハンドラー
pub async fn health_check_handler() -> impl IntoResponse {
    StatusCode::OK
}

/// エンティティ一覧取得ハンドラー
pub async fn get_entities_handler(Extension(state): Extension<Arc<AppState>>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.storage.entity_names()?))
}

/// ページ単位の一覧取得ハンドラー
///
/// `page_no`, `page_size`, `order_by`, `order`, `auto_count` でページを指定し、
/// `filter_<フィルター名>` のパラメータで絞り込む。
pub async fn find_entity_page_handler(
    Path(name): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<PageResponse>, ApiError> {
    let repository = state.repository(&name)?;
    let mut page = Page::with_size(state.page_size(param(&params, "page_size")?));
    if let Some(page_no) = param(&params, "page_no")? {
        page.set_page_no(page_no);
    }
    if let Some(auto_count) = param(&params, "auto_count")? {
        page.set_auto_count(auto_count);
    }
    if let Some((_, order_by)) = params.iter().find(|(k, _)| k == "order_by") {
        page.set_order_by(order_by);
    }
    if let Some((_, order)) = params.iter().find(|(k, _)| k == "order") {
        page.set_order(order)?;
    }

    let filters = PropertyFilter::from_params(FILTER_PREFIX, params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .map_err(crate::Error::from)?;
    debug!("{} filters for {}", filters.len(), name);

    repository.find_page_by_filters(&mut page, &filters)?;
    Ok(Json(page.into()))
}

/// テキストクエリでのページ取得ハンドラー
pub async fn query_page_handler(
    Path(name): Path<String>,
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<PageResponse>, ApiError> {
    let repository = state.repository(&name)?;
    let mut page = Page::with_size(state.page_size(request.page_size));
    if let Some(page_no) = request.page_no {
        page.set_page_no(page_no);
    }

    if request.named_params.is_empty() {
        let args = request.params.iter().map(json_to_value).collect::<Result<Vec<_>, _>>()?;
        repository.find_page_text(&mut page, &request.query, &args)?;
    } else {
        let named = request
            .named_params
            .iter()
            .map(|(k, v)| Ok((k.clone(), json_to_value(v)?)))
            .collect::<Result<HashMap<_, _>, ApiError>>()?;
        repository.find_page_named(&mut page, &request.query, &named)?;
    }

    Ok(Json(page.into()))
}

fn param<T: std::str::FromStr>(params: &[(String, String)], key: &str) -> Result<Option<T>, ApiError> {
    match params.iter().find(|(k, _)| k == key) {
        Some((_, raw)) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("{} has an invalid value: {}", key, raw))),
        None => Ok(None),
    }
}

/// JSON の値をドメイン値に変換する
pub fn json_to_value(json: &serde_json::Value) -> Result<Value, ApiError> {
    match json {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(b) => Ok(Value::Boolean(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i32::try_from(i).map(Value::Integer).unwrap_or(Value::Long(i)))
            } else {
                n.as_f64()
                    .map(Value::Double)
                    .ok_or_else(|| ApiError::BadRequest(format!("unsupported number: {}", n)))
            }
        }
        serde_json::Value::String(s) => Ok(Value::Text(s.clone())),
        other => Err(ApiError::BadRequest(format!("unsupported parameter: {}", other))),
    }
}

/// ドメイン値を JSON の値に変換する
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Long(l) => serde_json::Value::from(*l),
        Value::Float(f) => serde_json::Number::from_f64(f64::from(*f))
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::String(f.to_string())),
        Value::Double(d) => serde_json::Number::from_f64(*d)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::String(d.to_string())),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Timestamp(_) => serde_json::Value::String(value.to_string()),
        Value::Null => serde_json::Value::Null,
    }
}

fn row_to_json(row: &Row) -> serde_json::Value {
    let object = row
        .values
        .iter()
        .map(|(name, value)| (name.clone(), value_to_json(value)))
        .collect::<serde_json::Map<_, _>>();
    serde_json::Value::Object(object)
}

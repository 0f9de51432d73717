use crate::domain::entity::{Row, Value, ValueError};
use crate::domain::query::{CriteriaQuery, Criterion, TextQuery};

/// クエリ実行時のエラー
#[derive(thiserror::Error, Debug)]
pub enum ExecutionError {
    #[error("Entity {0} not found")]
    EntityNotFound(String),

    #[error("Property {0} not found in entity {1}")]
    PropertyNotFound(String, String),

    #[error("Malformed query: {0}")]
    MalformedQuery(String),

    #[error("No {0} with id {1}")]
    ObjectNotFound(String, Value),

    #[error("Parameter {0} is not bound")]
    UnboundParameter(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Row mapping error: {0}")]
    RowMapping(#[from] ValueError),

    #[error("Storage error: {0}")]
    StorageError(String),
}

/// クエリ実行インターフェース
///
/// リポジトリはこのトレイトを通してのみ永続化エンジンにアクセスする。
/// 1回の呼び出しの間だけ借用され、件数取得とデータ取得は同じスレッドで順に実行される。
#[cfg_attr(test, mockall::automock)]
pub trait QueryExecutor: Send + Sync {
    /// 構造化クエリの結果をすべて取得する
    fn fetch_all(&self, query: &CriteriaQuery) -> Result<Vec<Row>, ExecutionError>;

    /// 構造化クエリの結果を1つの値として取得する。結果がなければ None
    fn fetch_scalar(&self, query: &CriteriaQuery) -> Result<Option<Value>, ExecutionError>;

    /// テキストクエリの結果をすべて取得する
    fn fetch_text(&self, query: &TextQuery) -> Result<Vec<Row>, ExecutionError>;

    /// テキストクエリの結果を1つの値として取得する
    fn fetch_text_scalar(&self, query: &TextQuery) -> Result<Option<Value>, ExecutionError>;

    /// 一括更新・削除のテキストクエリを実行し、影響を受けた行数を返す
    fn execute_update(&self, query: &TextQuery) -> Result<usize, ExecutionError>;

    /// 行を保存する。識別子が一致する行があれば置き換える
    fn save(&self, entity: &str, row: Row) -> Result<(), ExecutionError>;

    /// 条件に合う行を削除し、削除した行数を返す
    fn delete_where(&self, entity: &str, criteria: &[Criterion]) -> Result<usize, ExecutionError>;
}

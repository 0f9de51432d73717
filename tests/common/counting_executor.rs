use rustydao::domain::entity::{Row, Value};
use rustydao::domain::query::{CriteriaQuery, Criterion, TextQuery};
use rustydao::domain::repository::{ExecutionError, QueryExecutor};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// 実行されたクエリの数を数える QueryExecutor
pub struct CountingExecutor {
    pub inner: Arc<dyn QueryExecutor>,
    pub queries: Arc<AtomicUsize>,
}

impl CountingExecutor {
    pub fn new(inner: Arc<dyn QueryExecutor>, queries: Arc<AtomicUsize>) -> Self {
        Self { inner, queries }
    }

    fn count(&self) {
        self.queries.fetch_add(1, Ordering::SeqCst);
    }
}

impl QueryExecutor for CountingExecutor {
    fn fetch_all(&self, query: &CriteriaQuery) -> Result<Vec<Row>, ExecutionError> {
        self.count();
        self.inner.fetch_all(query)
    }

    fn fetch_scalar(&self, query: &CriteriaQuery) -> Result<Option<Value>, ExecutionError> {
        self.count();
        self.inner.fetch_scalar(query)
    }

    fn fetch_text(&self, query: &TextQuery) -> Result<Vec<Row>, ExecutionError> {
        self.count();
        self.inner.fetch_text(query)
    }

    fn fetch_text_scalar(&self, query: &TextQuery) -> Result<Option<Value>, ExecutionError> {
        self.count();
        self.inner.fetch_text_scalar(query)
    }

    fn execute_update(&self, query: &TextQuery) -> Result<usize, ExecutionError> {
        self.count();
        self.inner.execute_update(query)
    }

    fn save(&self, entity: &str, row: Row) -> Result<(), ExecutionError> {
        self.count();
        self.inner.save(entity, row)
    }

    fn delete_where(&self, entity: &str, criteria: &[Criterion]) -> Result<usize, ExecutionError> {
        self.count();
        self.inner.delete_where(entity, criteria)
    }
}

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::domain::entity::{Row, Value};
use crate::domain::query::{Criterion, CriteriaQuery, Order, Projection, ResultTransformer, TextQuery};
use crate::domain::repository::{ExecutionError, QueryExecutor};
use crate::infrastructure::parser::{ParsedStatement, SelectProjection, SelectStatement, TextQueryParser};
use crate::infrastructure::storage::MemoryStorage;

/// 件数の射影で返す行のプロパティ名
pub const COUNT_PROPERTY: &str = "count";

/// インメモリストレージに対するクエリ実行の実装
pub struct MemoryQueryExecutor {
    storage: Arc<MemoryStorage>,
    parser: TextQueryParser,
}

/// 射影とページングを適用する前の選択条件
struct Selection<'a> {
    entity: &'a str,
    criteria: &'a [Criterion],
    orders: &'a [Order],
    distinct: bool,
    first_result: Option<usize>,
    max_results: Option<usize>,
}

impl MemoryQueryExecutor {
    pub fn new(storage: Arc<MemoryStorage>) -> Self {
        Self {
            storage,
            parser: TextQueryParser::new(),
        }
    }

    pub fn storage(&self) -> &Arc<MemoryStorage> {
        &self.storage
    }

    fn select(&self, selection: &Selection<'_>) -> Result<Vec<Row>, ExecutionError> {
        let mut rows = self.storage.select_rows(selection.entity, selection.criteria)?;
        self.check_orders(selection.entity, selection.orders)?;

        if selection.distinct {
            let mut unique: Vec<Row> = Vec::with_capacity(rows.len());
            for row in rows {
                if !unique.contains(&row) {
                    unique.push(row);
                }
            }
            rows = unique;
        }

        // 安定ソートなので同順位の行は登録順のまま
        if !selection.orders.is_empty() {
            rows.sort_by(|a, b| compare_rows(a, b, selection.orders));
        }

        let first = selection.first_result.unwrap_or(0);
        let max = selection.max_results.unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(first).take(max).collect())
    }

    fn count(&self, selection: &Selection<'_>) -> Result<Row, ExecutionError> {
        let rows = self.storage.select_rows(selection.entity, selection.criteria)?;
        let count = i64::try_from(rows.len()).map_err(|e| ExecutionError::DataError(e.to_string()))?;
        Ok(Row::new().with(COUNT_PROPERTY, count))
    }

    fn check_orders(&self, entity: &str, orders: &[Order]) -> Result<(), ExecutionError> {
        for order in orders {
            self.storage.property_type(entity, &order.property)?;
        }
        Ok(())
    }

    fn project(&self, entity: &str, rows: Vec<Row>, names: &[String]) -> Result<Vec<Row>, ExecutionError> {
        for name in names {
            self.storage.property_type(entity, name)?;
        }
        Ok(rows.iter().map(|row| row.project(names)).collect())
    }

    fn run_select(&self, statement: &SelectStatement, query: &TextQuery) -> Result<Vec<Row>, ExecutionError> {
        let selection = Selection {
            entity: &statement.entity,
            criteria: &statement.criteria,
            orders: &statement.orders,
            distinct: false,
            first_result: query.first_result(),
            max_results: query.max_results(),
        };

        match &statement.projection {
            SelectProjection::Count => Ok(vec![self.count(&selection)?]),
            SelectProjection::Entity => self.select(&selection),
            SelectProjection::Properties(names) => {
                let rows = self.select(&selection)?;
                self.project(&statement.entity, rows, names)
            }
        }
    }

    fn parse_select(&self, query: &TextQuery) -> Result<SelectStatement, ExecutionError> {
        match self.parser.parse(query)? {
            ParsedStatement::Select(select) => Ok(select),
            _ => Err(ExecutionError::MalformedQuery(format!(
                "expected a select query: {}",
                query.text()
            ))),
        }
    }
}

impl QueryExecutor for MemoryQueryExecutor {
    fn fetch_all(&self, query: &CriteriaQuery) -> Result<Vec<Row>, ExecutionError> {
        debug!("Executing {}", query);
        let selection = Selection {
            entity: query.entity(),
            criteria: query.criteria(),
            orders: query.orders(),
            distinct: query.result_transformer() == Some(ResultTransformer::DistinctRootEntity),
            first_result: query.first_result(),
            max_results: query.max_results(),
        };

        match query.projection() {
            Some(Projection::RowCount) => Ok(vec![self.count(&selection)?]),
            Some(Projection::Properties(names)) => {
                let rows = self.select(&selection)?;
                self.project(query.entity(), rows, names)
            }
            None => self.select(&selection),
        }
    }

    fn fetch_scalar(&self, query: &CriteriaQuery) -> Result<Option<Value>, ExecutionError> {
        let column = match query.projection() {
            Some(Projection::RowCount) => COUNT_PROPERTY.to_string(),
            Some(Projection::Properties(names)) if names.len() == 1 => names[0].clone(),
            _ => {
                return Err(ExecutionError::MalformedQuery(format!(
                    "scalar query must project a single value: {}",
                    query
                )))
            }
        };

        let rows = self.fetch_all(query)?;
        Ok(rows.into_iter().next().and_then(|row| row.get(&column).cloned()))
    }

    fn fetch_text(&self, query: &TextQuery) -> Result<Vec<Row>, ExecutionError> {
        debug!("Executing {}", query.text());
        let statement = self.parse_select(query)?;
        self.run_select(&statement, query)
    }

    fn fetch_text_scalar(&self, query: &TextQuery) -> Result<Option<Value>, ExecutionError> {
        let statement = self.parse_select(query)?;
        let column = match &statement.projection {
            SelectProjection::Count => COUNT_PROPERTY.to_string(),
            SelectProjection::Properties(names) if names.len() == 1 => names[0].clone(),
            _ => {
                return Err(ExecutionError::MalformedQuery(format!(
                    "scalar query must project a single value: {}",
                    query.text()
                )))
            }
        };

        let rows = self.run_select(&statement, query)?;
        Ok(rows.into_iter().next().and_then(|row| row.get(&column).cloned()))
    }

    fn execute_update(&self, query: &TextQuery) -> Result<usize, ExecutionError> {
        debug!("Executing {}", query.text());
        match self.parser.parse(query)? {
            ParsedStatement::Update(update) => {
                Ok(self.storage.update_rows(&update.entity, &update.updates, &update.criteria)?)
            }
            ParsedStatement::Delete(delete) => Ok(self.storage.delete_rows(&delete.entity, &delete.criteria)?),
            ParsedStatement::Select(_) => Err(ExecutionError::MalformedQuery(format!(
                "expected an update or delete query: {}",
                query.text()
            ))),
        }
    }

    fn save(&self, entity: &str, row: Row) -> Result<(), ExecutionError> {
        debug!("Saving {} row", entity);
        Ok(self.storage.save_row(entity, row)?)
    }

    fn delete_where(&self, entity: &str, criteria: &[Criterion]) -> Result<usize, ExecutionError> {
        debug!("Deleting {} rows", entity);
        Ok(self.storage.delete_rows(entity, criteria)?)
    }
}

// ソートキーを宣言順に比較する。NULL は他のどの値よりも小さい
fn compare_rows(a: &Row, b: &Row, orders: &[Order]) -> Ordering {
    for order in orders {
        let left = a.get(&order.property).unwrap_or(&Value::Null);
        let right = b.get(&order.property).unwrap_or(&Value::Null);
        let ordering = match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => left.compare(right).unwrap_or(Ordering::Equal),
        };
        let ordering = if order.is_ascending() { ordering } else { ordering.reverse() };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

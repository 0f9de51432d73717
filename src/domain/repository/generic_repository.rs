use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::entity::{EntityKind, FromRow, Row, ToRow, Value};
use crate::domain::orm::{MatchType, Page, PropertyFilter};
use crate::domain::query::{
    build_criterion, build_from_filters, count_positional_placeholders, prepare_count_query, CriteriaQuery,
    Criterion, Order, TextQuery,
};
use crate::domain::repository::query_executor::{ExecutionError, QueryExecutor};
use crate::{Error, Result};

/// エンティティ1種類に対する汎用リポジトリ
///
/// 検索条件の組み立てとページングを担当し、実際のクエリ実行は [`QueryExecutor`] に委ねる。
/// 呼び出しごとに状態を持たないため、同じインスタンスを複数のリクエストで共有できる。
pub struct GenericRepository<T> {
    executor: Arc<dyn QueryExecutor>,
    entity: EntityKind,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for GenericRepository<T> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            entity: self.entity.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: FromRow> GenericRepository<T> {
    pub fn new(executor: Arc<dyn QueryExecutor>, entity: EntityKind) -> Self {
        Self {
            executor,
            entity,
            _marker: PhantomData,
        }
    }

    pub fn entity(&self) -> &EntityKind {
        &self.entity
    }

    /// ID プロパティの名前
    pub fn id_name(&self) -> Result<&str> {
        self.entity
            .id_property()
            .map(|p| p.name.as_str())
            .ok_or_else(|| Error::invalid_argument(format!("entity {} has no id property", self.entity.name)))
    }

    /// 条件を AND 結合した構造化クエリを作る
    pub fn create_criteria(&self, criteria: &[Criterion]) -> CriteriaQuery {
        let mut query = CriteriaQuery::new(self.entity.name.clone());
        for criterion in criteria {
            query.add(criterion.clone());
        }
        query
    }

    /// ID でエンティティを1件取得する
    pub fn get(&self, id: impl Into<Value>) -> Result<Option<T>> {
        let id_name = self.id_name()?.to_string();
        self.find_unique_by(&id_name, id)
    }

    /// ID でエンティティを1件取得する。存在しなければエラー
    pub fn load(&self, id: impl Into<Value>) -> Result<T> {
        let id = id.into();
        self.get(id.clone())?
            .ok_or_else(|| ExecutionError::ObjectNotFound(self.entity.name.clone(), id).into())
    }

    /// ID でエンティティを削除する。存在しなければエラー
    pub fn delete_by_id(&self, id: impl Into<Value>) -> Result<()> {
        let id = id.into();
        let id_name = self.id_name()?;
        let deleted = self
            .executor
            .delete_where(&self.entity.name, &[Criterion::eq(id_name, id.clone())])?;
        if deleted == 0 {
            return Err(ExecutionError::ObjectNotFound(self.entity.name.clone(), id).into());
        }
        debug!("Deleted {} entity, id is {}", self.entity.name, id);
        Ok(())
    }

    pub fn get_all(&self) -> Result<Vec<T>> {
        self.find(&[])
    }

    pub fn get_all_ordered(&self, property: &str, ascending: bool) -> Result<Vec<T>> {
        let mut query = self.create_criteria(&[]);
        let order = if ascending {
            Order::asc(property)
        } else {
            Order::desc(property)
        };
        query.add_order(order);
        self.fetch(&query)
    }

    pub fn get_all_page<'p>(&self, page: &'p mut Page<T>) -> Result<&'p mut Page<T>> {
        self.find_page(page, &[])
    }

    pub fn find(&self, criteria: &[Criterion]) -> Result<Vec<T>> {
        let query = self.create_criteria(criteria);
        self.fetch(&query)
    }

    /// プロパティの値が一致するエンティティを検索する
    pub fn find_by(&self, property: &str, value: impl Into<Value>) -> Result<Vec<T>> {
        self.find(&[Criterion::eq(property, value)])
    }

    /// 複数のプロパティの値がすべて一致するエンティティを検索する
    pub fn find_by_names(&self, names: &[&str], values: &[Value]) -> Result<Vec<T>> {
        let criteria = equality_criteria(names, values)?;
        self.find(&criteria)
    }

    /// 条件に合う最初の1件。なければ None
    pub fn find_unique(&self, criteria: &[Criterion]) -> Result<Option<T>> {
        let mut query = self.create_criteria(criteria);
        query.set_max_results(1);
        Ok(self.fetch(&query)?.into_iter().next())
    }

    pub fn find_unique_by(&self, property: &str, value: impl Into<Value>) -> Result<Option<T>> {
        self.find_unique(&[Criterion::eq(property, value)])
    }

    pub fn find_unique_by_names(&self, names: &[&str], values: &[Value]) -> Result<Option<T>> {
        let criteria = equality_criteria(names, values)?;
        self.find_unique(&criteria)
    }

    /// 比較の種類を指定してプロパティで検索する
    pub fn find_by_match(&self, property: &str, value: impl Into<Value>, match_type: MatchType) -> Result<Vec<T>> {
        let criterion = build_criterion(property, &value.into(), match_type)?;
        self.find(&[criterion])
    }

    pub fn find_page_by_match<'p>(
        &self,
        page: &'p mut Page<T>,
        property: &str,
        value: impl Into<Value>,
        match_type: MatchType,
    ) -> Result<&'p mut Page<T>> {
        let criterion = build_criterion(property, &value.into(), match_type)?;
        self.find_page(page, &[criterion])
    }

    /// プロパティフィルターで検索する
    pub fn find_by_filters(&self, filters: &[PropertyFilter]) -> Result<Vec<T>> {
        let criteria = build_from_filters(filters)?;
        self.find(&criteria)
    }

    pub fn find_page_by_filters<'p>(
        &self,
        page: &'p mut Page<T>,
        filters: &[PropertyFilter],
    ) -> Result<&'p mut Page<T>> {
        let criteria = build_from_filters(filters)?;
        self.find_page(page, &criteria)
    }

    /// 条件でページ単位に検索する
    ///
    /// ページサイズとソート条件はクエリを実行する前に検証する。
    /// `auto_count` が有効なら同じ条件で総件数を数えてから、現在のページの行を取得する。
    /// どちらかのクエリが失敗した場合、ページは変更されない。
    pub fn find_page<'p>(&self, page: &'p mut Page<T>, criteria: &[Criterion]) -> Result<&'p mut Page<T>> {
        let (offset, limit) = page_window(page)?;
        let orders = page.sort_orders()?;
        let mut query = self.create_criteria(criteria);

        let total_count = if page.auto_count() {
            Some(self.count_result(&mut query)?)
        } else {
            None
        };

        query.set_first_result(offset).set_max_results(limit);
        for order in orders {
            query.add_order(order);
        }

        let result = self.fetch(&query)?;
        if let Some(total_count) = total_count {
            page.set_total_count(total_count);
        }
        page.set_result(result);
        Ok(page)
    }

    /// 構造化クエリの件数を数える
    ///
    /// 射影・変換・ソート・ページングを一時的に外して件数を取得し、
    /// 実行の成否にかかわらずクエリを元の形に戻す。結果がなければ 0。
    pub fn count_result(&self, query: &mut CriteriaQuery) -> Result<i64> {
        let (count_query, shape) = std::mem::take(query).into_count_shape();
        debug!("Count query: {}", count_query);

        let scalar = self.executor.fetch_scalar(&count_query);
        *query = shape.restore(count_query);

        let total_count = scalar.map_err(|e| {
            warn!("Count query on {} failed: {}", query.entity(), e);
            e
        })?;
        let total_count = scalar_to_count(total_count)?;
        debug!("Counted {} rows of {}", total_count, query.entity());
        Ok(total_count)
    }

    /// 位置パラメータ付きのテキストクエリを作る
    /// プレースホルダーの数が引数の数より少なければエラー
    pub fn create_query(&self, text: &str, args: &[Value]) -> Result<TextQuery> {
        let placeholders = count_positional_placeholders(text);
        if placeholders < args.len() {
            return Err(Error::invalid_argument(format!(
                "query has {} placeholders but {} arguments were given: {}",
                placeholders,
                args.len(),
                text
            )));
        }

        let mut query = TextQuery::new(text);
        for (i, arg) in args.iter().enumerate() {
            query.bind_positional(i, arg.clone());
        }
        Ok(query)
    }

    /// 名前付きパラメータ付きのテキストクエリを作る
    pub fn create_named_query(&self, text: &str, named: &HashMap<String, Value>) -> TextQuery {
        let mut query = TextQuery::new(text);
        for (name, value) in named {
            query.bind_named(name.clone(), value.clone());
        }
        query
    }

    pub fn find_text<X: FromRow>(&self, text: &str, args: &[Value]) -> Result<Vec<X>> {
        let query = self.create_query(text, args)?;
        self.fetch_text(&query)
    }

    pub fn find_text_named<X: FromRow>(&self, text: &str, named: &HashMap<String, Value>) -> Result<Vec<X>> {
        let query = self.create_named_query(text, named);
        self.fetch_text(&query)
    }

    pub fn find_unique_text<X: FromRow>(&self, text: &str, args: &[Value]) -> Result<Option<X>> {
        let mut query = self.create_query(text, args)?;
        query.set_max_results(1);
        Ok(self.fetch_text(&query)?.into_iter().next())
    }

    /// テキストクエリから件数クエリを作って件数を数える
    pub fn count_text(&self, text: &str, args: &[Value]) -> Result<i64> {
        let count_text = prepare_count_query(text)?;
        let query = self.create_query(&count_text, args)?;
        self.count_text_query(&query)
    }

    pub fn count_text_named(&self, text: &str, named: &HashMap<String, Value>) -> Result<i64> {
        let count_text = prepare_count_query(text)?;
        let query = self.create_named_query(&count_text, named);
        self.count_text_query(&query)
    }

    /// テキストクエリでページ単位に検索する
    /// ページのソート条件は使わない。並び順はクエリの `order by` で指定する
    pub fn find_page_text<'p>(&self, page: &'p mut Page<T>, text: &str, args: &[Value]) -> Result<&'p mut Page<T>> {
        let (offset, limit) = page_window(page)?;
        let mut query = self.create_query(text, args)?;

        let total_count = if page.auto_count() {
            Some(self.count_text(text, args)?)
        } else {
            None
        };

        query.set_first_result(offset).set_max_results(limit);
        self.fill_text_page(page, &query, total_count)
    }

    pub fn find_page_named<'p>(
        &self,
        page: &'p mut Page<T>,
        text: &str,
        named: &HashMap<String, Value>,
    ) -> Result<&'p mut Page<T>> {
        let (offset, limit) = page_window(page)?;
        let mut query = self.create_named_query(text, named);

        let total_count = if page.auto_count() {
            Some(self.count_text_named(text, named)?)
        } else {
            None
        };

        query.set_first_result(offset).set_max_results(limit);
        self.fill_text_page(page, &query, total_count)
    }

    /// 一括で更新・削除し、影響を受けた行数を返す
    pub fn batch_execute(&self, text: &str, args: &[Value]) -> Result<usize> {
        let query = self.create_query(text, args)?;
        self.execute_update(&query)
    }

    pub fn batch_execute_named(&self, text: &str, named: &HashMap<String, Value>) -> Result<usize> {
        let query = self.create_named_query(text, named);
        self.execute_update(&query)
    }

    fn fetch(&self, query: &CriteriaQuery) -> Result<Vec<T>> {
        debug!("Query: {}", query);
        let rows = self.executor.fetch_all(query)?;
        map_rows(rows)
    }

    fn fetch_text<X: FromRow>(&self, query: &TextQuery) -> Result<Vec<X>> {
        debug!("Text query: {}", query.text());
        let rows = self.executor.fetch_text(query)?;
        map_rows(rows)
    }

    fn count_text_query(&self, query: &TextQuery) -> Result<i64> {
        debug!("Count query: {}", query.text());
        let scalar = self.executor.fetch_text_scalar(query).map_err(|e| {
            warn!("Count query failed: {}: {}", query.text(), e);
            e
        })?;
        scalar_to_count(scalar)
    }

    fn execute_update(&self, query: &TextQuery) -> Result<usize> {
        debug!("Update query: {}", query.text());
        let affected = self.executor.execute_update(query)?;
        debug!("{} rows affected", affected);
        Ok(affected)
    }

    fn fill_text_page<'p>(
        &self,
        page: &'p mut Page<T>,
        query: &TextQuery,
        total_count: Option<i64>,
    ) -> Result<&'p mut Page<T>> {
        if page.is_order_by_set() {
            debug!("Page sort order is ignored for text queries");
        }

        let result = self.fetch_text(query)?;
        if let Some(total_count) = total_count {
            page.set_total_count(total_count);
        }
        page.set_result(result);
        Ok(page)
    }
}

impl<T: FromRow + ToRow> GenericRepository<T> {
    /// 新規または変更したエンティティを保存する
    pub fn save(&self, entity: &T) -> Result<()> {
        self.executor.save(&self.entity.name, entity.to_row())?;
        debug!("Saved {} entity", self.entity.name);
        Ok(())
    }

    /// エンティティを削除する。ID の値を持たないエンティティはエラー
    pub fn delete(&self, entity: &T) -> Result<()> {
        let id_name = self.id_name()?;
        let id = entity
            .to_row()
            .get(id_name)
            .filter(|value| !value.is_null())
            .cloned()
            .ok_or_else(|| Error::invalid_argument(format!("{} entity has no {} value", self.entity.name, id_name)))?;
        self.delete_by_id(id)
    }
}

// 0 始まりのオフセットと取得件数
fn page_window<T>(page: &Page<T>) -> Result<(usize, usize)> {
    let limit = usize::try_from(page.page_size())
        .ok()
        .filter(|&size| size > 0)
        .ok_or_else(|| Error::invalid_argument(format!("page size must be positive, got {}", page.page_size())))?;
    let offset = usize::try_from(page.first() - 1)
        .map_err(|_| Error::invalid_argument(format!("page {} is out of range", page.page_no())))?;
    Ok((offset, limit))
}

fn equality_criteria(names: &[&str], values: &[Value]) -> Result<Vec<Criterion>> {
    if names.len() != values.len() {
        return Err(Error::invalid_argument(format!(
            "{} property names but {} values were given",
            names.len(),
            values.len()
        )));
    }

    Ok(names
        .iter()
        .zip(values)
        .map(|(name, value)| Criterion::eq(*name, value.clone()))
        .collect())
}

fn scalar_to_count(scalar: Option<Value>) -> Result<i64> {
    match scalar {
        None => Ok(0),
        Some(value) => value.as_i64().ok_or_else(|| {
            ExecutionError::DataError(format!("count query returned a non numeric value: {}", value)).into()
        }),
    }
}

fn map_rows<X: FromRow>(rows: Vec<Row>) -> Result<Vec<X>> {
    rows.into_iter()
        .map(|row| X::from_row(row).map_err(|e| ExecutionError::from(e).into()))
        .collect()
}

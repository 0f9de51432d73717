use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::domain::query::criterion::Criterion;
use crate::domain::query::order::Order;

/// 結果の列の形
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    /// 件数のみ
    RowCount,
    /// 指定したプロパティのみ
    Properties(Vec<String>),
}

/// 結果行の変換方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultTransformer {
    /// エンティティ全体をそのまま返す
    RootEntity,
    /// 重複した行を取り除いて返す
    DistinctRootEntity,
}

/// 組み立て式の構造化クエリ
///
/// 条件はすべて AND 結合され、ソートキーは追加した順に適用される。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriteriaQuery {
    entity: String,
    criteria: Vec<Criterion>,
    orders: Vec<Order>,
    first_result: Option<usize>,
    max_results: Option<usize>,
    projection: Option<Projection>,
    transformer: Option<ResultTransformer>,
}

impl CriteriaQuery {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Self::default()
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn add(&mut self, criterion: Criterion) -> &mut Self {
        self.criteria.push(criterion);
        self
    }

    pub fn add_order(&mut self, order: Order) -> &mut Self {
        self.orders.push(order);
        self
    }

    pub fn set_first_result(&mut self, first_result: usize) -> &mut Self {
        self.first_result = Some(first_result);
        self
    }

    pub fn set_max_results(&mut self, max_results: usize) -> &mut Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn set_projection(&mut self, projection: Option<Projection>) -> &mut Self {
        self.projection = projection;
        self
    }

    pub fn set_result_transformer(&mut self, transformer: ResultTransformer) -> &mut Self {
        self.transformer = Some(transformer);
        self
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn first_result(&self) -> Option<usize> {
        self.first_result
    }

    pub fn max_results(&self) -> Option<usize> {
        self.max_results
    }

    pub fn projection(&self) -> Option<&Projection> {
        self.projection.as_ref()
    }

    pub fn result_transformer(&self) -> Option<ResultTransformer> {
        self.transformer
    }

    /// 件数を数えるための形に変える
    ///
    /// 射影・変換・ソート・ページングを退避して取り除き、件数の射影を設定したクエリと、
    /// 退避した状態を返す。退避した状態は [`CountShape::restore`] で元に戻す。
    pub fn into_count_shape(mut self) -> (CriteriaQuery, CountShape) {
        let shape = CountShape {
            projection: self.projection.take(),
            transformer: self.transformer.take(),
            orders: std::mem::take(&mut self.orders),
            first_result: self.first_result.take(),
            max_results: self.max_results.take(),
        };
        self.projection = Some(Projection::RowCount);
        (self, shape)
    }
}

impl fmt::Display for CriteriaQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.projection {
            Some(Projection::RowCount) => write!(f, "select count(*) from {}", self.entity)?,
            Some(Projection::Properties(names)) => write!(f, "select {} from {}", names.iter().join(", "), self.entity)?,
            None => write!(f, "from {}", self.entity)?,
        }
        if !self.criteria.is_empty() {
            write!(f, " where {}", self.criteria.iter().join(" and "))?;
        }
        if !self.orders.is_empty() {
            let orders = self.orders.iter().map(|o| format!("{} {}", o.property, o.direction)).join(", ");
            write!(f, " order by {}", orders)?;
        }
        if let Some(first) = self.first_result {
            write!(f, " offset {}", first)?;
        }
        if let Some(max) = self.max_results {
            write!(f, " limit {}", max)?;
        }
        Ok(())
    }
}

/// 件数クエリのために退避したクエリの状態
#[derive(Debug, Clone, PartialEq)]
pub struct CountShape {
    projection: Option<Projection>,
    transformer: Option<ResultTransformer>,
    orders: Vec<Order>,
    first_result: Option<usize>,
    max_results: Option<usize>,
}

impl CountShape {
    /// 退避した状態をクエリに戻す
    /// 射影がなかった場合はエンティティ全体を返す形に戻す
    pub fn restore(self, mut query: CriteriaQuery) -> CriteriaQuery {
        if self.projection.is_none() {
            query.transformer = Some(ResultTransformer::RootEntity);
        }
        if self.transformer.is_some() {
            query.transformer = self.transformer;
        }
        query.projection = self.projection;
        query.orders = self.orders;
        query.first_result = self.first_result;
        query.max_results = self.max_results;
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shaped_query() -> CriteriaQuery {
        let mut query = CriteriaQuery::new("GenericUser");
        query
            .add(Criterion::lt("age", 30))
            .add_order(Order::desc("age"))
            .add_order(Order::asc("name"))
            .set_projection(Some(Projection::Properties(vec!["name".into(), "age".into()])))
            .set_result_transformer(ResultTransformer::DistinctRootEntity)
            .set_first_result(20)
            .set_max_results(10);
        query
    }

    #[test]
    fn count_shape_strips_everything_but_criteria() {
        let (count_query, _) = shaped_query().into_count_shape();

        assert_eq!(count_query.projection(), Some(&Projection::RowCount));
        assert!(count_query.orders().is_empty());
        assert_eq!(count_query.first_result(), None);
        assert_eq!(count_query.max_results(), None);
        assert_eq!(count_query.result_transformer(), None);
        assert_eq!(count_query.criteria(), [Criterion::lt("age", 30)]);
        assert_eq!(count_query.to_string(), "select count(*) from GenericUser where age < 30");
    }

    #[test]
    fn restore_round_trips() {
        let original = shaped_query();
        let (count_query, shape) = original.clone().into_count_shape();

        assert_eq!(shape.restore(count_query), original);
    }

    #[test]
    fn restore_without_projection_returns_root_entity() {
        let mut query = CriteriaQuery::new("GenericUser");
        query.add_order(Order::asc("name"));
        let (count_query, shape) = query.into_count_shape();
        let restored = shape.restore(count_query);

        assert_eq!(restored.projection(), None);
        assert_eq!(restored.result_transformer(), Some(ResultTransformer::RootEntity));
        assert_eq!(restored.orders(), [Order::asc("name")]);
    }

    #[test]
    fn renders_like_a_query() {
        assert_eq!(
            shaped_query().to_string(),
            "select name, age from GenericUser where age < 30 order by age desc, name asc offset 20 limit 10"
        );
    }
}

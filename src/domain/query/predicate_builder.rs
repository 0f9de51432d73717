use crate::domain::entity::Value;
use crate::domain::orm::{MatchType, PropertyFilter};
use crate::domain::query::criterion::{Criterion, FilterOperator, MatchMode};
use crate::{Error, Result};

/// プロパティ名、比較値、比較の種類から条件を組み立てる
/// LIKE の場合は比較値が文字列でなければならない
pub fn build_criterion(property: &str, value: &Value, match_type: MatchType) -> Result<Criterion> {
    let operator = match match_type {
        MatchType::Eq => FilterOperator::Equal,
        MatchType::Ne => FilterOperator::NotEqual,
        MatchType::Gt => FilterOperator::Greater,
        MatchType::Ge => FilterOperator::GreaterOrEqual,
        MatchType::Lt => FilterOperator::Less,
        MatchType::Le => FilterOperator::LessOrEqual,
        MatchType::Like => {
            let needle = value.as_str().ok_or_else(|| {
                Error::invalid_argument(format!(
                    "LIKE on '{}' requires a string value, got {}",
                    property,
                    value.data_type()
                ))
            })?;
            return Ok(Criterion::like(property, needle, MatchMode::Anywhere));
        }
    };

    Ok(Criterion::compare(property, operator, value.clone()))
}

/// プロパティフィルターの組み合わせから条件のリストを組み立てる
///
/// フィルター同士は呼び出し側のクエリで AND 結合される。
/// 1つのフィルターが複数のプロパティを持つ場合は、それらを OR でまとめた1つの条件になる。
pub fn build_from_filters(filters: &[PropertyFilter]) -> Result<Vec<Criterion>> {
    filters
        .iter()
        .map(|filter| {
            if !filter.has_multi_properties() {
                build_criterion(filter.property_name()?, filter.match_value(), filter.match_type())
            } else {
                let disjunction = filter
                    .property_names()
                    .iter()
                    .map(|name| build_criterion(name, filter.match_value(), filter.match_type()))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Criterion::Or(disjunction))
            }
        })
        .collect()
}

pub mod order;
pub mod criterion;
pub mod predicate_builder;
pub mod criteria_query;
pub mod text_query;

pub use order::{Order, SortDirection};
pub use criterion::{Criterion, FilterOperator, MatchMode};
pub use predicate_builder::{build_criterion, build_from_filters};
pub use criteria_query::{CountShape, CriteriaQuery, Projection, ResultTransformer};
pub use text_query::{count_positional_placeholders, prepare_count_query, TextQuery};

pub mod page;
pub mod property_filter;

pub use page::Page;
pub use property_filter::{MatchType, ParseError, PropertyFilter, PropertyType, OR_SEPARATOR};

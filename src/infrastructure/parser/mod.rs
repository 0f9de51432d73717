pub mod text_query_parser;

pub use text_query_parser::{
    DeleteStatement, ParsedStatement, QueryParseError, SelectProjection, SelectStatement, TextQueryParser,
    UpdateStatement,
};

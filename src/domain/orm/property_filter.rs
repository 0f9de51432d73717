use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use strum::{Display, EnumString};
use thiserror::Error;

use crate::domain::entity::{DataType, Value};

/// 複数プロパティ間の OR 関係を表す区切り文字列
pub const OR_SEPARATOR: &str = "_OR_";

/// フィルター仕様文字列の解析エラー
#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("Invalid match type '{token}' in filter '{filter}'")]
    InvalidMatchType { filter: String, token: String },

    #[error("Invalid property type '{token}' in filter '{filter}'")]
    InvalidPropertyType { filter: String, token: String },

    #[error("No property name in filter '{0}'")]
    MissingPropertyName(String),

    #[error("Cannot convert value '{value}' to {target}")]
    InvalidValue { value: String, target: PropertyType },
}

/// 比較の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[strum(serialize_all = "UPPERCASE")]
pub enum MatchType {
    Eq,   // 等しい
    Ne,   // 等しくない
    Gt,   // より大きい
    Ge,   // 以上
    Lt,   // より小さい
    Le,   // 以下
    Like, // 部分一致
}

/// 比較値のデータ型 (フィルター仕様では1文字のコードで表す)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Serialize)]
pub enum PropertyType {
    #[strum(serialize = "B")]
    Boolean,
    #[strum(serialize = "I")]
    Integer,
    #[strum(serialize = "F")]
    Float,
    #[strum(serialize = "N")]
    Double,
    #[strum(serialize = "L")]
    Long,
    #[strum(serialize = "S")]
    String,
    #[strum(serialize = "D")]
    Date,
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl PropertyType {
    /// 対応する値のデータ型
    pub fn data_type(self) -> DataType {
        match self {
            PropertyType::Boolean => DataType::Boolean,
            PropertyType::Integer => DataType::Integer,
            PropertyType::Float => DataType::Float,
            PropertyType::Double => DataType::Double,
            PropertyType::Long => DataType::Long,
            PropertyType::String => DataType::Text,
            PropertyType::Date => DataType::Timestamp,
        }
    }
}

/// 画面の検索条件などから組み立てる、ORM に依存しないプロパティフィルター
///
/// フィルター仕様文字列は `<MATCHTYPE>_<PROPTYPE>_<NAME>(_OR_<NAME>)*` の形をとる。
/// 例えば `LIKE_S_NAME_OR_LOGINNAME` は NAME または LOGINNAME の部分一致を意味する。
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyFilter {
    match_type: MatchType,
    property_type: PropertyType,
    property_names: Vec<String>,
    match_value: Value,
}

impl PropertyFilter {
    /// フィルター仕様文字列と比較値を解析する
    pub fn parse(filter_name: &str, value: &str) -> Result<Self, ParseError> {
        // LIKE_S_NAME_OR_LOGINNAME の場合:
        // match_type = LIKE, property_type = S, names = [NAME, LOGINNAME]
        let (match_type_str, rest) = split_first(filter_name);
        let match_type = MatchType::from_str(match_type_str).map_err(|_| ParseError::InvalidMatchType {
            filter: filter_name.to_string(),
            token: match_type_str.to_string(),
        })?;

        let (property_type_str, names_str) = split_first(rest);
        let property_type = PropertyType::from_str(property_type_str).map_err(|_| ParseError::InvalidPropertyType {
            filter: filter_name.to_string(),
            token: property_type_str.to_string(),
        })?;

        let property_names: Vec<String> = names_str
            .split(OR_SEPARATOR)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        if property_names.is_empty() {
            return Err(ParseError::MissingPropertyName(filter_name.to_string()));
        }

        let match_value = Value::parse_as(value, property_type.data_type())
            .map_err(|_| ParseError::InvalidValue { value: value.to_string(), target: property_type })?;

        Ok(Self {
            match_type,
            property_type,
            property_names,
            match_value,
        })
    }

    /// `<prefix>_<FILTER>` という名前のリクエストパラメータからフィルターを組み立てる
    /// 値が空のパラメータは無視する
    pub fn from_params<'a, I>(prefix: &str, params: I) -> Result<Vec<Self>, ParseError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let head = format!("{}_", prefix);
        params
            .into_iter()
            .filter(|(_, value)| !value.trim().is_empty())
            .filter_map(|(name, value)| name.strip_prefix(head.as_str()).map(|filter_name| (filter_name, value)))
            .map(|(filter_name, value)| Self::parse(filter_name, value))
            .collect()
    }

    /// 唯一の比較プロパティ名を取得する
    pub fn property_name(&self) -> crate::Result<&str> {
        match self.property_names.as_slice() {
            [name] => Ok(name),
            names => Err(crate::Error::invalid_argument(format!(
                "filter compares {} properties, not exactly one",
                names.len()
            ))),
        }
    }

    /// 複数のプロパティを比較するかどうか
    pub fn has_multi_properties(&self) -> bool {
        self.property_names.len() > 1
    }

    pub fn match_type(&self) -> MatchType {
        self.match_type
    }

    pub fn property_type(&self) -> PropertyType {
        self.property_type
    }

    pub fn property_names(&self) -> &[String] {
        &self.property_names
    }

    pub fn match_value(&self) -> &Value {
        &self.match_value
    }
}

// 最初の '_' で分割する。'_' がなければ全体と空文字列を返す
fn split_first(s: &str) -> (&str, &str) {
    s.split_once('_').unwrap_or((s, ""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn parses_or_filter() {
        let filter = PropertyFilter::parse("LIKE_S_NAME_OR_LOGINNAME", "jo").unwrap();

        assert_eq!(filter.match_type(), MatchType::Like);
        assert_eq!(filter.property_type(), PropertyType::String);
        assert_eq!(filter.property_names(), ["NAME", "LOGINNAME"]);
        assert_eq!(filter.match_value(), &Value::Text("jo".to_string()));
        assert!(filter.has_multi_properties());
        assert!(filter.property_name().is_err());
    }

    #[test]
    fn single_property_name() {
        let filter = PropertyFilter::parse("EQ_I_age", "30").unwrap();

        assert_eq!(filter.property_name().unwrap(), "age");
        assert_eq!(filter.match_value(), &Value::Integer(30));
        assert!(!filter.has_multi_properties());
    }

    #[test]
    fn keeps_repeated_names_and_underscores() {
        let filter = PropertyFilter::parse("EQ_S_login_name_OR_login_name", "x").unwrap();
        assert_eq!(filter.property_names(), ["login_name", "login_name"]);
    }

    #[test_case("BOGUS_S_NAME", "BOGUS" ; "unknown match type")]
    #[test_case("eq_S_NAME", "eq" ; "match type is case sensitive")]
    #[test_case("_S_NAME", "" ; "empty match type")]
    fn rejects_match_type(filter_name: &str, token: &str) {
        let err = PropertyFilter::parse(filter_name, "x").unwrap_err();
        assert_eq!(err, ParseError::InvalidMatchType { filter: filter_name.to_string(), token: token.to_string() });
    }

    #[test_case("EQ_X_NAME", "X" ; "unknown property type")]
    #[test_case("EQ", "" ; "no property type")]
    #[test_case("GE_Long_age", "Long" ; "full type name is not a code")]
    fn rejects_property_type(filter_name: &str, token: &str) {
        let err = PropertyFilter::parse(filter_name, "1").unwrap_err();
        assert_eq!(err, ParseError::InvalidPropertyType { filter: filter_name.to_string(), token: token.to_string() });
    }

    #[test_case("EQ_S" ; "nothing after type")]
    #[test_case("EQ_S_" ; "empty name")]
    #[test_case("EQ_S__OR_" ; "only separators")]
    fn rejects_missing_names(filter_name: &str) {
        assert_eq!(
            PropertyFilter::parse(filter_name, "x").unwrap_err(),
            ParseError::MissingPropertyName(filter_name.to_string())
        );
    }

    #[test_case("EQ_I_age", "thirty", PropertyType::Integer ; "integer")]
    #[test_case("EQ_B_active", "perhaps", PropertyType::Boolean ; "boolean")]
    #[test_case("GT_D_created", "2011/07/28", PropertyType::Date ; "date")]
    #[test_case("LT_N_score", "", PropertyType::Double ; "empty double")]
    fn rejects_unconvertible_values(filter_name: &str, value: &str, target: PropertyType) {
        assert_eq!(
            PropertyFilter::parse(filter_name, value).unwrap_err(),
            ParseError::InvalidValue { value: value.to_string(), target }
        );
    }

    #[test]
    fn coerces_dates() {
        let filter = PropertyFilter::parse("GE_D_created", "2011-07-28").unwrap();
        assert_eq!(filter.match_value().to_string(), "2011-07-28 00:00:00");
    }

    #[test]
    fn builds_from_prefixed_params() {
        let params = vec![
            ("filter_EQ_S_name", "jo"),
            ("filter_GT_I_age", " "),
            ("page_no", "2"),
            ("filter_LE_L_id", "10"),
        ];
        let filters = PropertyFilter::from_params("filter", params).unwrap();

        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].property_names(), ["name"]);
        assert_eq!(filters[1].match_value(), &Value::Long(10));
    }

    #[test]
    fn params_propagate_parse_errors() {
        let params = vec![("filter_XX_S_name", "jo")];
        assert!(matches!(
            PropertyFilter::from_params("filter", params),
            Err(ParseError::InvalidMatchType { .. })
        ));
    }
}

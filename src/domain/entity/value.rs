use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use crate::domain::entity::data_type::DataType;
use thiserror::Error;

/// 日付として受け付ける書式 (yyyy-MM-dd HH:mm:ss / yyyy-MM-dd)
const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

// 値型エラーの定義
#[derive(Error, Debug, PartialEq)]
pub enum ValueError {
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: DataType, actual: DataType },

    #[error("Cannot convert {0} to {1}")]
    ConversionError(String, String),

    #[error("NUll value not allowed")]
    NullValueNotAllowed,
}

// プロパティ値の表現
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Boolean(bool),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Null,
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Boolean(_) => DataType::Boolean,
            Value::Integer(_) => DataType::Integer,
            Value::Long(_) => DataType::Long,
            Value::Float(_) => DataType::Float,
            Value::Double(_) => DataType::Double,
            Value::Text(_) => DataType::Text,
            Value::Timestamp(_) => DataType::Timestamp,
            Value::Null => DataType::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// 文字列を指定したデータ型の値に変換する
    pub fn parse_as(raw: &str, target: DataType) -> Result<Value, ValueError> {
        let conversion_error = || ValueError::ConversionError(raw.to_string(), target.to_string());
        let trimmed = raw.trim();

        match target {
            DataType::Boolean => match trimmed.to_lowercase().as_str() {
                "true" | "yes" | "y" | "on" | "1" => Ok(Value::Boolean(true)),
                "false" | "no" | "n" | "off" | "0" => Ok(Value::Boolean(false)),
                _ => Err(conversion_error()),
            },
            DataType::Integer => trimmed.parse::<i32>().map(Value::Integer).map_err(|_| conversion_error()),
            DataType::Long => trimmed.parse::<i64>().map(Value::Long).map_err(|_| conversion_error()),
            DataType::Float => trimmed.parse::<f32>().map(Value::Float).map_err(|_| conversion_error()),
            DataType::Double => trimmed.parse::<f64>().map(Value::Double).map_err(|_| conversion_error()),
            DataType::Text => Ok(Value::Text(raw.to_string())),
            DataType::Timestamp => parse_timestamp(trimmed)
                .map(Value::Timestamp)
                .ok_or_else(conversion_error),
            DataType::Null => Err(conversion_error()),
        }
    }

    //指定したデータ型に変換する
    pub fn cast_to(&self, target_type: DataType) -> Result<Value, ValueError> {
        match (self, target_type) {
            //NUllはどの型にも変換できる
            (Value::Null, _) => Ok(Value::Null),

            //同じ型への変換はそのまま返す
            (v, t) if v.data_type() == t => Ok(v.clone()),

            //整数の拡大変換
            (Value::Integer(i), DataType::Long) => Ok(Value::Long(i64::from(*i))),
            (Value::Integer(i), DataType::Double) => Ok(Value::Double(f64::from(*i))),
            (Value::Long(l), DataType::Double) => Ok(Value::Double(*l as f64)),
            (Value::Long(l), DataType::Integer) => i32::try_from(*l)
                .map(Value::Integer)
                .map_err(|_| ValueError::ConversionError(l.to_string(), target_type.to_string())),
            (Value::Float(f), DataType::Double) => Ok(Value::Double(f64::from(*f))),

            //文字列から他の型への変換
            (Value::Text(s), t) => Value::parse_as(s, t),

            // その他の変換はエラー
            (value, target) => Err(ValueError::TypeMismatch {
                expected: target,
                actual: value.data_type(),
            }),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(i64::from(*i)),
            Value::Long(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(f64::from(*i)),
            Value::Long(l) => Some(*l as f64),
            Value::Float(f) => Some(f64::from(*f)),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// 2つの値を比較する
    /// 数値型どうしは型をまたいで比較でき、NULL や比較できない組み合わせは None を返す
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_i64(), b.as_i64()) {
                (Some(x), Some(y)) => Some(x.cmp(&y)),
                _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
            },
        }
    }

    /// SQL と同じく NULL はどの値とも等しくない
    pub fn sql_eq(&self, other: &Value) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, DATE_TIME_FORMAT) {
        return Some(Utc.from_utc_datetime(&dt));
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Long(l) => write!(f, "{}", l),
            Value::Float(n) => write!(f, "{}", n),
            Value::Double(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::Timestamp(dt) => write!(f, "{}", dt.format(DATE_TIME_FORMAT)),
            Value::Null => write!(f, "NULL"),
        }
    }
}

impl From<bool> for Value {
    fn from(val: bool) -> Self {
        Value::Boolean(val)
    }
}
impl From<i32> for Value {
    fn from(val: i32) -> Self {
        Value::Integer(val)
    }
}
impl From<i64> for Value {
    fn from(val: i64) -> Self {
        Value::Long(val)
    }
}
impl From<f32> for Value {
    fn from(val: f32) -> Self {
        Value::Float(val)
    }
}
impl From<f64> for Value {
    fn from(val: f64) -> Self {
        Value::Double(val)
    }
}
impl From<String> for Value {
    fn from(val: String) -> Self {
        Value::Text(val)
    }
}
impl From<&str> for Value {
    fn from(val: &str) -> Self {
        Value::Text(val.to_string())
    }
}
impl From<DateTime<Utc>> for Value {
    fn from(val: DateTime<Utc>) -> Self {
        Value::Timestamp(val)
    }
}

impl TryFrom<&Value> for bool {
    type Error = ValueError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Boolean(b) => Ok(*b),
            other => Err(ValueError::TypeMismatch { expected: DataType::Boolean, actual: other.data_type() }),
        }
    }
}

impl TryFrom<&Value> for i32 {
    type Error = ValueError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value.cast_to(DataType::Integer)? {
            Value::Integer(i) => Ok(i),
            other => Err(ValueError::TypeMismatch { expected: DataType::Integer, actual: other.data_type() }),
        }
    }
}

impl TryFrom<&Value> for i64 {
    type Error = ValueError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        value.as_i64().ok_or(ValueError::TypeMismatch { expected: DataType::Long, actual: value.data_type() })
    }
}

impl TryFrom<&Value> for f64 {
    type Error = ValueError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        value.as_f64().ok_or(ValueError::TypeMismatch { expected: DataType::Double, actual: value.data_type() })
    }
}

impl TryFrom<&Value> for String {
    type Error = ValueError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            other => Err(ValueError::TypeMismatch { expected: DataType::Text, actual: other.data_type() }),
        }
    }
}

impl TryFrom<&Value> for DateTime<Utc> {
    type Error = ValueError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Timestamp(dt) => Ok(*dt),
            other => Err(ValueError::TypeMismatch { expected: DataType::Timestamp, actual: other.data_type() }),
        }
    }
}

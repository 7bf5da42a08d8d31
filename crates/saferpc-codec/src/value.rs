use chrono::{DateTime, SubsecRound, Utc};
use num_bigint::BigInt;
use serde_json::{Number, Value};
use std::collections::BTreeMap;

/// A JSON value extended with arbitrary precision integers and timestamps.
///
/// This is what handlers receive as params and return as results. It never
/// reaches the wire directly: [`crate::serialize`] and [`crate::deserialize`]
/// sit at the boundary.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RichValue {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    BigInt(BigInt),
    Date(DateTime<Utc>),
    Array(Vec<RichValue>),
    Object(BTreeMap<String, RichValue>),
}

impl RichValue {
    pub fn object<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<RichValue>,
    {
        RichValue::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RichValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RichValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RichValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RichValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RichValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_bigint(&self) -> Option<&BigInt> {
        match self {
            RichValue::BigInt(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            RichValue::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<RichValue>> {
        match self {
            RichValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, RichValue>> {
        match self {
            RichValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut BTreeMap<String, RichValue>> {
        match self {
            RichValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Look up an object member
    pub fn get(&self, key: &str) -> Option<&RichValue> {
        self.as_object()?.get(key)
    }

    /// Project onto plain JSON without any safe prefixes.
    ///
    /// BigInt keeps its `n` suffix and dates become ISO-8601 strings, so the
    /// result is suitable for schema validation and logging. Unlike
    /// [`crate::serialize`] this never warns.
    pub fn to_plain_json(&self) -> Value {
        match self {
            RichValue::Null => Value::Null,
            RichValue::Bool(b) => Value::Bool(*b),
            RichValue::Number(n) => Value::Number(n.clone()),
            RichValue::String(s) => Value::String(s.clone()),
            RichValue::BigInt(b) => Value::String(format!("{}n", b)),
            RichValue::Date(d) => Value::String(crate::format_date(d)),
            RichValue::Array(items) => {
                Value::Array(items.iter().map(RichValue::to_plain_json).collect())
            }
            RichValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_plain_json()))
                    .collect(),
            ),
        }
    }
}

/// Structural conversion: no string is reinterpreted
impl From<Value> for RichValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => RichValue::Null,
            Value::Bool(b) => RichValue::Bool(b),
            Value::Number(n) => RichValue::Number(n),
            Value::String(s) => RichValue::String(s),
            Value::Array(items) => RichValue::Array(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                RichValue::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<bool> for RichValue {
    fn from(b: bool) -> Self {
        RichValue::Bool(b)
    }
}

impl From<i64> for RichValue {
    fn from(n: i64) -> Self {
        RichValue::Number(n.into())
    }
}

impl From<i32> for RichValue {
    fn from(n: i32) -> Self {
        RichValue::Number(n.into())
    }
}

impl From<u64> for RichValue {
    fn from(n: u64) -> Self {
        RichValue::Number(n.into())
    }
}

/// Non-finite floats become `Null`, as in JSON
impl From<f64> for RichValue {
    fn from(n: f64) -> Self {
        Number::from_f64(n)
            .map(RichValue::Number)
            .unwrap_or(RichValue::Null)
    }
}

impl From<&str> for RichValue {
    fn from(s: &str) -> Self {
        RichValue::String(s.to_string())
    }
}

impl From<String> for RichValue {
    fn from(s: String) -> Self {
        RichValue::String(s)
    }
}

impl From<BigInt> for RichValue {
    fn from(b: BigInt) -> Self {
        RichValue::BigInt(b)
    }
}

/// Dates are held at millisecond precision, the precision of the wire format
impl From<DateTime<Utc>> for RichValue {
    fn from(d: DateTime<Utc>) -> Self {
        RichValue::Date(d.trunc_subsecs(3))
    }
}

impl<T: Into<RichValue>> From<Vec<T>> for RichValue {
    fn from(items: Vec<T>) -> Self {
        RichValue::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<RichValue>> From<Option<T>> for RichValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RichValue::Null)
    }
}

use chrono::{DateTime, SubsecRound, Utc};
use num_bigint::BigInt;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::str::FromStr;

use crate::{DATE_PREFIX, RichValue, STRING_PREFIX, SafeOptions};

static BIGINT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?\d+n$").expect("valid bigint pattern")
});

static ISO_DATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})$")
        .expect("valid ISO-8601 pattern")
});

/// Decode wire JSON into a rich value.
///
/// `peer` must be the safe flags advertised by whoever produced the payload.
/// Decoding never fails: anything that does not cleanly match an encoding
/// stays a plain string.
pub fn deserialize(value: Value, peer: &SafeOptions) -> RichValue {
    match value {
        Value::Null => RichValue::Null,
        Value::Bool(b) => RichValue::Bool(b),
        Value::Number(n) => RichValue::Number(n),
        Value::String(s) => deserialize_str(s, peer),
        Value::Array(items) => {
            RichValue::Array(items.into_iter().map(|v| deserialize(v, peer)).collect())
        }
        Value::Object(map) => RichValue::Object(
            map.into_iter()
                .map(|(k, v)| (k, deserialize(v, peer)))
                .collect(),
        ),
    }
}

/// Decode a single wire string
pub fn deserialize_str(s: String, peer: &SafeOptions) -> RichValue {
    if peer.safe_string
        && let Some(plain) = s.strip_prefix(STRING_PREFIX)
    {
        return RichValue::String(plain.to_string());
    }

    if peer.safe_date
        && let Some(encoded) = s.strip_prefix(DATE_PREFIX)
        && let Some(date) = parse_date(encoded)
    {
        return RichValue::Date(date);
    }

    if BIGINT_PATTERN.is_match(&s)
        && let Ok(big) = BigInt::from_str(&s[..s.len() - 1])
    {
        return RichValue::BigInt(big);
    }

    // Without the D: convention, ISO strings are taken as dates on a best-effort basis
    if !peer.safe_date
        && ISO_DATE_PATTERN.is_match(&s)
        && let Some(date) = parse_date(&s)
    {
        return RichValue::Date(date);
    }

    RichValue::String(s)
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Utc).trunc_subsecs(3))
}

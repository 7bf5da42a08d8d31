use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use tracing::warn;

use crate::{DATE_PREFIX, RichValue, STRING_PREFIX, SafeOptions};

/// ISO-8601 with millisecond precision and a `Z` suffix
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Encode a rich value into wire-safe JSON using the local `options`.
///
/// Never fails. When a BigInt is met while safe-string is off, or a Date while
/// safe-date is off, a single advisory warning is logged for the whole call
/// unless `options.warnings` is false.
pub fn serialize(value: &RichValue, options: &SafeOptions) -> Value {
    let mut encoder = Encoder {
        options,
        saw_bigint: false,
        saw_date: false,
    };
    let encoded = encoder.encode(value);

    if options.warnings {
        let bigint_unsafe = encoder.saw_bigint && !options.safe_string;
        let date_unsafe = encoder.saw_date && !options.safe_date;
        if bigint_unsafe || date_unsafe {
            warn!(
                bigint = bigint_unsafe,
                date = date_unsafe,
                "Encoding BigInt/Date values without safe mode; plain strings shaped like these values may be misread by the peer"
            );
        }
    }

    encoded
}

struct Encoder<'a> {
    options: &'a SafeOptions,
    saw_bigint: bool,
    saw_date: bool,
}

impl Encoder<'_> {
    fn encode(&mut self, value: &RichValue) -> Value {
        match value {
            RichValue::Null => Value::Null,
            RichValue::Bool(b) => Value::Bool(*b),
            RichValue::Number(n) => Value::Number(n.clone()),
            RichValue::String(s) => {
                if self.options.safe_string {
                    Value::String(format!("{}{}", STRING_PREFIX, s))
                } else {
                    Value::String(s.clone())
                }
            }
            RichValue::BigInt(b) => {
                self.saw_bigint = true;
                Value::String(format!("{}{}", b, crate::BIGINT_SUFFIX))
            }
            RichValue::Date(d) => {
                self.saw_date = true;
                if self.options.safe_date {
                    Value::String(format!("{}{}", DATE_PREFIX, format_date(d)))
                } else {
                    Value::String(format_date(d))
                }
            }
            RichValue::Array(items) => Value::Array(items.iter().map(|v| self.encode(v)).collect()),
            RichValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.encode(v)))
                    .collect(),
            ),
        }
    }
}

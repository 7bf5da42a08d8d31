//! # Safe Serialization Codec
//!
//! Converts between wire-safe JSON ([`serde_json::Value`]) and [`RichValue`],
//! which additionally carries arbitrary precision integers and timestamps.
//!
//! ## Wire encoding
//! - BigInt: base-10 digits followed by `n` (`"-42n"`), always
//! - Date: ISO-8601 with millisecond precision, prefixed `D:` in safe-date mode
//! - String: unchanged, prefixed `S:` in safe-string mode
//!
//! Encoding uses the local [`SafeOptions`]; decoding must be given the flags
//! the *peer* advertised (see [`negotiation`]).
//!
//! ```rust
//! use saferpc_codec::{RichValue, SafeOptions, serialize, deserialize};
//! use num_bigint::BigInt;
//!
//! let opts = SafeOptions::enabled();
//! let value = RichValue::from(BigInt::from(42));
//! let wire = serialize(&value, &opts);
//! assert_eq!(wire, serde_json::json!("42n"));
//! assert_eq!(deserialize(wire, &opts), value);
//! ```

pub mod deserialize;
pub mod negotiation;
pub mod options;
pub mod serialize;
pub mod value;

pub use deserialize::{deserialize, deserialize_str};
pub use negotiation::{
    SAFE_DATE_HEADER, SAFE_ENABLED_HEADER, SAFE_STRING_HEADER, apply_safe_headers,
    has_safe_headers, safe_options_from_headers,
};
pub use options::SafeOptions;
pub use serialize::{format_date, serialize};
pub use value::RichValue;

// Value types handlers need to build rich values
pub use chrono::{DateTime, Utc};
pub use num_bigint::BigInt;

/// Prefix marking a plain string in safe-string mode
pub const STRING_PREFIX: &str = "S:";
/// Prefix marking an encoded date in safe-date mode
pub const DATE_PREFIX: &str = "D:";
/// Suffix marking an encoded BigInt
pub const BIGINT_SUFFIX: char = 'n';

//! Safe-mode header negotiation
//!
//! Each side advertises the flags it used to *encode* its payload. The legacy
//! protocol uses a single `X-RPC-Safe-Enabled` header; the finer-grained pair
//! takes precedence when present.

use http::{HeaderMap, HeaderValue};

use crate::SafeOptions;

pub const SAFE_ENABLED_HEADER: &str = "x-rpc-safe-enabled";
pub const SAFE_STRING_HEADER: &str = "x-rpc-safestring-enabled";
pub const SAFE_DATE_HEADER: &str = "x-rpc-safedate-enabled";

fn header_flag(headers: &HeaderMap, name: &str) -> Option<bool> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            let v = v.trim();
            v.eq_ignore_ascii_case("true") || v == "1"
        })
}

/// True if the peer declared its serialization policy at all
pub fn has_safe_headers(headers: &HeaderMap) -> bool {
    [SAFE_ENABLED_HEADER, SAFE_STRING_HEADER, SAFE_DATE_HEADER]
        .iter()
        .any(|name| headers.contains_key(*name))
}

/// Read the peer's advertised flags.
///
/// Returns `None` when no safe header is present; callers decide what an
/// undeclared peer means.
pub fn safe_options_from_headers(headers: &HeaderMap) -> Option<SafeOptions> {
    if !has_safe_headers(headers) {
        return None;
    }

    let combined = header_flag(headers, SAFE_ENABLED_HEADER).unwrap_or(false);
    let safe_string = header_flag(headers, SAFE_STRING_HEADER).unwrap_or(combined);
    let safe_date = header_flag(headers, SAFE_DATE_HEADER).unwrap_or(combined);

    Some(SafeOptions::new(safe_string, safe_date))
}

/// Advertise `options` on outgoing headers (both header forms)
pub fn apply_safe_headers(headers: &mut HeaderMap, options: &SafeOptions) {
    let flag = |b: bool| HeaderValue::from_static(if b { "true" } else { "false" });
    headers.insert(SAFE_ENABLED_HEADER, flag(options.any()));
    headers.insert(SAFE_STRING_HEADER, flag(options.safe_string));
    headers.insert(SAFE_DATE_HEADER, flag(options.safe_date));
}

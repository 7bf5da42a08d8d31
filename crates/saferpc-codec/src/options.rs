use serde::{Deserialize, Serialize};

/// Safe serialization flags.
///
/// On the encode side these are the local policy. On the decode side they must
/// be the flags advertised by whichever peer produced the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SafeOptions {
    /// Prefix plain strings with `S:`
    pub safe_string: bool,
    /// Prefix dates with `D:`
    pub safe_date: bool,
    /// Emit an advisory warning when BigInt/Date values are encoded without
    /// the matching safe flag
    pub warnings: bool,
}

impl Default for SafeOptions {
    fn default() -> Self {
        Self {
            safe_string: false,
            safe_date: false,
            warnings: true,
        }
    }
}

impl SafeOptions {
    /// Both safe prefixes on
    pub fn enabled() -> Self {
        Self::both(true)
    }

    /// Plain JSON (BigInt still uses the `n` suffix)
    pub fn disabled() -> Self {
        Self::both(false)
    }

    /// Legacy single-switch configuration
    pub fn both(enabled: bool) -> Self {
        Self {
            safe_string: enabled,
            safe_date: enabled,
            ..Self::default()
        }
    }

    pub fn new(safe_string: bool, safe_date: bool) -> Self {
        Self {
            safe_string,
            safe_date,
            ..Self::default()
        }
    }

    pub fn with_warnings(mut self, warnings: bool) -> Self {
        self.warnings = warnings;
        self
    }

    /// True when any safe prefix is active
    pub fn any(&self) -> bool {
        self.safe_string || self.safe_date
    }
}

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

const TOKEN_PREFIX: &str = "req";

/// Opaque identifier correlating one HTTP request with one script result.
///
/// Format: `req_{issued_at}_{seq}`.
/// - `issued_at`: unix seconds at creation, read back by the expiry sweep
/// - `seq`: per-process counter, keeps tokens minted in the same second distinct
///
/// `FromStr` validates the format; `From<String>` wraps any string, which then
/// simply never matches a registered token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestToken(String);

impl RequestToken {
    /// Build a token from its creation second and sequence number.
    pub fn new(issued_at: u64, seq: u64) -> Self {
        Self(format!("{TOKEN_PREFIX}_{issued_at}_{seq}"))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unix seconds embedded in the token, if it carries a parseable timestamp.
    pub fn issued_at(&self) -> Option<u64> {
        self.0.split('_').nth(1)?.parse().ok()
    }

    /// Whether the token is older than `max_age_secs` relative to `now_secs`.
    ///
    /// Tokens without a parseable timestamp never expire.
    pub fn is_older_than(&self, max_age_secs: u64, now_secs: u64) -> bool {
        self.issued_at()
            .is_some_and(|issued| now_secs.saturating_sub(issued) > max_age_secs)
    }
}

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RequestToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RequestToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Strict parsing: prefix, timestamp and counter must all be present.
impl FromStr for RequestToken {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('_');
        let valid = parts.next() == Some(TOKEN_PREFIX)
            && parts.next().is_some_and(|ts| ts.parse::<u64>().is_ok())
            && parts.next().is_some_and(|seq| seq.parse::<u64>().is_ok())
            && parts.next().is_none();

        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(ModelError::InvalidToken(s.to_string()))
        }
    }
}

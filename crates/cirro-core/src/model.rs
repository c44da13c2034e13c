// ── Core identity type ──
//
// ResourceId is the canonical primary-key value for every entity in the
// store. The API hands out integer ids for most resources and opaque
// strings for a few (IP addresses, object-storage keys); both forms meet
// behind one type so a key can never appear twice under mixed spellings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Canonical identifier for any entity in the store.
///
/// A JSON number, or a string that is wholly an integer, normalizes to
/// `Int`; anything else stays `Str`. The normalization is what guarantees
/// that `1` and `"1"` address the same entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceId {
    Int(i64),
    Str(String),
}

impl ResourceId {
    /// Extract and normalize an id from a JSON value.
    ///
    /// Returns `None` for anything that cannot serve as a key (objects,
    /// arrays, floats, null) -- callers treat that as a malformed payload.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Int),
            Value::String(s) => Some(Self::from(s.as_str())),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Int(_) => None,
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for ResourceId {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        match s.parse::<i64>() {
            Ok(n) => Self::Int(n),
            Err(_) => Self::Str(s.to_owned()),
        }
    }
}

impl From<String> for ResourceId {
    fn from(s: String) -> Self {
        match s.parse::<i64>() {
            Ok(n) => Self::Int(n),
            Err(_) => Self::Str(s),
        }
    }
}

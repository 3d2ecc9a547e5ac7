//! Stream identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Result, StreamError};

/// Identifier of one camera stream, as used in socket and settings paths.
///
/// Keys are embedded verbatim in URL paths, so they must be non-empty and
/// free of `/`, `?`, `#` and whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StreamKey(String);

impl StreamKey {
    /// Validate and wrap a stream key
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(StreamError::InvalidStreamKey { key, details: "key is empty".into() });
        }
        if let Some(bad) = key.chars().find(|c| matches!(c, '/' | '?' | '#') || c.is_whitespace()) {
            return Err(StreamError::InvalidStreamKey {
                details: format!("key contains {bad:?}"),
                key,
            });
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for StreamKey {
    type Error = StreamError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<StreamKey> for String {
    fn from(key: StreamKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_keys() {
        for key in ["cam-1", "entrance_north", "42", "a.b"] {
            assert_eq!(StreamKey::new(key).unwrap().as_str(), key);
        }
    }

    #[test]
    fn rejects_path_breaking_keys() {
        for key in ["", "a/b", "cam 1", "cam?x", "cam#1", "tab\there"] {
            let err = StreamKey::new(key).unwrap_err();
            assert!(matches!(err, StreamError::InvalidStreamKey { .. }), "{key:?}");
        }
    }

    #[test]
    fn deserialization_validates() {
        let key: StreamKey = serde_yaml_ng::from_str("cam-7").unwrap();
        assert_eq!(key.to_string(), "cam-7");
        assert!(serde_yaml_ng::from_str::<StreamKey>("\"a/b\"").is_err());
    }
}

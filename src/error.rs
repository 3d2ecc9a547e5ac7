//! Error types for frame streaming.
//!
//! All errors implement `std::error::Error` and carry enough context to
//! decide on recovery.
//!
//! ## Error Categories
//!
//! - **Connection Errors**: socket failures and unclean closes, retried internally
//! - **Decode Errors**: a single malformed payload, dropped and logged
//! - **Fatal Errors**: reconnect attempts exhausted, surfaced to the UI
//! - **Config Errors**: the per-stream settings endpoint failed, surfaced once
//! - **Invalid Configuration**: local client configuration rejected at load time
//!
//! Only fatal and config errors ever leave the driver, and they do so as
//! [`StreamEvent::Error`](crate::StreamEvent::Error) events.
//!
//! ```rust
//! use camfeed::StreamError;
//!
//! let error = StreamError::connection_failed("connection reset by peer");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for streaming operations.
pub type Result<T, E = StreamError> = std::result::Result<T, E>;

/// Main error type for streaming operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StreamError {
    #[error("Stream connection failed: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Frame {sequence} could not be decoded: {details}")]
    Decode { sequence: u64, details: String },

    #[error("Gave up after {attempts} reconnect attempts to stream '{stream_key}'")]
    ReconnectExhausted { stream_key: String, attempts: u32 },

    #[error("Stream settings request failed for '{stream_key}': {reason}")]
    Config {
        stream_key: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Invalid client configuration: {field}: {details}")]
    InvalidConfig { field: String, details: String },

    #[error("Invalid stream key '{key}': {details}")]
    InvalidStreamKey { key: String, details: String },

    #[error("Configuration file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream driver is no longer running")]
    DriverStopped,
}

impl StreamError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            StreamError::Connection { .. } => true,
            StreamError::Config { .. } => true,
            StreamError::Decode { .. } => false,
            StreamError::ReconnectExhausted { .. } => false,
            StreamError::InvalidConfig { .. } => false,
            StreamError::InvalidStreamKey { .. } => false,
            StreamError::File { .. } => false,
            StreamError::DriverStopped => false,
        }
    }

    /// Whether the error needs the user to act before streaming resumes.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StreamError::ReconnectExhausted { .. } | StreamError::DriverStopped)
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            StreamError::Connection { .. } => vec![
                "Check that the streaming server is reachable",
                "Verify the camera stream is active on the server",
                "Wait for the automatic reconnect to complete",
            ],
            StreamError::Decode { .. } => vec![
                "Check the camera encoder output format",
                "Subsequent frames are still processed",
            ],
            StreamError::ReconnectExhausted { .. } => vec![
                "Reconnect manually once the server is reachable",
                "Check server logs for the stream",
                "Increase max_reconnect_attempts in the client configuration",
            ],
            StreamError::Config { .. } => vec![
                "Retry the settings request",
                "Check the settings API base URL",
                "The live stream is not affected",
            ],
            StreamError::InvalidConfig { .. } => vec![
                "Fix the named configuration field",
                "Remove the field to fall back to its default",
            ],
            StreamError::InvalidStreamKey { .. } => vec![
                "Use the stream key exactly as listed by the camera API",
                "Stream keys may not be empty or contain '/'",
            ],
            StreamError::File { .. } => {
                vec!["Check the configuration file exists", "Check file permissions"]
            }
            StreamError::DriverStopped => vec!["Create a new stream handle"],
        }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        StreamError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        StreamError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for per-frame decode failures.
    pub fn decode_failed(sequence: u64, details: impl Into<String>) -> Self {
        StreamError::Decode { sequence, details: details.into() }
    }

    /// Helper constructor for settings endpoint failures.
    pub fn config_failed(
        stream_key: impl Into<String>,
        reason: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        StreamError::Config { stream_key: stream_key.into(), reason: reason.into(), source }
    }

    /// Helper constructor for rejected configuration values.
    pub fn invalid_config(field: impl Into<String>, details: impl Into<String>) -> Self {
        StreamError::InvalidConfig { field: field.into(), details: details.into() }
    }

    /// Helper constructor for configuration file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        StreamError::File { path, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
          #[test]
          fn error_messages_carry_their_context(
            reason in ".*",
            key in "[a-z0-9_-]{1,16}",
            sequence in 0u64..1_000_000u64,
            attempts in 1u32..100u32,
            details in ".*"
          ) {
            let connection = StreamError::connection_failed(reason.clone());
            prop_assert!(connection.to_string().contains(&reason));

            let decode = StreamError::decode_failed(sequence, details.clone());
            let decode_msg = decode.to_string();
            prop_assert!(decode_msg.contains(&sequence.to_string()));
            prop_assert!(decode_msg.contains(&details));

            let fatal = StreamError::ReconnectExhausted { stream_key: key.clone(), attempts };
            let fatal_msg = fatal.to_string();
            prop_assert!(fatal_msg.contains(&key));
            prop_assert!(fatal_msg.contains(&attempts.to_string()));

            let config = StreamError::config_failed(key.clone(), reason.clone(), None);
            prop_assert!(config.to_string().contains(&key));
          }

          #[test]
          fn source_chain_is_preserved(
            base_message in ".*",
            reasons in prop::collection::vec(".*", 1..5)
          ) {
            let mut current: Box<dyn std::error::Error + Send + Sync> =
              Box::new(std::io::Error::other(base_message.clone()));

            for reason in &reasons {
              current = Box::new(StreamError::connection_failed_with_source(reason.clone(), current));
            }

            let mut depth = 0;
            let mut found_base = false;
            let mut source = std::error::Error::source(current.as_ref());
            while let Some(err) = source {
              depth += 1;
              if err.to_string().contains(&base_message) {
                found_base = true;
              }
              source = err.source();
            }

            prop_assert_eq!(depth, reasons.len());
            prop_assert!(found_base);
          }
        }
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<StreamError>();

        let error = StreamError::connection_failed("test");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn retry_classification() {
        assert!(StreamError::connection_failed("reset").is_retryable());
        assert!(StreamError::config_failed("cam-1", "503", None).is_retryable());
        assert!(!StreamError::decode_failed(3, "bad jpeg").is_retryable());

        let fatal = StreamError::ReconnectExhausted { stream_key: "cam-1".into(), attempts: 10 };
        assert!(!fatal.is_retryable());
        assert!(fatal.is_fatal());
        assert!(!StreamError::connection_failed("reset").is_fatal());
    }

    #[test]
    fn every_variant_has_suggestions() {
        let errors = vec![
            StreamError::connection_failed("x"),
            StreamError::decode_failed(1, "x"),
            StreamError::ReconnectExhausted { stream_key: "k".into(), attempts: 1 },
            StreamError::config_failed("k", "x", None),
            StreamError::invalid_config("field", "x"),
            StreamError::InvalidStreamKey { key: "".into(), details: "x".into() },
            StreamError::file_error(PathBuf::from("/x"), std::io::Error::other("x")),
            StreamError::DriverStopped,
        ];

        for error in errors {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty(), "no suggestions for {error}");
            assert!(suggestions.iter().all(|s| s.len() > 5));
        }
    }
}

//! # Cache Error Types
//!
//! Error types for the cache engine.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Tally Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Bridge input  │  │     Runtime             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Validation     │  │  NoRuntime              │ │
//! │  │  ConfigLoad     │  │  Serialization  │  │  ChannelError           │ │
//! │  │  ConfigSave     │  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌───────────────────────────────────────────────────────────────────┐ │
//! │  │  RemoteError (never surfaces through TallyError)                  │ │
//! │  │                                                                   │ │
//! │  │  Unavailable │ Rejected │ Malformed │ Aborted                     │ │
//! │  │  Absorbed by the cache, reported as a RemoteOutcome / log line    │ │
//! │  └───────────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tally_core::ValidationError;
use thiserror::Error;

/// Result type alias for cache operations.
pub type TallyResult<T> = Result<T, TallyError>;

/// Errors a caller of the cache engine can see.
///
/// Remote failures are not in here: the cache absorbs them.
#[derive(Debug, Error)]
pub enum TallyError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Bridge Errors
    // =========================================================================
    /// Caller input rejected before reaching the cache.
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// Failed to serialize records for the UI.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    // =========================================================================
    // Runtime Errors
    // =========================================================================
    /// The cache was created outside a tokio runtime.
    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

/// Failure reported by a [`RemoteEventService`](crate::remote::RemoteEventService).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The service could not be reached.
    #[error("Remote event service unavailable: {0}")]
    Unavailable(String),

    /// The service refused the call for this event.
    #[error("Remote rejected event {id}: {reason}")]
    Rejected { id: String, reason: String },

    /// The service answered with something unusable.
    #[error("Malformed remote response: {0}")]
    Malformed(String),

    /// The task driving the call was cancelled or panicked.
    #[error("Remote call aborted: {0}")]
    Aborted(String),
}

impl RemoteError {
    /// Returns true if repeating the same call later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::Unavailable(_))
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<serde_json::Error> for TallyError {
    fn from(err: serde_json::Error) -> Self {
        TallyError::SerializationFailed(err.to_string())
    }
}

impl From<std::io::Error> for TallyError {
    fn from(err: std::io::Error) -> Self {
        TallyError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for TallyError {
    fn from(err: toml::de::Error) -> Self {
        TallyError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for TallyError {
    fn from(err: toml::ser::Error) -> Self {
        TallyError::ConfigSaveFailed(err.to_string())
    }
}

impl TallyError {
    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            TallyError::InvalidConfig(_)
                | TallyError::ConfigLoadFailed(_)
                | TallyError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_remote_errors() {
        assert!(RemoteError::Unavailable("offline".into()).is_retryable());

        assert!(!RemoteError::Malformed("null buffer".into()).is_retryable());
        assert!(!RemoteError::Rejected {
            id: "e1".into(),
            reason: "unknown event".into(),
        }
        .is_retryable());
        assert!(!RemoteError::Aborted("cancelled".into()).is_retryable());
    }

    #[test]
    fn test_config_errors() {
        assert!(TallyError::InvalidConfig("bad".into()).is_config_error());
        assert!(!TallyError::ChannelError("closed".into()).is_config_error());
    }

    #[test]
    fn test_error_display() {
        let err = RemoteError::Rejected {
            id: "e1".into(),
            reason: "unknown event".into(),
        };
        assert!(err.to_string().contains("e1"));

        let err: TallyError = ValidationError::Required {
            field: "event_id".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Invalid input: event_id is required");
    }
}

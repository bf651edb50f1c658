//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError        - Lookup failures on the snapshot                │
//! │  └── ValidationError  - Input and raw record validation failures       │
//! │                                                                         │
//! │  tally-sync errors (separate crate)                                    │
//! │  ├── RemoteError      - Remote service failures (always absorbed)      │
//! │  └── TallyError       - Config, bridge and agent failures              │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError / TallyError → UI bridge            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Errors raised when a caller insists on a record being present.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No reload has populated the snapshot yet.
    #[error("Event snapshot has not been loaded")]
    NotLoaded,

    /// The snapshot is loaded but holds no record under this id.
    #[error("Event not found: {0}")]
    EventNotFound(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised for bridge input before it reaches the cache, and for raw records
/// coming back from a bulk load.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be zero or greater.
    #[error("{field} must not be negative (got {value})")]
    MustBeNonNegative { field: String, value: i64 },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

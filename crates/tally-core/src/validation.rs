//! # Validation Module
//!
//! Input validation for everything that crosses into the cache.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: UI bridge (JavaScript → Rust)                                │
//! │  ├── Event ids must be non-blank and bounded                           │
//! │  └── Step amounts must not be negative                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Bulk load (remote → snapshot)                                │
//! │  ├── Every raw record must carry id, name, texts and value             │
//! │  ├── Values and ids are taken as the remote service sends them         │
//! │  └── One bad record rejects the whole batch                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::validation::{validate_event_id, validate_step};
//!
//! validate_event_id("CgkI4dWv").unwrap();
//! assert!(validate_step(-1).is_err());
//! ```

use crate::error::ValidationError;
use crate::MAX_EVENT_ID_LEN;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates an event id.
///
/// ## Rules
/// - Must not be empty or whitespace only
/// - At most [`MAX_EVENT_ID_LEN`] bytes
/// - No control characters
pub fn validate_event_id(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "event_id".to_string(),
        });
    }

    if id.len() > MAX_EVENT_ID_LEN {
        return Err(ValidationError::TooLong {
            field: "event_id".to_string(),
            max: MAX_EVENT_ID_LEN,
        });
    }

    if id.chars().any(char::is_control) {
        return Err(ValidationError::InvalidFormat {
            field: "event_id".to_string(),
            reason: "must not contain control characters".to_string(),
        });
    }

    Ok(())
}

/// Validates a step amount handed in by a caller.
pub fn validate_step(amount: i64) -> ValidationResult<()> {
    if amount < 0 {
        return Err(ValidationError::MustBeNonNegative {
            field: "step".to_string(),
            value: amount,
        });
    }
    Ok(())
}

/// Unwraps a required field of a raw record.
pub fn require<T>(field: &str, value: Option<T>) -> ValidationResult<T> {
    value.ok_or_else(|| ValidationError::Required {
        field: field.to_string(),
    })
}

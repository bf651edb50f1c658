//! # tally-core: Pure Domain Types for Tally
//!
//! This crate holds the types shared by every layer of Tally: the event
//! records the UI reads, the pending deltas that wait for replay, and the
//! validated step amount callers increment with. It has zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tally Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 UI Host (JavaScript bridge)                     │   │
//! │  │   incrementEvent ──► getAllEventDataAsJson ──► getEventData...  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 tally-sync (cache engine)                       │   │
//! │  │     EventSnapshot + PendingDeltaLedger, reload, flush           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────────┐  ┌──────────────┐  ┌──────────────────────┐  │   │
//! │  │   │   types     │  │    error     │  │     validation       │  │   │
//! │  │   │ EventRecord │  │  CoreError   │  │  event ids, steps    │  │   │
//! │  │   │ StepAmount  │  │  Validation  │  │                      │  │   │
//! │  │   └─────────────┘  └──────────────┘  └──────────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO LOCKS • NO NETWORK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - `EventRecord`, `PendingDelta`, `StepAmount`, read results
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation for ids, amounts and raw records
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::{EventRecord, RawEvent, StepAmount};
//!
//! let raw = RawEvent {
//!     id: Some("e1".into()),
//!     name: Some("Dragons slain".into()),
//!     description: Some("Total dragons slain".into()),
//!     formatted_value: Some("10".into()),
//!     icon_ref: None,
//!     value: Some(10),
//! };
//!
//! let mut record = EventRecord::try_from(raw).unwrap();
//! record.apply_step(StepAmount::new(5).unwrap());
//! assert_eq!(record.value, 15);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum length of an event id accepted from the bridge.
///
/// Applies to ids handed in by the host; bulk-loaded ids are kept as sent.
pub const MAX_EVENT_ID_LEN: usize = 256;

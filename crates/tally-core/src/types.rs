//! # Domain Types
//!
//! Core domain types used throughout Tally.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    RawEvent     │──►│   EventRecord   │   │  PendingDelta   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  every field    │   │  id             │   │  id             │       │
//! │  │  optional, as   │   │  name           │   │  amount         │       │
//! │  │  the remote     │   │  description    │   │                 │       │
//! │  │  returns it     │   │  formattedValue │   │  un-replayed    │       │
//! │  │                 │   │  iconRef        │   │  local steps    │       │
//! │  └─────────────────┘   │  value          │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   StepAmount    │   │   EventsView    │   │   EventLookup   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  i64 >= 0       │   │  NotLoaded      │   │  NotLoaded      │       │
//! │  │                 │   │  Empty          │   │  NotFound       │       │
//! │  │                 │   │  Loaded(..)     │   │  Found(..)      │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::validation::{self, ValidationResult};

// =============================================================================
// Step Amount
// =============================================================================

/// A validated, non-negative increment.
///
/// The bridge receives plain integers from JavaScript; they become a
/// `StepAmount` before touching the cache so the increment path itself
/// cannot fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct StepAmount(i64);

impl StepAmount {
    /// Creates a step amount, rejecting negative values.
    pub fn new(amount: i64) -> ValidationResult<Self> {
        validation::validate_step(amount)?;
        Ok(StepAmount(amount))
    }

    /// Returns the amount.
    #[inline]
    pub const fn get(&self) -> i64 {
        self.0
    }

    /// Checks if the step is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for StepAmount {
    fn from(amount: u32) -> Self {
        StepAmount(i64::from(amount))
    }
}

impl TryFrom<i64> for StepAmount {
    type Error = ValidationError;

    fn try_from(amount: i64) -> Result<Self, Self::Error> {
        StepAmount::new(amount)
    }
}

impl std::fmt::Display for StepAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Raw Event
// =============================================================================

/// One record exactly as a bulk load returns it.
///
/// Any field may be missing; [`EventRecord::try_from`] decides whether the
/// record is usable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub formatted_value: Option<String>,
    pub icon_ref: Option<String>,
    pub value: Option<i64>,
}

// =============================================================================
// Event Record
// =============================================================================

/// One counter as last known from the remote source, merged with any local
/// increments applied since.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Stable opaque key, unique within the snapshot.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Display description.
    pub description: String,

    /// Value as the remote service formats it for display.
    ///
    /// Passed through unchanged; it is not recomputed on local increments.
    pub formatted_value: String,

    /// URI-like reference to the event icon, if the event has one.
    pub icon_ref: Option<String>,

    /// Counter value.
    pub value: i64,
}

impl EventRecord {
    /// Adds a step to the counter and returns how much the value rose.
    ///
    /// Saturates at `i64::MAX` so the value never wraps; the returned amount
    /// is then smaller than the step.
    pub fn apply_step(&mut self, step: StepAmount) -> i64 {
        let before = self.value;
        self.value = self.value.saturating_add(step.get());
        self.value - before
    }
}

impl TryFrom<RawEvent> for EventRecord {
    type Error = ValidationError;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        Ok(EventRecord {
            id: validation::require("id", raw.id)?,
            name: validation::require("name", raw.name)?,
            description: validation::require("description", raw.description)?,
            formatted_value: validation::require("formatted_value", raw.formatted_value)?,
            icon_ref: raw.icon_ref,
            value: validation::require("value", raw.value)?,
        })
    }
}

// =============================================================================
// Pending Delta
// =============================================================================

/// The portion of a counter's local value not yet replayed to the remote
/// service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PendingDelta {
    pub id: String,
    pub amount: i64,
}

// =============================================================================
// Read Results
// =============================================================================

/// Result of reading every record from the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventsView {
    /// No reload has completed yet.
    NotLoaded,

    /// A reload completed but returned no records.
    Empty,

    /// Records ordered by id.
    Loaded(Vec<EventRecord>),
}

impl EventsView {
    /// Returns the records, or `None` when there is nothing to show.
    pub fn into_records(self) -> Option<Vec<EventRecord>> {
        match self {
            EventsView::Loaded(records) => Some(records),
            EventsView::NotLoaded | EventsView::Empty => None,
        }
    }

    /// Returns true once any reload has completed.
    pub fn is_loaded(&self) -> bool {
        !matches!(self, EventsView::NotLoaded)
    }
}

/// Result of reading one record from the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventLookup {
    /// The snapshot holds no records at all.
    NotLoaded,

    /// The snapshot has records, but none under this id.
    NotFound,

    Found(EventRecord),
}

impl EventLookup {
    /// Returns the record if found.
    pub fn into_record(self) -> Option<EventRecord> {
        match self {
            EventLookup::Found(record) => Some(record),
            EventLookup::NotLoaded | EventLookup::NotFound => None,
        }
    }

    /// Converts the lookup into a `CoreResult`, naming the missing id.
    pub fn into_result(self, id: &str) -> CoreResult<EventRecord> {
        match self {
            EventLookup::Found(record) => Ok(record),
            EventLookup::NotLoaded => Err(CoreError::NotLoaded),
            EventLookup::NotFound => Err(CoreError::EventNotFound(id.to_string())),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

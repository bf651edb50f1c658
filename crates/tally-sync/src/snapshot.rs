//! # Event Snapshot
//!
//! Latest known record per event key. This is what the UI sees.
//!
//! Entries are written wholesale by reloads and bumped in place by
//! increments. A reload never removes keys it did not return.

use std::collections::BTreeMap;

use tally_core::{EventLookup, EventRecord, EventsView, StepAmount};

/// In-memory map from event id to record.
///
/// Ordered by id so the serialized list is stable across calls.
#[derive(Debug, Default)]
pub struct EventSnapshot {
    records: BTreeMap<String, EventRecord>,
    loaded: bool,
}

impl EventSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once a reload has completed, even one with no records.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn mark_loaded(&mut self) {
        self.loaded = true;
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Inserts or overwrites the record under its id.
    pub fn upsert(&mut self, record: EventRecord) -> Option<EventRecord> {
        self.records.insert(record.id.clone(), record)
    }

    /// Adds `step` to the record under `id`.
    ///
    /// Returns how much the value actually rose, or `None` when the id is
    /// unknown.
    pub fn apply_step(&mut self, id: &str, step: StepAmount) -> Option<i64> {
        let record = self.records.get_mut(id)?;
        Some(record.apply_step(step))
    }

    pub fn view(&self) -> EventsView {
        if !self.loaded {
            EventsView::NotLoaded
        } else if self.records.is_empty() {
            EventsView::Empty
        } else {
            EventsView::Loaded(self.records.values().cloned().collect())
        }
    }

    pub fn lookup(&self, id: &str) -> EventLookup {
        if !self.loaded {
            return EventLookup::NotLoaded;
        }
        match self.records.get(id) {
            Some(record) => EventLookup::Found(record.clone()),
            None => EventLookup::NotFound,
        }
    }
}

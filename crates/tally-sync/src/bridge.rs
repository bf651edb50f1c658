//! # Events Bridge
//!
//! String-in, JSON-out surface exposed to the embedded JavaScript host.
//!
//! The host calls these methods by name through the interface registered as
//! [`DEFAULT_INTERFACE_NAME`] (or the configured override). Inputs arrive
//! untyped, so ids and steps are validated here before they reach the cache.
//! A `None` result serializes to the host's `null` and means there is no
//! data to show yet.

use std::sync::Arc;

use tally_core::validation::validate_event_id;
use tally_core::{EventLookup, EventsView, StepAmount};
use tracing::debug;

use crate::cache::EventCache;
use crate::config::TallyConfig;
use crate::error::TallyResult;

/// Name the bridge is registered under in the JavaScript host.
pub const DEFAULT_INTERFACE_NAME: &str = "__google_play_events";

pub struct EventsBridge {
    cache: Arc<EventCache>,
    interface_name: String,
}

impl EventsBridge {
    /// Creates a bridge registered under the default interface name.
    pub fn new(cache: Arc<EventCache>) -> Self {
        EventsBridge {
            cache,
            interface_name: DEFAULT_INTERFACE_NAME.to_string(),
        }
    }

    pub fn from_config(cache: Arc<EventCache>, config: &TallyConfig) -> Self {
        EventsBridge {
            cache,
            interface_name: config.bridge.interface_name.clone(),
        }
    }

    pub fn interface_name(&self) -> &str {
        &self.interface_name
    }

    pub fn cache(&self) -> &Arc<EventCache> {
        &self.cache
    }

    /// Increments an event by `step`.
    ///
    /// Negative steps and malformed ids are rejected before anything is sent.
    /// The remote outcome is never reported back to the host.
    pub fn increment_event(&self, event_id: &str, step: i64) -> TallyResult<()> {
        validate_event_id(event_id)?;
        let step = StepAmount::new(step)?;

        // Remote call continues in the background
        let _ = self.cache.increment(event_id, step);
        Ok(())
    }

    /// Returns every event as a JSON array, or `None` while there are none.
    pub fn get_all_event_data_as_json(&self) -> TallyResult<Option<String>> {
        match self.cache.get_all() {
            EventsView::Loaded(records) => Ok(Some(serde_json::to_string(&records)?)),
            view @ (EventsView::NotLoaded | EventsView::Empty) => {
                debug!(view = ?view, "No event data for the host");
                Ok(None)
            }
        }
    }

    /// Returns one event as a JSON object, or `None` if it is not cached.
    pub fn get_event_data_as_json(&self, event_id: &str) -> TallyResult<Option<String>> {
        match self.cache.get_one(event_id) {
            EventLookup::Found(record) => Ok(Some(serde_json::to_string(&record)?)),
            EventLookup::NotFound | EventLookup::NotLoaded => Ok(None),
        }
    }
}

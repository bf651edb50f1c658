//! In-memory [`RemoteEventService`].
//!
//! Holds authoritative counters in process. Can be switched offline to
//! exercise the cache's offline path, and journals every call it receives.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tally_core::{EventRecord, RawEvent};

use crate::error::RemoteError;
use crate::remote::RemoteEventService;

/// One call received by the service, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Increment { id: String, amount: i64 },
    LoadAll { force: bool },
}

/// Remote event service backed by a map.
#[derive(Debug)]
pub struct InMemoryEventService {
    events: Mutex<BTreeMap<String, EventRecord>>,
    journal: Mutex<Vec<RemoteCall>>,
    online: AtomicBool,
}

impl Default for InMemoryEventService {
    fn default() -> Self {
        InMemoryEventService {
            events: Mutex::new(BTreeMap::new()),
            journal: Mutex::new(Vec::new()),
            online: AtomicBool::new(true),
        }
    }
}

impl InMemoryEventService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a service already holding `events`.
    pub fn with_events(events: impl IntoIterator<Item = EventRecord>) -> Self {
        let service = Self::default();
        for event in events {
            service.upsert(event);
        }
        service
    }

    /// Inserts or replaces an event.
    pub fn upsert(&self, event: EventRecord) {
        lock(&self.events).insert(event.id.clone(), event);
    }

    /// Simulates connectivity loss (`false`) or recovery (`true`).
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Returns the authoritative value of an event.
    pub fn value_of(&self, id: &str) -> Option<i64> {
        lock(&self.events).get(id).map(|e| e.value)
    }

    /// Returns every call received so far, in order.
    pub fn calls(&self) -> Vec<RemoteCall> {
        lock(&self.journal).clone()
    }

    /// Returns the increment calls received so far, in order.
    pub fn increments(&self) -> Vec<(String, i64)> {
        lock(&self.journal)
            .iter()
            .filter_map(|call| match call {
                RemoteCall::Increment { id, amount } => Some((id.clone(), *amount)),
                RemoteCall::LoadAll { .. } => None,
            })
            .collect()
    }

    fn ensure_online(&self) -> Result<(), RemoteError> {
        if self.is_online() {
            Ok(())
        } else {
            Err(RemoteError::Unavailable("service is offline".into()))
        }
    }
}

#[async_trait]
impl RemoteEventService for InMemoryEventService {
    async fn increment(&self, id: &str, amount: i64) -> Result<(), RemoteError> {
        lock(&self.journal).push(RemoteCall::Increment {
            id: id.to_string(),
            amount,
        });
        self.ensure_online()?;

        let mut events = lock(&self.events);
        let event = events.get_mut(id).ok_or_else(|| RemoteError::Rejected {
            id: id.to_string(),
            reason: "unknown event".into(),
        })?;
        event.value = event.value.saturating_add(amount);
        event.formatted_value = event.value.to_string();
        Ok(())
    }

    async fn load_all(&self, force: bool) -> Result<Vec<RawEvent>, RemoteError> {
        lock(&self.journal).push(RemoteCall::LoadAll { force });
        self.ensure_online()?;

        Ok(lock(&self.events)
            .values()
            .cloned()
            .map(|e| RawEvent {
                id: Some(e.id),
                name: Some(e.name),
                description: Some(e.description),
                formatted_value: Some(e.formatted_value),
                icon_ref: e.icon_ref,
                value: Some(e.value),
            })
            .collect())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

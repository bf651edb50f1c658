//! # Event Cache
//!
//! Optimistic cache of remote event counters.
//!
//! ## Cache Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           EventCache                                    │
//! │                                                                         │
//! │   reload(force)              increment(id, n)          flush_pending()  │
//! │        │                          │                          │          │
//! │        ▼                          ├──► remote.increment      │          │
//! │   remote.load_all                 │    (spawned, ignored)    │          │
//! │        │                          ▼                          ▼          │
//! │        │             ┌───────────────────────────┐   capture ledger     │
//! │        │             │  RwLock<CacheState>       │   replay each entry  │
//! │        └───────────► │                           │   settle replayed    │
//! │      upsert by key   │  EventSnapshot  (id→rec)  │◄──────────┘          │
//! │                      │  PendingLedger  (id→n)    │                      │
//! │                      └───────────────────────────┘                      │
//! │                                                                         │
//! │  One lock guards both maps. No remote call ever runs while it is held. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Remote failures never leave this module as errors. A failed reload leaves
//! the snapshot as it was, a failed increment has already been applied
//! locally, and a failed replay is logged and settled like a delivered one.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tally_core::{
    EventLookup, EventRecord, EventsView, PendingDelta, StepAmount, ValidationError,
};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{ReloadMerge, TallyConfig};
use crate::error::{RemoteError, TallyError, TallyResult};
use crate::ledger::PendingDeltaLedger;
use crate::remote::{BestEffort, RemoteEventService};
use crate::snapshot::EventSnapshot;

// =============================================================================
// Outcomes
// =============================================================================

/// What a reload did. Callers are free to ignore it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The fetched records were merged into the snapshot.
    Applied { records: usize },

    /// The bulk load failed; the snapshot is unchanged.
    Failed(RemoteError),

    /// The bulk load returned an unusable record; nothing was applied.
    Rejected(ValidationError),

    /// No remote client is attached.
    Detached,
}

impl ReloadOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ReloadOutcome::Applied { .. })
    }

    /// Returns true if the same reload could succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReloadOutcome::Failed(e) if e.is_retryable())
    }
}

/// What a flush did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The ledger was empty.
    Idle,

    /// No remote client is attached; the ledger was left intact.
    Detached,

    /// Every captured entry was replayed once and settled.
    Replayed {
        entries: usize,
        delivered: usize,
        failed: usize,
    },
}

// =============================================================================
// Cache Status
// =============================================================================

/// Point-in-time summary of the cache.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub session_id: Uuid,
    pub session_name: String,
    pub loaded: bool,
    pub record_count: usize,
    pub pending_count: usize,
    pub pending_total: i64,
    pub remote_attached: bool,
    pub last_reload_at: Option<DateTime<Utc>>,
    pub last_flush_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Event Cache
// =============================================================================

#[derive(Debug, Default)]
struct CacheState {
    snapshot: EventSnapshot,
    ledger: PendingDeltaLedger,
    last_reload_at: Option<DateTime<Utc>>,
    last_flush_at: Option<DateTime<Utc>>,
}

/// Snapshot, ledger and the remote client for one session.
///
/// Create one per session and drop it when the session ends; nothing is
/// persisted.
pub struct EventCache {
    session_id: Uuid,
    session_name: String,
    merge: ReloadMerge,
    state: RwLock<CacheState>,
    remote: RwLock<Option<Arc<dyn RemoteEventService>>>,
    /// Serializes flushes and reloads. Two replays never capture the same
    /// entries, and a fetch never overlaps a replay whose amounts it would
    /// rebase a second time.
    sync_gate: tokio::sync::Mutex<()>,
    runtime: Handle,
}

impl EventCache {
    /// Creates a cache with default settings on the current tokio runtime.
    pub fn new(merge: ReloadMerge) -> TallyResult<Self> {
        let mut config = TallyConfig::default();
        config.reload.merge = merge;
        Self::from_config(&config)
    }

    /// Creates a cache on the current tokio runtime.
    pub fn from_config(config: &TallyConfig) -> TallyResult<Self> {
        let runtime = Handle::try_current().map_err(|e| TallyError::NoRuntime(e.to_string()))?;
        Ok(Self::with_runtime(config, runtime))
    }

    /// Creates a cache that spawns its remote increments on `runtime`.
    ///
    /// Use this when increments arrive on threads outside the runtime.
    pub fn with_runtime(config: &TallyConfig, runtime: Handle) -> Self {
        let cache = EventCache {
            session_id: Uuid::new_v4(),
            session_name: config.session.name.clone(),
            merge: config.reload.merge,
            state: RwLock::new(CacheState::default()),
            remote: RwLock::new(None),
            sync_gate: tokio::sync::Mutex::new(()),
            runtime,
        };

        info!(
            session = %cache.session_id,
            name = %cache.session_name,
            merge = %cache.merge,
            "Event cache created"
        );

        cache
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    // =========================================================================
    // Remote Client
    // =========================================================================

    /// Attaches (or replaces) the remote client.
    pub fn attach_remote(&self, remote: Arc<dyn RemoteEventService>) {
        *self.remote.write().unwrap_or_else(PoisonError::into_inner) = Some(remote);
        info!(session = %self.session_id, "Remote event service attached");
    }

    /// Detaches the remote client. Local state is kept.
    pub fn detach_remote(&self) {
        let previous = self
            .remote
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if previous.is_some() {
            info!(session = %self.session_id, "Remote event service detached");
        }
    }

    pub fn is_remote_attached(&self) -> bool {
        self.remote
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn remote(&self) -> Option<Arc<dyn RemoteEventService>> {
        self.remote
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn read_state(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Incrementer
    // =========================================================================

    /// Increments an event locally and, best-effort, remotely.
    ///
    /// The remote call is spawned and never awaited here. Locally, the step
    /// lands in both the snapshot and the ledger, but only for ids the
    /// snapshot already holds.
    pub fn increment(&self, id: &str, step: StepAmount) -> BestEffort {
        let effort = match self.remote() {
            Some(remote) => BestEffort::spawn(&self.runtime, remote, id.to_string(), step.get()),
            None => BestEffort::detached(),
        };

        let mut state = self.write_state();

        if state.snapshot.is_empty() {
            debug!(
                session = %self.session_id,
                event_id = %id,
                step = step.get(),
                "Snapshot empty, increment not cached"
            );
            return effort;
        }

        match state.snapshot.apply_step(id, step) {
            Some(added) => {
                state.ledger.add(id, added);
                debug!(
                    session = %self.session_id,
                    event_id = %id,
                    step = step.get(),
                    added,
                    pending = state.ledger.amount(id).unwrap_or(0),
                    "Cached increment"
                );
            }
            None => {
                debug!(
                    session = %self.session_id,
                    event_id = %id,
                    "Unknown event, increment not cached"
                );
            }
        }

        effort
    }

    // =========================================================================
    // Reconciler
    // =========================================================================

    /// Fetches every event from the remote service and merges it into the
    /// snapshot.
    ///
    /// Records are overwritten by key; keys the fetch did not return stay as
    /// they are. If any returned record is unusable, none are applied.
    ///
    /// Waits for a running flush to settle first, so the pending amounts
    /// rebased onto the fetch are never already part of it.
    pub async fn reload(&self, force: bool) -> ReloadOutcome {
        let Some(remote) = self.remote() else {
            debug!(session = %self.session_id, "No remote attached, skipping reload");
            return ReloadOutcome::Detached;
        };

        let _gate = self.sync_gate.lock().await;

        let raw = match remote.load_all(force).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(session = %self.session_id, error = %e, force, "Event reload failed");
                return ReloadOutcome::Failed(e);
            }
        };

        let records = match raw
            .into_iter()
            .map(EventRecord::try_from)
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    session = %self.session_id,
                    error = %e,
                    "Rejecting bulk load with an invalid record"
                );
                return ReloadOutcome::Rejected(e);
            }
        };

        let count = records.len();
        {
            let mut state = self.write_state();
            for mut record in records {
                if self.merge == ReloadMerge::RebasePending {
                    if let Some(pending) = state.ledger.amount(&record.id) {
                        record.value = record.value.saturating_add(pending);
                    }
                }
                state.snapshot.upsert(record);
            }
            state.snapshot.mark_loaded();
            state.last_reload_at = Some(Utc::now());
        }

        info!(
            session = %self.session_id,
            records = count,
            force,
            "Event snapshot reloaded"
        );

        ReloadOutcome::Applied { records: count }
    }

    // =========================================================================
    // Flusher
    // =========================================================================

    /// Replays every pending delta to the remote service.
    ///
    /// The ledger is captured up front, each entry is sent as one remote
    /// increment for its full amount, and then exactly the captured amounts
    /// are settled. Increments that land during the replay stay pending.
    /// The replay goes straight to the remote service and never re-enters
    /// the ledger.
    pub async fn flush_pending(&self) -> FlushOutcome {
        let _gate = self.sync_gate.lock().await;

        let captured = self.read_state().ledger.entries();
        if captured.is_empty() {
            return FlushOutcome::Idle;
        }

        let Some(remote) = self.remote() else {
            debug!(
                session = %self.session_id,
                pending = captured.len(),
                "No remote attached, keeping pending deltas"
            );
            return FlushOutcome::Detached;
        };

        let mut delivered = 0;
        let mut failed = 0;
        for delta in &captured {
            match remote.increment(&delta.id, delta.amount).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    failed += 1;
                    warn!(
                        session = %self.session_id,
                        event_id = %delta.id,
                        amount = delta.amount,
                        error = %e,
                        "Replay of pending delta failed"
                    );
                }
            }
        }

        {
            let mut state = self.write_state();
            for delta in &captured {
                state.ledger.settle(&delta.id, delta.amount);
            }
            state.last_flush_at = Some(Utc::now());
        }

        info!(
            session = %self.session_id,
            entries = captured.len(),
            delivered,
            failed,
            "Flushed pending deltas"
        );

        FlushOutcome::Replayed {
            entries: captured.len(),
            delivered,
            failed,
        }
    }

    // =========================================================================
    // Readers
    // =========================================================================

    /// Returns every record, ordered by id.
    pub fn get_all(&self) -> EventsView {
        self.read_state().snapshot.view()
    }

    /// Returns the record for `id`.
    pub fn get_one(&self, id: &str) -> EventLookup {
        self.read_state().snapshot.lookup(id)
    }

    /// Returns every pending delta, ordered by id.
    pub fn pending(&self) -> Vec<PendingDelta> {
        self.read_state().ledger.entries()
    }

    pub fn pending_amount(&self, id: &str) -> Option<i64> {
        self.read_state().ledger.amount(id)
    }

    pub fn status(&self) -> CacheStatus {
        let remote_attached = self.is_remote_attached();
        let state = self.read_state();

        CacheStatus {
            session_id: self.session_id,
            session_name: self.session_name.clone(),
            loaded: state.snapshot.is_loaded(),
            record_count: state.snapshot.len(),
            pending_count: state.ledger.len(),
            pending_total: state.ledger.total(),
            remote_attached,
            last_reload_at: state.last_reload_at,
            last_flush_at: state.last_flush_at,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryEventService;
    use async_trait::async_trait;
    use std::time::Duration;
    use tally_core::RawEvent;
    use tokio::sync::{Notify, Semaphore};

    fn event(id: &str, value: i64) -> EventRecord {
        EventRecord {
            id: id.into(),
            name: format!("{id} name"),
            description: format!("{id} description"),
            formatted_value: value.to_string(),
            icon_ref: Some(format!("content://icons/{id}.png")),
            value,
        }
    }

    async fn loaded_cache(
        merge: ReloadMerge,
        events: Vec<EventRecord>,
    ) -> (Arc<EventCache>, Arc<InMemoryEventService>) {
        let cache = Arc::new(EventCache::new(merge).unwrap());
        let remote = Arc::new(InMemoryEventService::with_events(events));
        cache.attach_remote(remote.clone());
        assert!(cache.reload(false).await.is_applied());
        (cache, remote)
    }

    fn value_of(cache: &EventCache, id: &str) -> Option<i64> {
        cache.get_one(id).into_record().map(|r| r.value)
    }

    /// Remote whose bulk load answers with a fixed result.
    struct ScriptedRemote {
        load: Result<Vec<RawEvent>, RemoteError>,
    }

    #[async_trait]
    impl RemoteEventService for ScriptedRemote {
        async fn increment(&self, _id: &str, _amount: i64) -> Result<(), RemoteError> {
            Ok(())
        }

        async fn load_all(&self, _force: bool) -> Result<Vec<RawEvent>, RemoteError> {
            self.load.clone()
        }
    }

    /// Remote that applies each increment, then parks until the test
    /// releases it.
    struct GatedRemote {
        inner: InMemoryEventService,
        entered: Notify,
        release: Semaphore,
    }

    #[async_trait]
    impl RemoteEventService for GatedRemote {
        async fn increment(&self, id: &str, amount: i64) -> Result<(), RemoteError> {
            let applied = self.inner.increment(id, amount).await;
            self.entered.notify_one();
            let _permit = self
                .release
                .acquire()
                .await
                .map_err(|e| RemoteError::Aborted(e.to_string()))?;
            applied
        }

        async fn load_all(&self, force: bool) -> Result<Vec<RawEvent>, RemoteError> {
            self.inner.load_all(force).await
        }
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_unloaded_cache_has_no_data() {
        let cache = EventCache::new(ReloadMerge::RebasePending).unwrap();
        assert_eq!(cache.get_all(), EventsView::NotLoaded);
        assert_eq!(cache.get_one("e1"), EventLookup::NotLoaded);
    }

    #[tokio::test]
    async fn test_offline_increments_are_replayed_by_flush() {
        let (cache, remote) = loaded_cache(ReloadMerge::RebasePending, vec![event("e1", 10)]).await;

        // Freshly loaded
        assert_eq!(value_of(&cache, "e1"), Some(10));
        assert!(cache.pending().is_empty());

        // Offline while the player keeps scoring
        remote.set_online(false);

        let effort = cache.increment("e1", StepAmount::from(5));
        assert!(matches!(effort.outcome().await, crate::remote::RemoteOutcome::Failed(_)));
        assert_eq!(value_of(&cache, "e1"), Some(15));
        assert_eq!(cache.pending_amount("e1"), Some(5));

        // Accumulates
        cache.increment("e1", StepAmount::from(3)).outcome().await;
        assert_eq!(value_of(&cache, "e1"), Some(18));
        assert_eq!(cache.pending_amount("e1"), Some(8));

        // Back online, replay the whole amount once
        remote.set_online(true);
        let before = remote.increments().len();
        let outcome = cache.flush_pending().await;

        assert_eq!(
            outcome,
            FlushOutcome::Replayed {
                entries: 1,
                delivered: 1,
                failed: 0
            }
        );
        assert_eq!(remote.increments()[before..], [("e1".to_string(), 8)]);
        assert!(cache.pending().is_empty());
        assert_eq!(value_of(&cache, "e1"), Some(18));
        assert_eq!(remote.value_of("e1"), Some(18));
    }

    #[tokio::test]
    async fn test_unknown_event_is_ignored() {
        let (cache, remote) = loaded_cache(ReloadMerge::RebasePending, vec![event("e1", 10)]).await;

        cache.increment("unknown", StepAmount::from(5)).outcome().await;

        assert_eq!(cache.get_all().into_records(), Some(vec![event("e1", 10)]));
        assert!(cache.pending().is_empty());
        // The remote attempt is still made
        assert_eq!(remote.increments(), vec![("unknown".to_string(), 5)]);
    }

    // -------------------------------------------------------------------------
    // Increment and flush
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_merge_invariant_holds_for_any_step_sequence() {
        let (cache, _remote) =
            loaded_cache(ReloadMerge::RebasePending, vec![event("e1", 7), event("e2", 0)]).await;
        cache.detach_remote();

        let steps = [1, 0, 12, 3, 40, 1, 1, 9];
        for step in steps {
            let _ = cache.increment("e1", StepAmount::new(step).unwrap());
        }

        let sum: i64 = steps.iter().sum();
        assert_eq!(value_of(&cache, "e1"), Some(7 + sum));
        assert_eq!(cache.pending_amount("e1"), Some(sum));
        assert_eq!(value_of(&cache, "e2"), Some(0));
        assert_eq!(cache.pending_amount("e2"), None);
    }

    #[tokio::test]
    async fn test_zero_step_leaves_ledger_clean() {
        let (cache, _remote) = loaded_cache(ReloadMerge::RebasePending, vec![event("e1", 7)]).await;
        cache.increment("e1", StepAmount::from(0)).outcome().await;

        assert_eq!(value_of(&cache, "e1"), Some(7));
        assert!(cache.pending().is_empty());
    }

    #[tokio::test]
    async fn test_increment_before_load_touches_nothing() {
        let cache = EventCache::new(ReloadMerge::RebasePending).unwrap();
        let remote = Arc::new(InMemoryEventService::with_events(vec![event("e1", 10)]));
        cache.attach_remote(remote.clone());

        cache.increment("e1", StepAmount::from(5)).outcome().await;

        assert_eq!(cache.get_all(), EventsView::NotLoaded);
        assert!(cache.pending().is_empty());
        // Remote still got it
        assert_eq!(remote.value_of("e1"), Some(15));
    }

    #[tokio::test]
    async fn test_flush_replays_each_key_once_with_its_full_amount() {
        let (cache, remote) =
            loaded_cache(ReloadMerge::RebasePending, vec![event("a", 1), event("b", 2)]).await;
        cache.detach_remote();

        for _ in 0..3 {
            let _ = cache.increment("a", StepAmount::from(2));
        }
        let _ = cache.increment("b", StepAmount::from(10));

        cache.attach_remote(remote.clone());
        cache.flush_pending().await;

        assert_eq!(
            remote.increments(),
            vec![("a".to_string(), 6), ("b".to_string(), 10)]
        );
        assert!(cache.pending().is_empty());
        assert_eq!(cache.flush_pending().await, FlushOutcome::Idle);
    }

    #[tokio::test]
    async fn test_failed_replay_is_still_settled() {
        let (cache, remote) = loaded_cache(ReloadMerge::RebasePending, vec![event("e1", 1)]).await;
        cache.detach_remote();
        let _ = cache.increment("e1", StepAmount::from(4));

        remote.set_online(false);
        cache.attach_remote(remote.clone());

        assert_eq!(
            cache.flush_pending().await,
            FlushOutcome::Replayed {
                entries: 1,
                delivered: 0,
                failed: 1
            }
        );
        assert!(cache.pending().is_empty());
        assert_eq!(value_of(&cache, "e1"), Some(5));
    }

    #[tokio::test]
    async fn test_flush_without_remote_keeps_ledger() {
        let (cache, _remote) = loaded_cache(ReloadMerge::RebasePending, vec![event("e1", 1)]).await;
        cache.detach_remote();
        let _ = cache.increment("e1", StepAmount::from(4));

        assert_eq!(cache.flush_pending().await, FlushOutcome::Detached);
        assert_eq!(cache.pending_amount("e1"), Some(4));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_increment_racing_a_flush_is_not_lost() {
        let gated = Arc::new(GatedRemote {
            inner: InMemoryEventService::with_events(vec![event("e1", 10)]),
            entered: Notify::new(),
            release: Semaphore::new(0),
        });

        let cache = Arc::new(EventCache::new(ReloadMerge::RebasePending).unwrap());
        cache.attach_remote(gated.clone());
        assert!(cache.reload(true).await.is_applied());

        cache.detach_remote();
        let _ = cache.increment("e1", StepAmount::from(5));
        let _ = cache.increment("e1", StepAmount::from(3));
        cache.attach_remote(gated.clone());

        let flush = tokio::spawn({
            let cache = cache.clone();
            async move { cache.flush_pending().await }
        });

        // The flush has captured {e1: 8} and is parked inside the replay
        gated.entered.notified().await;
        let _ = cache.increment("e1", StepAmount::from(2));
        gated.release.add_permits(2);

        let outcome = flush.await.unwrap();
        assert!(matches!(outcome, FlushOutcome::Replayed { entries: 1, .. }));
        assert_eq!(cache.pending_amount("e1"), Some(2));
        assert_eq!(value_of(&cache, "e1"), Some(20));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reload_during_flush_does_not_count_replay_twice() {
        let gated = Arc::new(GatedRemote {
            inner: InMemoryEventService::with_events(vec![event("e1", 10)]),
            entered: Notify::new(),
            release: Semaphore::new(0),
        });

        let cache = Arc::new(EventCache::new(ReloadMerge::RebasePending).unwrap());
        cache.attach_remote(gated.clone());
        assert!(cache.reload(true).await.is_applied());

        cache.detach_remote();
        let _ = cache.increment("e1", StepAmount::from(8));
        cache.attach_remote(gated.clone());

        let flush = tokio::spawn({
            let cache = cache.clone();
            async move { cache.flush_pending().await }
        });

        // The remote already counts the replayed 8; the flush has not settled
        gated.entered.notified().await;
        assert_eq!(gated.inner.value_of("e1"), Some(18));

        let reload = tokio::spawn({
            let cache = cache.clone();
            async move { cache.reload(true).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        gated.release.add_permits(1);

        assert!(matches!(flush.await.unwrap(), FlushOutcome::Replayed { .. }));
        assert!(reload.await.unwrap().is_applied());

        assert!(cache.pending().is_empty());
        assert_eq!(value_of(&cache, "e1"), Some(18));
        assert_eq!(gated.inner.value_of("e1"), Some(18));
    }

    #[tokio::test]
    async fn test_ledger_tracks_saturated_value() {
        let (cache, _remote) =
            loaded_cache(ReloadMerge::RebasePending, vec![event("e1", i64::MAX - 3)]).await;
        cache.detach_remote();

        let _ = cache.increment("e1", StepAmount::from(10));
        let _ = cache.increment("e1", StepAmount::from(10));

        assert_eq!(value_of(&cache, "e1"), Some(i64::MAX));
        assert_eq!(cache.pending_amount("e1"), Some(3));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_increments_from_many_threads() {
        let (cache, _remote) =
            loaded_cache(ReloadMerge::RebasePending, vec![event("e1", 10), event("e2", 0)]).await;
        cache.detach_remote();

        let threads: Vec<_> = (0..4)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    let id = if i % 2 == 0 { "e1" } else { "e2" };
                    for _ in 0..250 {
                        let _ = cache.increment(id, StepAmount::from(1));
                    }
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(value_of(&cache, "e1"), Some(510));
        assert_eq!(value_of(&cache, "e2"), Some(500));
        assert_eq!(cache.pending_amount("e1"), Some(500));
        assert_eq!(cache.pending_amount("e2"), Some(500));
    }

    // -------------------------------------------------------------------------
    // Reload
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_reload_rebases_pending_on_fetched_value() {
        let (cache, remote) = loaded_cache(ReloadMerge::RebasePending, vec![event("e1", 10)]).await;
        remote.set_online(false);
        cache.increment("e1", StepAmount::from(8)).outcome().await;

        remote.set_online(true);
        assert!(cache.reload(true).await.is_applied());

        assert_eq!(value_of(&cache, "e1"), Some(18));
        assert_eq!(cache.pending_amount("e1"), Some(8));
    }

    #[tokio::test]
    async fn test_reload_overwrite_takes_remote_value() {
        let (cache, remote) = loaded_cache(ReloadMerge::Overwrite, vec![event("e1", 10)]).await;
        remote.set_online(false);
        cache.increment("e1", StepAmount::from(8)).outcome().await;

        remote.set_online(true);
        assert!(cache.reload(true).await.is_applied());

        assert_eq!(value_of(&cache, "e1"), Some(10));
        assert_eq!(cache.pending_amount("e1"), Some(8));
    }

    #[tokio::test]
    async fn test_reload_keeps_keys_missing_from_fetch() {
        let (cache, _remote) =
            loaded_cache(ReloadMerge::RebasePending, vec![event("e1", 10), event("e2", 4)]).await;

        cache.attach_remote(Arc::new(InMemoryEventService::with_events(vec![event(
            "e1", 50,
        )])));
        assert_eq!(cache.reload(false).await, ReloadOutcome::Applied { records: 1 });

        assert_eq!(value_of(&cache, "e1"), Some(50));
        assert_eq!(value_of(&cache, "e2"), Some(4));
    }

    #[tokio::test]
    async fn test_failed_reload_leaves_snapshot_alone() {
        let (cache, remote) = loaded_cache(ReloadMerge::RebasePending, vec![event("e1", 10)]).await;
        remote.set_online(false);

        let outcome = cache.reload(true).await;
        assert!(outcome.is_retryable());
        assert_eq!(value_of(&cache, "e1"), Some(10));
    }

    #[tokio::test]
    async fn test_partially_null_bulk_load_is_not_applied() {
        let cache = EventCache::new(ReloadMerge::RebasePending).unwrap();
        let good = RawEvent {
            id: Some("e1".into()),
            name: Some("Good".into()),
            description: Some("Good".into()),
            formatted_value: Some("1".into()),
            icon_ref: None,
            value: Some(1),
        };
        let bad = RawEvent {
            value: None,
            id: Some("e2".into()),
            ..good.clone()
        };

        cache.attach_remote(Arc::new(ScriptedRemote {
            load: Ok(vec![good, bad]),
        }));

        let outcome = cache.reload(false).await;
        assert!(matches!(outcome, ReloadOutcome::Rejected(_)));
        assert!(!outcome.is_retryable());
        assert_eq!(cache.get_all(), EventsView::NotLoaded);
    }

    #[tokio::test]
    async fn test_bulk_load_keeps_values_as_sent() {
        let cache = EventCache::new(ReloadMerge::RebasePending).unwrap();
        cache.attach_remote(Arc::new(InMemoryEventService::with_events(vec![
            event("e1", 1),
            event("e2", -1),
        ])));

        assert_eq!(cache.reload(false).await, ReloadOutcome::Applied { records: 2 });
        assert_eq!(value_of(&cache, "e2"), Some(-1));
    }

    #[tokio::test]
    async fn test_empty_bulk_load_marks_loaded_but_empty() {
        let cache = EventCache::new(ReloadMerge::RebasePending).unwrap();
        cache.attach_remote(Arc::new(ScriptedRemote { load: Ok(vec![]) }));

        assert_eq!(cache.reload(false).await, ReloadOutcome::Applied { records: 0 });
        assert_eq!(cache.get_all(), EventsView::Empty);
        assert_eq!(cache.get_one("e1"), EventLookup::NotFound);
    }

    #[tokio::test]
    async fn test_reload_without_remote_is_detached() {
        let cache = EventCache::new(ReloadMerge::RebasePending).unwrap();
        assert_eq!(cache.reload(true).await, ReloadOutcome::Detached);
    }

    #[tokio::test]
    async fn test_detached_increment_still_updates_local_state() {
        let (cache, remote) = loaded_cache(ReloadMerge::RebasePending, vec![event("e1", 10)]).await;
        cache.detach_remote();

        let effort = cache.increment("e1", StepAmount::from(2));
        assert!(effort.is_detached());
        assert_eq!(value_of(&cache, "e1"), Some(12));
        assert!(remote.increments().is_empty());
    }

    #[tokio::test]
    async fn test_status_reflects_state() {
        let (cache, _remote) =
            loaded_cache(ReloadMerge::RebasePending, vec![event("e1", 10), event("e2", 1)]).await;
        cache.detach_remote();
        let _ = cache.increment("e1", StepAmount::from(3));

        let status = cache.status();
        assert!(status.loaded);
        assert!(!status.remote_attached);
        assert_eq!(status.record_count, 2);
        assert_eq!(status.pending_count, 1);
        assert_eq!(status.pending_total, 3);
        assert!(status.last_reload_at.is_some());
        assert!(status.last_flush_at.is_none());
        assert_eq!(status.session_id, cache.session_id());
    }

    #[test]
    fn test_cache_needs_a_runtime() {
        assert!(matches!(
            EventCache::new(ReloadMerge::RebasePending),
            Err(TallyError::NoRuntime(_))
        ));
    }
}

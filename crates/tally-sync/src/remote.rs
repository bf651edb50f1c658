//! # Remote Event Service
//!
//! The seam between the cache and the authoritative counter store.
//!
//! ## Call Shapes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Remote Calls Issued by the Cache                    │
//! │                                                                         │
//! │  increment(id, n) ── fire-and-forget ──► BestEffort (may be dropped)   │
//! │                                                                         │
//! │  load_all(force) ─── awaited by reload ──► Vec<RawEvent> | RemoteError │
//! │                                                                         │
//! │  Every failure stays inside the cache: a reload leaves the snapshot    │
//! │  alone, an increment has already updated local state.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tally_core::RawEvent;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::RemoteError;

/// Authoritative store of event counters.
///
/// Implementations own transport, authentication and retries; the cache only
/// needs these two calls.
#[async_trait]
pub trait RemoteEventService: Send + Sync {
    /// Adds `amount` to the remote counter for `id`.
    async fn increment(&self, id: &str, amount: i64) -> Result<(), RemoteError>;

    /// Fetches every event. `force` bypasses any service-side cache.
    async fn load_all(&self, force: bool) -> Result<Vec<RawEvent>, RemoteError>;
}

// =============================================================================
// Remote Outcome
// =============================================================================

/// What happened to one best-effort remote increment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// The service accepted the increment.
    Delivered,

    /// The service failed; the failure was logged and dropped.
    Failed(RemoteError),

    /// No remote client was attached, so no call was made.
    Detached,
}

impl RemoteOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, RemoteOutcome::Delivered)
    }
}

// =============================================================================
// Best Effort
// =============================================================================

/// Handle to a fire-and-forget remote increment.
///
/// Dropping it lets the call finish in the background. Awaiting
/// [`BestEffort::outcome`] is only needed by callers that care.
#[derive(Debug)]
pub struct BestEffort {
    task: Option<JoinHandle<RemoteOutcome>>,
}

impl BestEffort {
    /// A call that was never issued because no client is attached.
    pub fn detached() -> Self {
        BestEffort { task: None }
    }

    /// Spawns the remote increment on `runtime`.
    pub(crate) fn spawn(
        runtime: &Handle,
        remote: Arc<dyn RemoteEventService>,
        id: String,
        amount: i64,
    ) -> Self {
        let task = runtime.spawn(async move {
            match remote.increment(&id, amount).await {
                Ok(()) => {
                    debug!(event_id = %id, amount, "Remote increment delivered");
                    RemoteOutcome::Delivered
                }
                Err(e) => {
                    warn!(event_id = %id, amount, error = %e, "Remote increment failed");
                    RemoteOutcome::Failed(e)
                }
            }
        });

        BestEffort { task: Some(task) }
    }

    /// Returns true if no call was issued.
    pub fn is_detached(&self) -> bool {
        self.task.is_none()
    }

    /// Waits for the remote call to finish.
    pub async fn outcome(self) -> RemoteOutcome {
        match self.task {
            None => RemoteOutcome::Detached,
            Some(task) => task
                .await
                .unwrap_or_else(|e| RemoteOutcome::Failed(RemoteError::Aborted(e.to_string()))),
        }
    }
}

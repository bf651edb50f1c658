//! # tally-sync: Optimistic Event Counter Cache
//!
//! This crate keeps a local, optimistically-updated copy of remote event
//! counters so a UI can show increments immediately, and replays what the
//! remote service may have missed once it is reachable again.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Tally Cache Architecture                        │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                EventsBridge (JavaScript host)                    │  │
//! │  │  increment_event · get_all_event_data_as_json · get_event_...    │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               ▼                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                         EventCache                               │  │
//! │  │                                                                  │  │
//! │  │   EventSnapshot (id → record)     PendingDeltaLedger (id → n)    │  │
//! │  │                                                                  │  │
//! │  │   increment ─ reload ─ flush_pending ─ get_all ─ get_one        │  │
//! │  └───────────────┬──────────────────────────────▲───────────────────┘  │
//! │                  │                              │                       │
//! │                  ▼                              │                       │
//! │  ┌────────────────────────────┐   ┌─────────────┴────────────────┐     │
//! │  │   RemoteEventService       │   │        EventsAgent           │     │
//! │  │   increment · load_all     │   │  connect/disconnect, timers, │     │
//! │  │   (InMemoryEventService)   │   │  reload retry with backoff   │     │
//! │  └────────────────────────────┘   └──────────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`cache`] - `EventCache`: increments, reloads, flushes and reads
//! - [`snapshot`] - Latest known record per event
//! - [`ledger`] - Accumulated un-replayed increments
//! - [`remote`] - `RemoteEventService` trait and best-effort call handles
//! - [`memory`] - In-memory remote service
//! - [`bridge`] - JSON facade for the JavaScript host
//! - [`agent`] - Background lifecycle agent
//! - [`config`] - Configuration (reload merge, timers, retry bounds)
//! - [`error`] - Error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tally_sync::{EventCache, EventsAgent, EventsBridge, InMemoryEventService, TallyConfig};
//!
//! # async fn run() -> tally_sync::TallyResult<()> {
//! let config = TallyConfig::load_or_default(None);
//! let cache = Arc::new(EventCache::from_config(&config)?);
//!
//! let agent = EventsAgent::new(cache.clone(), config.clone()).start();
//! agent.connected(Arc::new(InMemoryEventService::new())).await?;
//!
//! let bridge = EventsBridge::from_config(cache, &config);
//! bridge.increment_event("CgkIl8XfzJYbEAIQAQ", 1)?;
//! println!("{:?}", bridge.get_all_event_data_as_json()?);
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod bridge;
pub mod cache;
pub mod config;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod remote;
pub mod snapshot;

// =============================================================================
// Re-exports
// =============================================================================

pub use agent::{AgentHandle, EventsAgent};
pub use bridge::{EventsBridge, DEFAULT_INTERFACE_NAME};
pub use cache::{CacheStatus, EventCache, FlushOutcome, ReloadOutcome};
pub use config::{ReloadMerge, TallyConfig};
pub use error::{RemoteError, TallyError, TallyResult};
pub use ledger::PendingDeltaLedger;
pub use memory::{InMemoryEventService, RemoteCall};
pub use remote::{BestEffort, RemoteEventService, RemoteOutcome};
pub use snapshot::EventSnapshot;

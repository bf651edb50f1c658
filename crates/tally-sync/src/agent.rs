//! # Events Agent
//!
//! Background task that drives the cache through the connection lifecycle.
//!
//! ## Agent Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           EventsAgent                                   │
//! │                                                                         │
//! │  AgentHandle ──mpsc──►  run loop                                        │
//! │                           │                                             │
//! │   Connected(remote)  ─────┼──► attach, reload(force_on_start), flush   │
//! │   Disconnected       ─────┼──► detach (local state kept)               │
//! │   Reload { force }   ─────┼──► reload                                   │
//! │   Flush              ─────┼──► flush_pending                            │
//! │   Shutdown(ack)      ─────┼──► final flush, ack, exit                   │
//! │                           │                                             │
//! │   reload timer tick  ─────┼──► reload(false)       (interval_secs > 0) │
//! │   flush timer tick   ─────┴──► flush_pending       (interval_secs > 0) │
//! │                                                                         │
//! │  A reload that fails with a retryable error is retried in a spawned    │
//! │  task with exponential backoff. A newer reload or a disconnect         │
//! │  cancels it.                                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cache::{EventCache, ReloadOutcome};
use crate::config::TallyConfig;
use crate::error::{TallyError, TallyResult};
use crate::remote::RemoteEventService;

/// Command channel capacity.
const COMMAND_BUFFER: usize = 64;

/// Period for timers that are switched off; their tick is never polled.
const IDLE_PERIOD: Duration = Duration::from_secs(3600);

// =============================================================================
// Handle
// =============================================================================

/// Handle for controlling the agent.
#[derive(Clone)]
pub struct AgentHandle {
    cmd_tx: mpsc::Sender<AgentCommand>,
}

enum AgentCommand {
    Reload { force: bool },
    Flush,
    Connected(Arc<dyn RemoteEventService>),
    Disconnected,
    Shutdown(oneshot::Sender<()>),
}

impl AgentHandle {
    /// Requests a reload from the remote service.
    pub async fn reload(&self, force: bool) -> TallyResult<()> {
        self.send(AgentCommand::Reload { force }).await
    }

    /// Requests a flush of pending deltas.
    pub async fn flush(&self) -> TallyResult<()> {
        self.send(AgentCommand::Flush).await
    }

    /// Reports that a remote client is available.
    pub async fn connected(&self, remote: Arc<dyn RemoteEventService>) -> TallyResult<()> {
        self.send(AgentCommand::Connected(remote)).await
    }

    /// Reports that the remote client went away.
    pub async fn disconnected(&self) -> TallyResult<()> {
        self.send(AgentCommand::Disconnected).await
    }

    /// Stops the agent after a final flush and waits for it to finish.
    pub async fn shutdown(&self) -> TallyResult<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(AgentCommand::Shutdown(ack_tx)).await?;
        ack_rx
            .await
            .map_err(|_| TallyError::ChannelError("Events agent stopped before acknowledging".into()))
    }

    async fn send(&self, cmd: AgentCommand) -> TallyResult<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| TallyError::ChannelError("Events agent channel closed".into()))
    }
}

// =============================================================================
// Agent
// =============================================================================

pub struct EventsAgent {
    cache: Arc<EventCache>,
    config: TallyConfig,
}

impl EventsAgent {
    pub fn new(cache: Arc<EventCache>, config: TallyConfig) -> Self {
        EventsAgent { cache, config }
    }

    /// Starts the agent and returns a handle.
    pub fn start(self) -> AgentHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

        tokio::spawn(async move {
            self.run(cmd_rx).await;
        });

        AgentHandle { cmd_tx }
    }

    /// Main agent loop.
    async fn run(self, mut cmd_rx: mpsc::Receiver<AgentCommand>) {
        let reload_every = self.config.reload.interval();
        let flush_every = self.config.flush.interval();

        info!(
            session = %self.cache.session_id(),
            reload_interval = ?reload_every,
            flush_interval = ?flush_every,
            "Events agent started"
        );

        let mut reload_timer = periodic(reload_every);
        let mut flush_timer = periodic(flush_every);
        let mut retry: Option<JoinHandle<()>> = None;

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else {
                        info!("Events agent handles dropped, stopping");
                        break;
                    };

                    match cmd {
                        AgentCommand::Connected(remote) => {
                            self.cache.attach_remote(remote);
                            self.reload(&mut retry, self.config.reload.force_on_start).await;
                            if self.config.flush.on_connect {
                                self.cache.flush_pending().await;
                            }
                        }
                        AgentCommand::Disconnected => {
                            cancel(&mut retry);
                            self.cache.detach_remote();
                        }
                        AgentCommand::Reload { force } => {
                            self.reload(&mut retry, force).await;
                        }
                        AgentCommand::Flush => {
                            self.cache.flush_pending().await;
                        }
                        AgentCommand::Shutdown(ack) => {
                            info!("Events agent shutting down");
                            cancel(&mut retry);
                            self.cache.flush_pending().await;
                            cmd_rx.close();
                            let _ = ack.send(());
                            break;
                        }
                    }
                }
                _ = reload_timer.tick(), if reload_every.is_some() => {
                    self.reload(&mut retry, false).await;
                }
                _ = flush_timer.tick(), if flush_every.is_some() => {
                    self.cache.flush_pending().await;
                }
            }
        }
    }

    /// Reloads once, then keeps retrying in the background if the failure
    /// was transient.
    async fn reload(&self, retry: &mut Option<JoinHandle<()>>, force: bool) {
        cancel(retry);

        let outcome = self.cache.reload(force).await;
        if outcome.is_retryable() && self.config.reload.retries_enabled() {
            *retry = Some(self.spawn_retry(force));
        }
    }

    fn spawn_retry(&self, force: bool) -> JoinHandle<()> {
        let cache = self.cache.clone();
        let mut backoff = self.create_backoff();

        tokio::spawn(async move {
            loop {
                let Some(delay) = backoff.next_backoff() else {
                    warn!(force, "Giving up on event reload");
                    return;
                };

                debug!(delay_ms = delay.as_millis() as u64, force, "Retrying event reload");
                tokio::time::sleep(delay).await;

                match cache.reload(force).await {
                    outcome if outcome.is_retryable() => continue,
                    ReloadOutcome::Applied { records } => {
                        info!(records, "Event reload succeeded after retry");
                        return;
                    }
                    _ => return,
                }
            }
        })
    }

    /// Creates the exponential backoff configuration.
    fn create_backoff(&self) -> ExponentialBackoff {
        let reload = &self.config.reload;
        ExponentialBackoff {
            initial_interval: Duration::from_millis(reload.retry_initial_backoff_ms),
            max_interval: Duration::from_secs(reload.retry_max_backoff_secs),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(reload.retry_max_elapsed_secs)),
            ..Default::default()
        }
    }
}

fn cancel(retry: &mut Option<JoinHandle<()>>) {
    if let Some(task) = retry.take() {
        task.abort();
    }
}

/// Interval whose first tick is one full period away.
fn periodic(period: Option<Duration>) -> Interval {
    let period = period.unwrap_or(IDLE_PERIOD);
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

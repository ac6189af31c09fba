//! # Sale Sync Engine
//!
//! Drains the offline sale queue against the remote submission endpoint.
//!
//! ## Drain Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Sale Sync Engine                                   │
//! │                                                                         │
//! │  TRIGGERS                                                               │
//! │  • enqueue (fire-and-forget, coalesced through a bounded channel)       │
//! │  • periodic timer (catch-up after offline stretches)                    │
//! │  • manual sync_now (awaits a DrainReport)                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │          SINGLE WORKER (single-flight by construction)          │    │
//! │  │                                                                 │    │
//! │  │  1. list_pending()  - Queued|Failed, FIFO order                 │    │
//! │  │  2. empty? no-op (cheap to trigger often)                       │    │
//! │  │  3. per item:                                                   │    │
//! │  │     a. mark_syncing (CAS; loser skips the item)                 │    │
//! │  │     b. submit with item id as idempotency token                 │    │
//! │  │     c. ok         → mark_synced                                 │    │
//! │  │        retryable  → mark_failed,  CONTINUE with next item       │    │
//! │  │        rejection  → mark_rejected, CONTINUE with next item      │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │                                                                         │
//! │  No inline retry loop: a failed item waits for the next trigger.        │
//! │  Item N+1 may sync while item N sits failed; there is no cross-item     │
//! │  atomicity.                                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use atlas_db::Database;

use crate::client::ApiClient;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Drain Report
// =============================================================================

/// Outcome of one drain cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Items the drain picked up.
    pub attempted: usize,
    /// Confirmed by the remote.
    pub synced: usize,
    /// Transport failures; will be retried by a future drain.
    pub failed: usize,
    /// Business-rule rejections; parked until an operator requeues them.
    pub rejected: usize,
}

// =============================================================================
// Commands
// =============================================================================

enum EngineCommand {
    /// Run a drain. `reply` is present for sync_now callers.
    Drain {
        reply: Option<oneshot::Sender<SyncResult<DrainReport>>>,
    },
}

// =============================================================================
// Handle
// =============================================================================

/// Handle for triggering and controlling the sale sync engine.
#[derive(Clone)]
pub struct SyncEngineHandle {
    command_tx: mpsc::Sender<EngineCommand>,
    shutdown_tx: mpsc::Sender<()>,
}

impl SyncEngineHandle {
    /// Fire-and-forget drain trigger.
    ///
    /// Never blocks and never touches the network: callers on the checkout
    /// path use this right after enqueue. If the channel is full a drain is
    /// already pending, which covers this trigger too.
    pub fn trigger(&self) {
        if let Err(mpsc::error::TrySendError::Closed(_)) =
            self.command_tx.try_send(EngineCommand::Drain { reply: None })
        {
            warn!("Sync engine worker is gone; trigger dropped");
        }
    }

    /// Runs a drain and waits for its report.
    pub async fn sync_now(&self) -> SyncResult<DrainReport> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::Drain { reply: Some(tx) })
            .await
            .map_err(|_| SyncError::ChannelClosed("Engine command channel closed".into()))?;

        rx.await
            .map_err(|_| SyncError::ChannelClosed("Engine dropped drain reply".into()))?
    }

    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

// =============================================================================
// Sale Sync Engine
// =============================================================================

/// The queue drain worker. Spawn [`SaleSyncEngine::run`] as a tokio task.
pub struct SaleSyncEngine {
    db: Arc<Database>,
    client: Arc<dyn ApiClient>,
    config: Arc<SyncConfig>,
    command_rx: mpsc::Receiver<EngineCommand>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl SaleSyncEngine {
    /// Creates the engine and its handle.
    pub fn new(
        db: Arc<Database>,
        client: Arc<dyn ApiClient>,
        config: Arc<SyncConfig>,
    ) -> (Self, SyncEngineHandle) {
        // Small buffer on purpose: queued triggers coalesce, each drain
        // covers every pending item anyway.
        let (command_tx, command_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let engine = SaleSyncEngine {
            db,
            client,
            config,
            command_rx,
            shutdown_rx,
        };

        let handle = SyncEngineHandle {
            command_tx,
            shutdown_tx,
        };

        (engine, handle)
    }

    /// Runs the drain loop until shutdown.
    pub async fn run(mut self) {
        info!("Sale sync engine starting");

        let period = Duration::from_secs(self.config.queue.poll_interval_secs);
        // First tick after one full period; enqueue triggers cover startup.
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.drain().await {
                        error!(?e, "Periodic drain failed");
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        EngineCommand::Drain { reply } => {
                            let result = self.drain().await;
                            if let Err(ref e) = result {
                                error!(?e, "Triggered drain failed");
                            }
                            if let Some(tx) = reply {
                                let _ = tx.send(result);
                            }
                        }
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Sale sync engine shutting down");
                    break;
                }
            }
        }

        info!("Sale sync engine stopped");
    }

    /// One drain cycle over the pending queue.
    async fn drain(&self) -> SyncResult<DrainReport> {
        let queue = self.db.sale_queue();
        let pending = queue.list_pending(self.config.queue.drain_batch_size).await?;

        if pending.is_empty() {
            debug!("No pending sales");
            return Ok(DrainReport::default());
        }

        info!(count = pending.len(), "Draining sale queue");

        let mut report = DrainReport::default();

        for item in pending {
            // CAS claim; losing it means another path already moved the
            // item, so it is simply skipped this cycle.
            if let Err(e) = queue.mark_syncing(&item.id).await {
                debug!(id = %item.id, ?e, "Skipping item not in a drainable state");
                continue;
            }

            report.attempted += 1;

            match self.client.submit_sale(&item.id, &item.payload).await {
                Ok(()) => {
                    queue.mark_synced(&item.id).await?;
                    report.synced += 1;
                    debug!(id = %item.id, "Sale synced");
                }

                Err(e) if e.is_rejection() => {
                    queue.mark_rejected(&item.id, &e.to_string()).await?;
                    report.rejected += 1;
                    warn!(id = %item.id, error = %e, "Sale rejected by remote");
                }

                Err(e) => {
                    // Transport failure: record it and keep going, a single
                    // unreachable moment must not block the rest.
                    queue.mark_failed(&item.id, &e.to_string()).await?;
                    report.failed += 1;
                    warn!(id = %item.id, error = %e, "Sale submission failed");
                }
            }
        }

        info!(
            attempted = report.attempted,
            synced = report.synced,
            failed = report.failed,
            rejected = report.rejected,
            "Drain complete"
        );

        Ok(report)
    }
}

// =============================================================================
// Tests
// =============================================================================

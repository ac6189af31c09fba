//! # Pricing Sync Manager
//!
//! Keeps the local pricing snapshot current without re-downloading the full
//! data set on every sync.
//!
//! ## Cursor Protocol
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Pricing Sync Decision                               │
//! │                                                                         │
//! │  sync_once()                                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  load snapshot (incl. cursor) from atlas-db                             │
//! │       │                                                                 │
//! │       ├── cursor ABSENT ──► GET full snapshot                           │
//! │       │                     replace local state wholesale               │
//! │       │                                                                 │
//! │       └── cursor PRESENT ─► GET delta since cursor                      │
//! │                             merge: tombstones → upsert → allocations    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  response cursor == stored cursor?  → skip entirely (replay guard)      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  persist merged state + new cursor IN ONE TRANSACTION                   │
//! │                                                                         │
//! │  CONCURRENCY: one worker, one merge at a time. A trigger that arrives   │
//! │  mid-merge coalesces into the next loop iteration, never interleaves.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use atlas_core::MergeOutcome;
use atlas_db::Database;

use crate::client::ApiClient;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Report
// =============================================================================

/// Outcome of one pricing sync cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PricingReport {
    /// A full snapshot replaced local state.
    FullApplied { cursor: String },
    /// A delta was merged into local state.
    DeltaApplied { cursor: String },
    /// The response carried the cursor already stored; nothing changed.
    AlreadyCurrent { cursor: String },
}

impl PricingReport {
    /// The cursor local state is at after this cycle.
    pub fn cursor(&self) -> &str {
        match self {
            PricingReport::FullApplied { cursor }
            | PricingReport::DeltaApplied { cursor }
            | PricingReport::AlreadyCurrent { cursor } => cursor,
        }
    }
}

// =============================================================================
// Commands / Handle
// =============================================================================

enum PricingCommand {
    Sync {
        reply: Option<oneshot::Sender<SyncResult<PricingReport>>>,
    },
}

/// Handle for triggering and controlling the pricing sync manager.
#[derive(Clone)]
pub struct PricingSyncHandle {
    command_tx: mpsc::Sender<PricingCommand>,
    shutdown_tx: mpsc::Sender<()>,
}

impl PricingSyncHandle {
    /// Fire-and-forget sync trigger; coalesces if a sync is already queued.
    pub fn trigger(&self) {
        if let Err(mpsc::error::TrySendError::Closed(_)) =
            self.command_tx.try_send(PricingCommand::Sync { reply: None })
        {
            warn!("Pricing sync worker is gone; trigger dropped");
        }
    }

    /// Runs a sync cycle and waits for its report.
    pub async fn sync_now(&self) -> SyncResult<PricingReport> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(PricingCommand::Sync { reply: Some(tx) })
            .await
            .map_err(|_| SyncError::ChannelClosed("Pricing command channel closed".into()))?;

        rx.await
            .map_err(|_| SyncError::ChannelClosed("Pricing manager dropped reply".into()))?
    }

    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

// =============================================================================
// Pricing Sync Manager
// =============================================================================

/// The pricing reconciliation worker. Spawn [`PricingSyncManager::run`] as a
/// tokio task.
pub struct PricingSyncManager {
    db: Arc<Database>,
    client: Arc<dyn ApiClient>,
    config: Arc<SyncConfig>,
    command_rx: mpsc::Receiver<PricingCommand>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl PricingSyncManager {
    /// Creates the manager and its handle.
    pub fn new(
        db: Arc<Database>,
        client: Arc<dyn ApiClient>,
        config: Arc<SyncConfig>,
    ) -> (Self, PricingSyncHandle) {
        let (command_tx, command_rx) = mpsc::channel(4);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let manager = PricingSyncManager {
            db,
            client,
            config,
            command_rx,
            shutdown_rx,
        };

        let handle = PricingSyncHandle {
            command_tx,
            shutdown_tx,
        };

        (manager, handle)
    }

    /// Runs the sync loop until shutdown.
    pub async fn run(mut self) {
        info!("Pricing sync manager starting");

        let period = Duration::from_secs(self.config.pricing.poll_interval_secs);
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.sync_once().await {
                        error!(?e, "Periodic pricing sync failed");
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        PricingCommand::Sync { reply } => {
                            let result = self.sync_once().await;
                            if let Err(ref e) = result {
                                error!(?e, "Triggered pricing sync failed");
                            }
                            if let Some(tx) = reply {
                                let _ = tx.send(result);
                            }
                        }
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Pricing sync manager shutting down");
                    break;
                }
            }
        }

        info!("Pricing sync manager stopped");
    }

    /// One full sync cycle: decide full vs delta, fetch, merge, persist.
    async fn sync_once(&self) -> SyncResult<PricingReport> {
        let repo = self.db.pricing();
        let mut snapshot = repo.load().await?;

        let update = match snapshot.cursor.as_deref() {
            None => {
                info!("No pricing cursor stored, fetching full snapshot");
                self.client.fetch_pricing_full().await?
            }
            Some(cursor) => {
                debug!(cursor = %cursor, "Fetching pricing delta");
                self.client.fetch_pricing_delta(cursor).await?
            }
        };

        let is_delta = update.is_delta;
        let cursor = update.cursor.clone();

        // The merge itself is pure; the replay guard lives inside apply().
        match snapshot.apply(&update) {
            MergeOutcome::AlreadyCurrent => {
                debug!(cursor = %cursor, "Pricing already current, skipping merge");
                return Ok(PricingReport::AlreadyCurrent { cursor });
            }
            MergeOutcome::Applied => {}
        }

        // Data and cursor land in one transaction; a crash before this line
        // leaves the old cursor pointing at the old data, which just means
        // the same delta is fetched again.
        repo.replace(&snapshot).await?;

        info!(
            cursor = %cursor,
            delta = is_delta,
            lists = snapshot.lists.len(),
            items = snapshot.items.len(),
            "Pricing sync applied"
        );

        if is_delta {
            Ok(PricingReport::DeltaApplied { cursor })
        } else {
            Ok(PricingReport::FullApplied { cursor })
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

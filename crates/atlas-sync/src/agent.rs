//! # Sync Agent
//!
//! Orchestrator for the sync layer. Owns the sale sync engine and the
//! pricing sync manager, and is the surface the application calls.
//!
//! ## Agent Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         SyncAgent                                       │
//! │                                                                         │
//! │  submit_sale(payload)      ◄── checkout path: validate, persist,        │
//! │       │                        fire-and-forget trigger, return          │
//! │       ▼                                                                 │
//! │  ┌────────────────┐   trigger   ┌──────────────────────────────────┐    │
//! │  │  sale_queue    │ ──────────► │  SaleSyncEngine (worker task)    │    │
//! │  │  (atlas-db)    │             │  drains FIFO, one item at a time │    │
//! │  └────────────────┘             └──────────────────────────────────┘    │
//! │                                                                         │
//! │  pricing_sync_now() ──────────► ┌──────────────────────────────────┐    │
//! │  (also on a timer)              │  PricingSyncManager (worker)     │    │
//! │                                 │  full/delta fetch + atomic merge │    │
//! │                                 └──────────────────────────────────┘    │
//! │                                                                         │
//! │  The enqueue path NEVER suspends on network or printer I/O; it          │
//! │  persists locally and returns.                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use tracing::info;

use atlas_core::{QueuedSale, SalePayload};
use atlas_db::Database;

use crate::client::{ApiClient, HttpApiClient};
use crate::config::SyncConfig;
use crate::engine::{DrainReport, SaleSyncEngine, SyncEngineHandle};
use crate::error::{SyncError, SyncResult};
use crate::pricing::{PricingReport, PricingSyncHandle, PricingSyncManager};

// =============================================================================
// Sync Status
// =============================================================================

/// Snapshot of the sync layer for status displays.
#[derive(Debug, Clone)]
pub struct SyncStatus {
    /// Items a drain would pick up (queued + failed).
    pub pending_sales: i64,
    /// Items parked by a remote rejection, awaiting an operator.
    pub rejected_sales: usize,
    /// Cursor the local pricing snapshot is at, if any sync succeeded yet.
    pub pricing_cursor: Option<String>,
}

// =============================================================================
// Sync Agent
// =============================================================================

/// Owns the sync workers and exposes the application-facing operations.
///
/// Constructed at startup, `start()`ed once, `shutdown()` on exit. All
/// durable state lives in [`Database`]; the agent itself is disposable.
pub struct SyncAgent {
    config: Arc<SyncConfig>,
    db: Arc<Database>,
    client: Arc<dyn ApiClient>,
    engine: Option<SyncEngineHandle>,
    pricing: Option<PricingSyncHandle>,
}

impl SyncAgent {
    /// Creates an agent with the production HTTP client.
    pub fn new(config: SyncConfig, db: Arc<Database>) -> SyncResult<Self> {
        let client = Arc::new(HttpApiClient::new(&config.remote)?);
        Ok(Self::with_client(config, db, client))
    }

    /// Creates an agent with a custom client (used by tests).
    pub fn with_client(config: SyncConfig, db: Arc<Database>, client: Arc<dyn ApiClient>) -> Self {
        SyncAgent {
            config: Arc::new(config),
            db,
            client,
            engine: None,
            pricing: None,
        }
    }

    /// Spawns the worker tasks. Idempotent: a second call is a no-op.
    pub async fn start(&mut self) -> SyncResult<()> {
        if self.engine.is_some() {
            return Ok(());
        }

        self.config.validate()?;

        info!(device_id = %self.config.device_id(), "Starting sync agent");

        let (engine, engine_handle) =
            SaleSyncEngine::new(self.db.clone(), self.client.clone(), self.config.clone());
        tokio::spawn(engine.run());
        self.engine = Some(engine_handle);

        let (manager, pricing_handle) =
            PricingSyncManager::new(self.db.clone(), self.client.clone(), self.config.clone());
        tokio::spawn(manager.run());
        self.pricing = Some(pricing_handle);

        info!("Sync agent started");
        Ok(())
    }

    /// Captures a sale: the authoritative local commit point.
    ///
    /// Validates the payload shape, persists it, nudges the drain worker,
    /// and returns. Fails only on validation or local storage errors; when
    /// it fails the sale was NOT captured and the cashier must be told.
    pub async fn submit_sale(&self, payload: SalePayload) -> SyncResult<QueuedSale> {
        payload.validate()?;

        let sale = self.db.sale_queue().enqueue(&payload).await?;

        // Non-blocking: a full channel means a drain is already pending.
        if let Some(engine) = &self.engine {
            engine.trigger();
        }

        Ok(sale)
    }

    /// Fire-and-forget drain trigger (manual "sync now" button).
    pub fn trigger_sync(&self) {
        if let Some(engine) = &self.engine {
            engine.trigger();
        }
    }

    /// Runs a drain and waits for the report.
    pub async fn sync_now(&self) -> SyncResult<DrainReport> {
        match &self.engine {
            Some(engine) => engine.sync_now().await,
            None => Err(SyncError::ShuttingDown),
        }
    }

    /// Runs a pricing sync cycle and waits for the report.
    pub async fn pricing_sync_now(&self) -> SyncResult<PricingReport> {
        match &self.pricing {
            Some(pricing) => pricing.sync_now().await,
            None => Err(SyncError::ShuttingDown),
        }
    }

    /// Returns a rejected sale to the drainable queue and nudges a drain.
    pub async fn requeue_rejected(&self, id: &str) -> SyncResult<()> {
        self.db.sale_queue().requeue_rejected(id).await?;
        self.trigger_sync();
        Ok(())
    }

    /// Current pending/rejected counts and pricing cursor.
    pub async fn status(&self) -> SyncResult<SyncStatus> {
        let pending_sales = self.db.sale_queue().count_pending().await?;
        let rejected_sales = self.db.sale_queue().list_rejected(100).await?.len();
        let pricing_cursor = self.db.pricing().cursor().await?;

        Ok(SyncStatus {
            pending_sales,
            rejected_sales,
            pricing_cursor,
        })
    }

    /// Stops the worker tasks gracefully.
    pub async fn shutdown(&mut self) {
        info!("Shutting down sync agent");

        if let Some(engine) = self.engine.take() {
            engine.shutdown().await;
        }
        if let Some(pricing) = self.pricing.take() {
            pricing.shutdown().await;
        }

        info!("Sync agent stopped");
    }
}

// =============================================================================
// Tests
// =============================================================================

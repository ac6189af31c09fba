//! # atlas-sync: Sync Layer for Atlas POS
//!
//! Reconciles local terminal state with the remote system of record, built
//! for offline-first operation: the terminal keeps selling with no network,
//! and this crate makes the data eventually consistent.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Layer Architecture                          │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐   │
//! │  │                    SyncAgent (Orchestrator)                      │   │
//! │  │                                                                  │   │
//! │  │  Application-facing surface: submit_sale, sync_now,              │   │
//! │  │  pricing_sync_now, requeue_rejected, status                      │   │
//! │  └────────────────────────────┬─────────────────────────────────────┘   │
//! │                               │                                         │
//! │         ┌─────────────────────┴─────────────────────┐                   │
//! │         ▼                                           ▼                   │
//! │  ┌────────────────────┐                 ┌────────────────────────┐      │
//! │  │  SaleSyncEngine    │                 │  PricingSyncManager    │      │
//! │  │                    │                 │                        │      │
//! │  │  Drains the sale   │                 │  Cursor-based full or  │      │
//! │  │  queue FIFO, one   │                 │  delta fetch, atomic   │      │
//! │  │  worker, single-   │                 │  merge + persist, one  │      │
//! │  │  flight            │                 │  worker, single-flight │      │
//! │  └─────────┬──────────┘                 └───────────┬────────────┘      │
//! │            │                                        │                   │
//! │            └──────────────┬─────────────────────────┘                   │
//! │                           ▼                                             │
//! │                  ApiClient (trait)                                      │
//! │                  HttpApiClient: reqwest, bounded timeouts               │
//! │                                                                         │
//! │  Durable state (queue rows, snapshot, cursor) lives in atlas-db;        │
//! │  these workers are the only writers to their respective tables.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`agent`] - `SyncAgent` orchestrator
//! - [`client`] - `ApiClient` trait and the HTTP implementation
//! - [`config`] - sync configuration (device id, remote URL, intervals)
//! - [`engine`] - the sale queue drain worker
//! - [`error`] - sync error types with retryability classification
//! - [`pricing`] - the pricing snapshot sync worker
//!
//! ## Usage
//! ```rust,ignore
//! use atlas_db::{Database, DbConfig};
//! use atlas_sync::{SyncAgent, SyncConfig};
//!
//! let db = Arc::new(Database::new(DbConfig::new("atlas.db")).await?);
//! let config = SyncConfig::load_or_default(None);
//!
//! let mut agent = SyncAgent::new(config, db)?;
//! agent.start().await?;
//!
//! // Checkout path: local commit, instant return.
//! let queued = agent.submit_sale(payload).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod pricing;

// =============================================================================
// Re-exports
// =============================================================================

pub use agent::{SyncAgent, SyncStatus};
pub use client::{ApiClient, HttpApiClient};
pub use config::{DeviceConfig, PricingSettings, QueueSettings, RemoteConfig, SyncConfig};
pub use engine::{DrainReport, SaleSyncEngine, SyncEngineHandle};
pub use error::{SyncError, SyncResult};
pub use pricing::{PricingReport, PricingSyncHandle, PricingSyncManager};

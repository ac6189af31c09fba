//! # atlas-db: Durable Store for Atlas POS
//!
//! SQLite persistence for the resilience layer. Everything the terminal
//! must not lose across a crash lives behind this crate:
//!
//! - the offline sale queue (`sale_queue`)
//! - the pricing snapshot and its sync cursor (`price_*`, `sync_state`)
//! - parked print jobs (`print_queue`)
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Atlas POS Data Flow                              │
//! │                                                                         │
//! │  atlas-sync / atlas-print workers                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                     atlas-db (THIS CRATE)                       │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │    │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │    │
//! │  │   │   (pool.rs)   │◄───│  queue.rs      │    │  (embedded)  │  │    │
//! │  │   │   SqlitePool  │    │  pricing.rs    │    │  001_init    │  │    │
//! │  │   │   WAL mode    │    │  print.rs      │    │              │  │    │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (or :memory: in tests)                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each repository is owned exclusively by one manager; nothing else
//! mutates its tables.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::pricing::PricingRepository;
pub use repository::print::PrintQueueRepository;
pub use repository::queue::SaleQueueRepository;

//! # atlas-core: Domain Logic for Atlas POS
//!
//! Pure domain types and rules for the terminal's resilience layer.
//! This crate holds the pieces that carry real invariants:
//!
//! - [`sale`] - the offline sale queue item and its status machine
//! - [`pricing`] - the pricing snapshot and the cursor-guarded merge
//! - [`print`] - print jobs, retry bounds, and printer role assignments
//! - [`error`] - domain and validation error types
//!
//! ## Design Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          atlas-core                                     │
//! │                                                                         │
//! │   ALLOWED                              FORBIDDEN                        │
//! │   ─────────────────────────────        ─────────────────────────────    │
//! │   • Type definitions                   • Database queries               │
//! │   • State machine guards               • Network requests               │
//! │   • Snapshot merge logic               • File system access             │
//! │   • Payload validation                 • Any async I/O                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The merge routine in [`pricing`] is the canonical example of why: it is
//! the one place where reference data can be lost, so it lives where it can
//! be tested exhaustively without a database or a server.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod pricing;
pub mod print;
pub mod sale;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use pricing::{
    CustomerAllocations, ListScope, MergeOutcome, PriceItem, PriceList, PricingSnapshot,
    PricingUpdate,
};
pub use print::{
    AutoPrintConfig, PrintFormat, PrintJob, PrintJobStatus, PrintJobType, PrinterAssignments,
    PrinterDevice, ReceiptLine, ReceiptOrder,
};
pub use sale::{CartLine, PaymentMethod, PaymentStatus, QueuedSale, SalePayload, SaleStatus};

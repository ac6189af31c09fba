//! # Error Types
//!
//! Domain-specific error types for atlas-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  atlas-core errors (this file)                                          │
//! │  ├── CoreError        - State machine and domain rule violations        │
//! │  └── ValidationError  - Payload shape validation failures               │
//! │                                                                         │
//! │  atlas-db errors (separate crate)                                       │
//! │  └── DbError          - Local storage failures                          │
//! │                                                                         │
//! │  atlas-sync / atlas-print errors (separate crates)                      │
//! │  ├── SyncError        - Remote submission / pricing fetch failures      │
//! │  └── PrintError       - Device dispatch failures                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Domain rule violations.
///
/// These errors represent state machine or invariant violations. They are
/// programming or data errors, not transient conditions, and are never
/// retried.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A status transition that the queue item state machine does not allow.
    ///
    /// Legal transitions: Queued→Syncing→{Synced, Failed, Rejected} and
    /// Failed→Syncing. Synced is terminal; Rejected leaves only via an
    /// explicit requeue.
    #[error("Illegal status transition for {id}: {from} -> {to}")]
    IllegalTransition {
        id: String,
        from: String,
        to: String,
    },

    /// Print job retry requested past the configured bound.
    #[error("Print job {job_id} has exhausted its retries ({max_retries})")]
    RetriesExhausted { job_id: String, max_retries: u32 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Payload shape validation errors.
///
/// Checked on enqueue, before anything is persisted. These cover structural
/// problems only; business-rule validation (tax and discount math) belongs
/// to the remote system of record.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// A collection that must not be empty is empty.
    #[error("{field} must contain at least one entry")]
    Empty { field: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

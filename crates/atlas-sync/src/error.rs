//! # Sync Error Types
//!
//! Error types for sync operations, categorized for retry policy.
//!
//! ## Error Taxonomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌──────────────────┐  ┌───────────────────────┐   │
//! │  │  Configuration  │  │    Transport     │  │      Rejection        │   │
//! │  │                 │  │   (retryable)    │  │   (terminal)          │   │
//! │  │  InvalidConfig  │  │  Network         │  │  Rejected             │   │
//! │  │  ConfigLoad/Save│  │  Timeout         │  │  (4xx business rule)  │   │
//! │  └─────────────────┘  └──────────────────┘  └───────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌──────────────────┐                              │
//! │  │    Storage      │  │    Internal      │                              │
//! │  │                 │  │                  │                              │
//! │  │  Database       │  │  ChannelClosed   │                              │
//! │  │  Serialization  │  │  ShuttingDown    │                              │
//! │  └─────────────────┘  └──────────────────┘                              │
//! │                                                                         │
//! │  is_retryable() drives the queue transition:                            │
//! │    retryable  → item marked FAILED, picked up by a future drain         │
//! │    rejection  → item marked REJECTED, needs an explicit requeue         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering submission and pricing fetch failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Transport Errors (retryable)
    // =========================================================================
    /// Connection failed or the server answered with a 5xx.
    #[error("Network error: {0}")]
    Network(String),

    /// The bounded per-call timeout elapsed. Treated exactly like a network
    /// failure: the call may or may not have reached the server, which is
    /// why the item id doubles as an idempotency token.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    // =========================================================================
    // Remote Rejection (terminal)
    // =========================================================================
    /// The remote accepted the connection and rejected the request on
    /// business grounds. Retrying with the same payload can never succeed.
    #[error("Rejected by remote (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The remote answered 2xx with a body this client cannot decode.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// Local storage failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Payload serialization failed.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Payload validation failed before enqueue.
    #[error("Validation failed: {0}")]
    Validation(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Worker channel closed.
    #[error("Channel error: {0}")]
    ChannelClosed(String),

    /// The worker is shutting down.
    #[error("Sync worker is shutting down")]
    ShuttingDown,
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<atlas_db::DbError> for SyncError {
    fn from(err: atlas_db::DbError) -> Self {
        SyncError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

impl From<atlas_core::ValidationError> for SyncError {
    fn from(err: atlas_core::ValidationError) -> Self {
        SyncError::Validation(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // The concrete bound lives in RemoteConfig; reqwest does not
            // expose it back, so report the category.
            return SyncError::Timeout(0);
        }
        if err.is_decode() {
            return SyncError::UnexpectedResponse(err.to_string());
        }
        SyncError::Network(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Returns true if a future drain may retry the operation.
    ///
    /// Transport-level failures are retryable; a business-rule rejection is
    /// not, and neither are local storage or configuration problems.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Network(_) | SyncError::Timeout(_))
    }

    /// Returns true if the remote definitively refused the request.
    pub fn is_rejection(&self) -> bool {
        matches!(self, SyncError::Rejected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::Network("connection refused".into()).is_retryable());
        assert!(SyncError::Timeout(30).is_retryable());

        assert!(!SyncError::Rejected {
            status: 400,
            message: "unknown variant".into()
        }
        .is_retryable());
        assert!(!SyncError::InvalidConfig("bad".into()).is_retryable());
        assert!(!SyncError::Database("disk full".into()).is_retryable());
    }

    #[test]
    fn test_rejection_category() {
        assert!(SyncError::Rejected {
            status: 422,
            message: "bad sale".into()
        }
        .is_rejection());
        assert!(!SyncError::Network("down".into()).is_rejection());
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::Rejected {
            status: 400,
            message: "unknown product".into(),
        };
        assert_eq!(
            err.to_string(),
            "Rejected by remote (HTTP 400): unknown product"
        );
    }
}

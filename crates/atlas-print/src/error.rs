//! # Print Error Types
//!
//! Error types for print job management.
//!
//! Device failures are category (d) in the resilience layer's taxonomy:
//! retryable up to `max_retries`, then requiring an explicit operator
//! decision. Configuration problems (no printer assigned) fail fast and are
//! never retried automatically.

use thiserror::Error;

use atlas_core::PrintJobType;

/// Result type alias for print operations.
pub type PrintResult<T> = Result<T, PrintError>;

/// Print job manager errors.
#[derive(Debug, Error)]
pub enum PrintError {
    /// No device assigned to the requested role: a configuration error,
    /// surfaced before any job is created.
    #[error("No printer assigned for {job_type} documents. Configure one in settings.")]
    NoPrinterAssigned { job_type: PrintJobType },

    /// The device capability reported a failure.
    #[error("Printer '{device}' failed: {message}")]
    TransportFailed { device: String, message: String },

    /// The device did not answer within the dispatch bound.
    #[error("Printer '{device}' timed out after {seconds} seconds")]
    Timeout { device: String, seconds: u64 },

    /// Automatic retry requested past the bound; only an operator
    /// escalation can move the job now.
    #[error("Print job {job_id} has exhausted its retries ({max_retries})")]
    RetriesExhausted { job_id: String, max_retries: u32 },

    /// Escalation requested for a job that has retries left or is not in a
    /// failed state.
    #[error("Print job {0} is not awaiting an escalation decision")]
    NotEscalatable(String),

    /// Unknown job id.
    #[error("Print job not found: {0}")]
    JobNotFound(String),

    /// Requested copies outside the allowed range.
    #[error("Requested {requested} copies, allowed range is 1..={max}")]
    InvalidCopies { requested: u32, max: u32 },

    /// The artifact could not be produced (e.g. a PDF job with no rendered
    /// document to point at).
    #[error("Cannot render printable artifact: {0}")]
    Render(String),

    /// Local storage failed (parked queue).
    #[error("Database error: {0}")]
    Database(String),

    /// Worker channel closed.
    #[error("Channel error: {0}")]
    ChannelClosed(String),
}

impl From<atlas_db::DbError> for PrintError {
    fn from(err: atlas_db::DbError) -> Self {
        PrintError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for PrintError {
    fn from(err: serde_json::Error) -> Self {
        PrintError::Render(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_printer_message_names_role() {
        let err = PrintError::NoPrinterAssigned {
            job_type: PrintJobType::Kitchen,
        };
        assert!(err.to_string().contains("kitchen"));
    }

    #[test]
    fn test_retries_exhausted_message() {
        let err = PrintError::RetriesExhausted {
            job_id: "job-1".to_string(),
            max_retries: 2,
        };
        assert_eq!(
            err.to_string(),
            "Print job job-1 has exhausted its retries (2)"
        );
    }
}

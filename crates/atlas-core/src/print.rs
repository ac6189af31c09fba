//! # Print Job Types
//!
//! Print jobs, their retry bounds, and the operator-maintained mapping from
//! document role to physical device.
//!
//! ## Job State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       PrintJob Status Machine                           │
//! │                                                                         │
//! │   ┌─────────┐       ┌──────────┐  all copies ok  ┌─────────┐            │
//! │   │ PENDING │ ────► │ PRINTING │ ──────────────► │ SUCCESS │            │
//! │   └─────────┘       └──────────┘                 └─────────┘            │
//! │                        ▲     │                                          │
//! │       retry_count <    │     │ any copy fails                           │
//! │       max_retries      │     ▼                                          │
//! │                     ┌──────────┐                                        │
//! │                     │  FAILED  │                                        │
//! │                     └──────────┘                                        │
//! │                          │ retry_count == max_retries:                  │
//! │                          │ operator chooses                             │
//! │            ┌─────────────┼─────────────┐                                │
//! │            ▼             ▼             ▼                                │
//! │       retry now     ┌────────┐   ┌───────────┐                          │
//! │    (fresh budget)   │ QUEUED │   │ ABANDONED │                          │
//! │                     └────────┘   └───────────┘                          │
//! │                     (persisted     (history                             │
//! │                      retry queue)   only)                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Formats and Roles
// =============================================================================

/// Physical shape of the printable artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PrintFormat {
    /// Page-based document, dispatched as a file path.
    Pdf,
    /// Raw markup for a thermal printer.
    Thermal,
}

/// Document role; each role resolves to an operator-assigned device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PrintJobType {
    Receipt,
    Invoice,
    Kitchen,
}

impl PrintJobType {
    pub fn as_str(self) -> &'static str {
        match self {
            PrintJobType::Receipt => "receipt",
            PrintJobType::Invoice => "invoice",
            PrintJobType::Kitchen => "kitchen",
        }
    }
}

impl std::fmt::Display for PrintJobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Job Status
// =============================================================================

/// Status of a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PrintJobStatus {
    Pending,
    Printing,
    Success,
    Failed,
    /// Parked in the persisted retry queue by an operator decision.
    Queued,
    /// Skipped by an operator decision; kept in history for audit.
    Abandoned,
}

impl PrintJobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PrintJobStatus::Pending => "pending",
            PrintJobStatus::Printing => "printing",
            PrintJobStatus::Success => "success",
            PrintJobStatus::Failed => "failed",
            PrintJobStatus::Queued => "queued",
            PrintJobStatus::Abandoned => "abandoned",
        }
    }
}

impl std::fmt::Display for PrintJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Print Job
// =============================================================================

/// A tracked print job.
///
/// Mutated only by the print job manager. `retry_count <= max_retries`
/// always holds; the count is incremented before a retry is dispatched so a
/// crash mid-retry cannot under-count attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: String,
    pub order_id: String,
    pub order_number: String,
    pub job_type: PrintJobType,
    pub format: PrintFormat,
    pub status: PrintJobStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PrintJob {
    /// Creates a fresh Pending job for an order.
    pub fn new(
        order_id: &str,
        order_number: &str,
        job_type: PrintJobType,
        format: PrintFormat,
        max_retries: u32,
    ) -> Self {
        let now = Utc::now();
        PrintJob {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            order_number: order_number.to_string(),
            job_type,
            format,
            status: PrintJobStatus::Pending,
            retry_count: 0,
            max_retries,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether an automatic retry is still allowed.
    pub fn can_retry(&self) -> bool {
        self.status == PrintJobStatus::Failed && self.retry_count < self.max_retries
    }

    /// Whether the job has hit the bound and needs an operator decision.
    pub fn needs_escalation(&self) -> bool {
        self.status == PrintJobStatus::Failed && self.retry_count >= self.max_retries
    }
}

// =============================================================================
// Printer Devices and Role Assignments
// =============================================================================

/// A physical printer known to the terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterDevice {
    pub id: String,
    pub name: String,
    pub driver: Option<String>,
}

/// Operator-maintained mapping from document role to device id.
///
/// Read-only from the print manager's point of view; only explicit operator
/// configuration mutates it, and only the assignment map is persisted (the
/// discovered device list is session state).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrinterAssignments {
    assignments: BTreeMap<PrintJobType, String>,
}

impl PrinterAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns a device to a role, replacing any previous assignment.
    pub fn assign(&mut self, job_type: PrintJobType, device_id: impl Into<String>) {
        self.assignments.insert(job_type, device_id.into());
    }

    /// Removes the assignment for a role.
    pub fn unassign(&mut self, job_type: PrintJobType) {
        self.assignments.remove(&job_type);
    }

    /// The device assigned to a role, if any.
    pub fn device_for(&self, job_type: PrintJobType) -> Option<&str> {
        self.assignments.get(&job_type).map(String::as_str)
    }
}

// =============================================================================
// Auto-print Configuration
// =============================================================================

/// Automated receipt printing behavior after a sale commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoPrintConfig {
    pub enabled: bool,
    pub format: PrintFormat,
    /// Copies per job, clamped to 1..=5.
    pub copies: u32,
    /// Also produce a kitchen ticket for the order.
    pub print_kitchen_ticket: bool,
    /// Retry automatically before asking the operator.
    pub auto_retry: bool,
    pub max_retries: u32,
}

impl AutoPrintConfig {
    pub const MAX_COPIES: u32 = 5;

    /// Copies bounded to the allowed range.
    pub fn effective_copies(&self) -> u32 {
        self.copies.clamp(1, Self::MAX_COPIES)
    }
}

impl Default for AutoPrintConfig {
    fn default() -> Self {
        AutoPrintConfig {
            enabled: false,
            format: PrintFormat::Thermal,
            copies: 1,
            print_kitchen_ticket: false,
            auto_retry: true,
            max_retries: 2,
        }
    }
}

// =============================================================================
// Receipt Order (print input)
// =============================================================================

/// One printable line of a committed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

/// A committed order, reduced to what a receipt needs.
///
/// `document_path` carries the pre-rendered page document for PDF jobs;
/// thermal jobs render markup from the lines instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptOrder {
    pub order_id: String,
    pub order_number: String,
    pub lines: Vec<ReceiptLine>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    pub document_path: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_pending() {
        let job = PrintJob::new("ord-1", "A-1001", PrintJobType::Receipt, PrintFormat::Thermal, 2);
        assert_eq!(job.status, PrintJobStatus::Pending);
        assert_eq!(job.retry_count, 0);
        assert!(!job.can_retry());
        assert!(!job.needs_escalation());
    }

    #[test]
    fn test_retry_bound() {
        let mut job =
            PrintJob::new("ord-1", "A-1001", PrintJobType::Receipt, PrintFormat::Thermal, 2);
        job.status = PrintJobStatus::Failed;

        assert!(job.can_retry());
        job.retry_count = 1;
        assert!(job.can_retry());
        job.retry_count = 2;
        assert!(!job.can_retry());
        assert!(job.needs_escalation());
    }

    #[test]
    fn test_success_never_escalates() {
        let mut job =
            PrintJob::new("ord-1", "A-1001", PrintJobType::Receipt, PrintFormat::Thermal, 2);
        job.status = PrintJobStatus::Success;
        job.retry_count = 2;
        assert!(!job.can_retry());
        assert!(!job.needs_escalation());
    }

    #[test]
    fn test_assignments() {
        let mut assignments = PrinterAssignments::new();
        assert!(assignments.device_for(PrintJobType::Receipt).is_none());

        assignments.assign(PrintJobType::Receipt, "EPSON-TM20");
        assignments.assign(PrintJobType::Kitchen, "STAR-SP700");
        assert_eq!(
            assignments.device_for(PrintJobType::Receipt),
            Some("EPSON-TM20")
        );

        assignments.assign(PrintJobType::Receipt, "EPSON-TM30");
        assert_eq!(
            assignments.device_for(PrintJobType::Receipt),
            Some("EPSON-TM30")
        );

        assignments.unassign(PrintJobType::Kitchen);
        assert!(assignments.device_for(PrintJobType::Kitchen).is_none());
    }

    #[test]
    fn test_copies_clamped() {
        let mut config = AutoPrintConfig::default();
        assert_eq!(config.effective_copies(), 1);

        config.copies = 0;
        assert_eq!(config.effective_copies(), 1);

        config.copies = 9;
        assert_eq!(config.effective_copies(), AutoPrintConfig::MAX_COPIES);
    }
}

//! # Offline Sale Queue Types
//!
//! The durable queue item for sales captured while the terminal may be
//! offline, and its status machine.
//!
//! ## Queue Item Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      QueuedSale Status Machine                          │
//! │                                                                         │
//! │   checkout confirmed                                                    │
//! │         │                                                               │
//! │         ▼                                                               │
//! │     ┌────────┐  drain   ┌─────────┐  2xx   ┌────────┐                   │
//! │     │ QUEUED │ ───────► │ SYNCING │ ─────► │ SYNCED │ (terminal)        │
//! │     └────────┘          └─────────┘        └────────┘                   │
//! │                           │      │                                      │
//! │            transport error│      │4xx rejection                         │
//! │                           ▼      ▼                                      │
//! │                     ┌────────┐ ┌──────────┐                             │
//! │          ┌───────── │ FAILED │ │ REJECTED │ (terminal, operator         │
//! │          │  next    └────────┘ └──────────┘  may requeue explicitly)    │
//! │          │  drain        ▲                                              │
//! │          └───────────────┘                                              │
//! │                                                                         │
//! │  INVARIANTS:                                                            │
//! │  • payload is immutable after enqueue                                   │
//! │  • the item id is the idempotency token for the remote call             │
//! │  • a FAILED item never blocks its siblings                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// =============================================================================
// Payment Enums
// =============================================================================

/// How the customer paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Credit,
    MobilePayment,
    BankTransfer,
    StoreCredit,
    GiftCard,
    OnAccount,
    Other,
}

/// Settlement state of the payment at capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
}

// =============================================================================
// Sale Payload
// =============================================================================

/// One line of the cart at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: String,
    pub variant_id: String,
    pub quantity: i64,
    pub selling_unit_id: String,
}

/// The sale submission body captured at checkout.
///
/// This is the unit of durability: once accepted by the queue it is never
/// merged, mutated, or reordered. Amounts are in cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalePayload {
    pub cart_lines: Vec<CartLine>,
    pub location_id: String,
    pub customer_id: Option<String>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub amount_received_cents: Option<i64>,
    pub change_cents: Option<i64>,
    #[serde(default)]
    pub discount_cents: i64,
    pub note: Option<String>,
}

impl SalePayload {
    /// Checks the payload shape before it is persisted.
    ///
    /// Only structural checks: a payload that fails here could never be
    /// submitted, so rejecting it at enqueue time is kinder than parking a
    /// permanently broken item in the queue. Tax/discount arithmetic is the
    /// remote system's problem.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.cart_lines.is_empty() {
            return Err(ValidationError::Empty {
                field: "cart_lines".to_string(),
            });
        }

        for line in &self.cart_lines {
            if line.product_id.is_empty() {
                return Err(ValidationError::Required {
                    field: "product_id".to_string(),
                });
            }
            if line.quantity <= 0 {
                return Err(ValidationError::MustBePositive {
                    field: "quantity".to_string(),
                });
            }
        }

        if self.location_id.is_empty() {
            return Err(ValidationError::Required {
                field: "location_id".to_string(),
            });
        }

        if self.discount_cents < 0 {
            return Err(ValidationError::MustBePositive {
                field: "discount_cents".to_string(),
            });
        }

        Ok(())
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// Status of a queued sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Accepted locally, waiting for a drain.
    Queued,
    /// A drain is submitting this item right now.
    Syncing,
    /// Confirmed by the remote system of record.
    Synced,
    /// Transport failure; will be picked up by a future drain.
    Failed,
    /// Remote business-rule rejection; excluded from automatic drains.
    Rejected,
}

impl SaleStatus {
    /// Whether a drain may pick this item up.
    pub fn is_pending(self) -> bool {
        matches!(self, SaleStatus::Queued | SaleStatus::Failed)
    }

    /// Whether the item has reached a state the engine never leaves on its
    /// own. Rejected can still be left via an explicit operator requeue.
    pub fn is_terminal(self) -> bool {
        matches!(self, SaleStatus::Synced | SaleStatus::Rejected)
    }

    /// Status machine guard; transitions not listed here are illegal.
    pub fn can_transition_to(self, next: SaleStatus) -> bool {
        use SaleStatus::*;
        matches!(
            (self, next),
            (Queued, Syncing)
                | (Failed, Syncing)
                | (Syncing, Synced)
                | (Syncing, Failed)
                | (Syncing, Rejected)
                | (Rejected, Queued)
        )
    }

    /// Lowercase storage name, matching the TEXT column representation.
    pub fn as_str(self) -> &'static str {
        match self {
            SaleStatus::Queued => "queued",
            SaleStatus::Syncing => "syncing",
            SaleStatus::Synced => "synced",
            SaleStatus::Failed => "failed",
            SaleStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Queued Sale
// =============================================================================

/// A sale captured in the durable queue.
///
/// Exactly one `QueuedSale` exists per cashier-initiated sale. The `id` is
/// generated at enqueue time and doubles as the idempotency token for the
/// remote submission, so a retried call after a partial network failure
/// cannot double-record on the server side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedSale {
    pub id: String,
    pub payload: SalePayload,
    pub status: SaleStatus,
    /// Number of submission attempts that ended in failure or rejection.
    pub retry_count: i64,
    /// Human-readable description of the last failure, if any.
    pub last_error: Option<String>,
    /// Enqueue time; drains process items in this order.
    pub queued_at: DateTime<Utc>,
    /// When a drain last picked this item up.
    pub attempted_at: Option<DateTime<Utc>>,
    /// When the remote confirmed the submission.
    pub synced_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> SalePayload {
        SalePayload {
            cart_lines: vec![CartLine {
                product_id: "prod-1".to_string(),
                variant_id: "var-1".to_string(),
                quantity: 2,
                selling_unit_id: "unit-1".to_string(),
            }],
            location_id: "loc-1".to_string(),
            customer_id: None,
            payment_method: PaymentMethod::Cash,
            payment_status: PaymentStatus::Completed,
            amount_received_cents: Some(1000),
            change_cents: Some(200),
            discount_cents: 0,
            note: None,
        }
    }

    #[test]
    fn test_valid_payload_passes() {
        assert!(payload().validate().is_ok());
    }

    #[test]
    fn test_empty_cart_rejected() {
        let mut p = payload();
        p.cart_lines.clear();
        assert!(matches!(
            p.validate(),
            Err(ValidationError::Empty { .. })
        ));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let mut p = payload();
        p.cart_lines[0].quantity = 0;
        assert!(matches!(
            p.validate(),
            Err(ValidationError::MustBePositive { .. })
        ));
    }

    #[test]
    fn test_missing_location_rejected() {
        let mut p = payload();
        p.location_id.clear();
        assert!(matches!(
            p.validate(),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_status_transitions() {
        use SaleStatus::*;

        assert!(Queued.can_transition_to(Syncing));
        assert!(Failed.can_transition_to(Syncing));
        assert!(Syncing.can_transition_to(Synced));
        assert!(Syncing.can_transition_to(Failed));
        assert!(Syncing.can_transition_to(Rejected));
        assert!(Rejected.can_transition_to(Queued));

        // Synced is final, and nothing skips the Syncing step.
        assert!(!Synced.can_transition_to(Syncing));
        assert!(!Synced.can_transition_to(Failed));
        assert!(!Queued.can_transition_to(Synced));
        assert!(!Failed.can_transition_to(Synced));
        assert!(!Rejected.can_transition_to(Syncing));
    }

    #[test]
    fn test_pending_statuses() {
        assert!(SaleStatus::Queued.is_pending());
        assert!(SaleStatus::Failed.is_pending());
        assert!(!SaleStatus::Syncing.is_pending());
        assert!(!SaleStatus::Synced.is_pending());
        assert!(!SaleStatus::Rejected.is_pending());
    }

    #[test]
    fn test_payload_roundtrip() {
        let p = payload();
        let json = serde_json::to_string(&p).unwrap();
        let back: SalePayload = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}

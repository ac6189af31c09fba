//! # Print Transport
//!
//! The seam to the physical printing capability.
//!
//! The platform print plugin accepts either a rendered document path (page
//! formats) or raw markup (thermal printers), addressed to a concrete
//! device. This crate does not re-specify the driver; it only depends on
//! success/failure per call, with no partial-copy semantics assumed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use atlas_core::PrinterDevice;

use crate::error::PrintResult;

// =============================================================================
// Print Payload
// =============================================================================

/// What gets handed to the device.
///
/// Serializable so a parked job can carry its artifact across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PrintPayload {
    /// Absolute path of a rendered page document (PDF).
    Document { path: String },
    /// Raw markup for a thermal printer.
    Markup { content: String },
}

// =============================================================================
// Transport Trait
// =============================================================================

/// The external printing capability.
///
/// One call prints one copy on one device; the manager sequences copies and
/// owns all retry policy. Implementations should bound their own driver
/// I/O, but the manager additionally enforces a dispatch timeout.
#[async_trait]
pub trait PrintTransport: Send + Sync {
    /// Prints one copy of `payload` on `device_id`.
    async fn print(&self, device_id: &str, payload: &PrintPayload) -> PrintResult<()>;

    /// Enumerates printers currently visible to the terminal.
    async fn list_devices(&self) -> PrintResult<Vec<PrinterDevice>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_roundtrip() {
        let markup = PrintPayload::Markup {
            content: "RECEIPT A-1001".to_string(),
        };
        let json = serde_json::to_string(&markup).unwrap();
        let back: PrintPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(markup, back);

        let doc = PrintPayload::Document {
            path: "/tmp/receipt.pdf".to_string(),
        };
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("\"kind\":\"document\""));
        let back: PrintPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(doc, back);
    }
}

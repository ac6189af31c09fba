//! # Receipt Rendering
//!
//! Turns a committed order into a printable artifact.
//!
//! Thermal jobs get fixed-width markup rendered here; page-based (PDF)
//! jobs are rendered upstream by the document layer, so for those this
//! module only resolves the pre-rendered file path. Kitchen tickets carry
//! quantities and item names but no prices.

use atlas_core::{PrintFormat, PrintJobType, ReceiptOrder};

use crate::error::{PrintError, PrintResult};
use crate::transport::PrintPayload;

/// Printable width of a 58mm thermal roll, in characters.
const THERMAL_WIDTH: usize = 32;

/// Produces the artifact for a job.
pub fn render(
    order: &ReceiptOrder,
    job_type: PrintJobType,
    format: PrintFormat,
) -> PrintResult<PrintPayload> {
    match format {
        PrintFormat::Pdf => {
            let path = order.document_path.clone().ok_or_else(|| {
                PrintError::Render(format!(
                    "order {} has no rendered document for a PDF job",
                    order.order_number
                ))
            })?;
            Ok(PrintPayload::Document { path })
        }
        PrintFormat::Thermal => Ok(PrintPayload::Markup {
            content: match job_type {
                PrintJobType::Kitchen => render_kitchen_ticket(order),
                _ => render_thermal_receipt(order),
            },
        }),
    }
}

/// Customer receipt: lines with prices, totals, payment method.
fn render_thermal_receipt(order: &ReceiptOrder) -> String {
    let mut out = String::new();

    out.push_str(&center(&format!("ORDER {}", order.order_number)));
    out.push_str(&center(&order.created_at.format("%Y-%m-%d %H:%M").to_string()));
    out.push_str(&rule());

    for line in &order.lines {
        out.push_str(&row(
            &format!("{} x{}", line.name, line.quantity),
            &money(line.line_total_cents),
        ));
    }

    out.push_str(&rule());
    out.push_str(&row("Subtotal", &money(order.subtotal_cents)));
    out.push_str(&row("Tax", &money(order.tax_cents)));
    out.push_str(&row("TOTAL", &money(order.total_cents)));
    out.push_str(&rule());
    out.push_str(&row("Paid by", &order.payment_method));
    out.push('\n');
    out.push_str(&center("Thank you!"));

    out
}

/// Kitchen ticket: big quantities, no money.
fn render_kitchen_ticket(order: &ReceiptOrder) -> String {
    let mut out = String::new();

    out.push_str(&center(&format!("KITCHEN {}", order.order_number)));
    out.push_str(&center(&order.created_at.format("%H:%M").to_string()));
    out.push_str(&rule());

    for line in &order.lines {
        out.push_str(&format!("{:>3} x {}\n", line.quantity, line.name));
    }

    out
}

fn money(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, (cents % 100).abs())
}

fn rule() -> String {
    format!("{}\n", "-".repeat(THERMAL_WIDTH))
}

fn center(text: &str) -> String {
    if text.len() >= THERMAL_WIDTH {
        return format!("{text}\n");
    }
    let pad = (THERMAL_WIDTH - text.len()) / 2;
    format!("{}{}\n", " ".repeat(pad), text)
}

/// Left/right aligned row; the label is truncated before it can collide
/// with the value.
fn row(label: &str, value: &str) -> String {
    let value_width = value.len().min(THERMAL_WIDTH);
    let label_width = THERMAL_WIDTH.saturating_sub(value_width + 1);
    let label: String = label.chars().take(label_width).collect();
    format!("{label:<label_width$} {value}\n")
}

// =============================================================================
// Tests
// =============================================================================

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment status of a booking. `Paid` is terminal: once reached, every
/// further gateway report for the booking is absorbed as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

/// One line of a booking. `subtotal` snapshots unit price × quantity at
/// booking time; later price changes do not touch it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub ticket_type_id: Uuid,
    pub quantity: u32,
    pub subtotal: Decimal,
}

/// One checkout attempt. `reference` is a v4 UUID and doubles as the
/// payment-gateway transaction id; it is never derived from anything
/// sequential. Line items are owned by the booking and dropped with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub reference: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    pub created_at: DateTime<Utc>,
    pub status: PaymentStatus,
    pub gateway_confirmation_id: Option<String>,
    pub line_items: Vec<LineItem>,
}

impl Booking {
    pub fn is_paid(&self) -> bool {
        self.status == PaymentStatus::Paid
    }

    /// Total payable amount, computed from persisted subtotals only.
    pub fn total_amount(&self) -> Decimal {
        self.line_items.iter().map(|item| item.subtotal).sum()
    }
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A purchasable ticket tier, e.g. Silver, Gold, Platinum.
///
/// `available_quantity` is only ever decremented by a first-time payment
/// confirmation and never goes below zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketType {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub available_quantity: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

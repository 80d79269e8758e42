//! Booking Ledger: the authoritative record of ticket tiers and bookings.
//!
//! All state lives behind one `RwLock`. `confirm_payment` does its status
//! check, the PAID transition, and the inventory decrements inside a single
//! write-lock critical section, so concurrent confirmations for the same
//! reference serialize and exactly one of them wins.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::inventory;
use crate::models::{Booking, LineItem, PaymentStatus, TicketType};
use crate::utils::error::{AppError, QuantityIssue};

/// A confirmed payment found fewer units than the booking asked for; the
/// quantity was clamped to zero. Surfaced for operator attention, never a
/// hard failure.
#[derive(Debug, Clone)]
pub struct InventoryShortfall {
    pub ticket_type_name: String,
    pub requested: u32,
    pub available: u32,
}

/// Result of an attempted payment confirmation.
#[derive(Debug, Clone)]
pub enum ConfirmOutcome {
    /// This caller won: the booking just transitioned to paid and inventory
    /// was decremented for each line item.
    Confirmed {
        booking: Booking,
        shortfalls: Vec<InventoryShortfall>,
    },
    /// The booking was already paid; nothing changed.
    AlreadyPaid,
    /// No booking with that reference exists.
    NotFound,
}

#[derive(Default)]
struct LedgerState {
    ticket_types: HashMap<Uuid, TicketType>,
    bookings: HashMap<Uuid, Booking>,
}

pub struct BookingLedger {
    state: RwLock<LedgerState>,
}

impl BookingLedger {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
        }
    }

    pub async fn add_ticket_type(
        &self,
        name: impl Into<String>,
        price: Decimal,
        available_quantity: u32,
        is_active: bool,
    ) -> TicketType {
        debug_assert!(price >= Decimal::ZERO, "unit price must be non-negative");
        let ticket_type = TicketType {
            id: Uuid::new_v4(),
            name: name.into(),
            price,
            available_quantity,
            is_active,
            created_at: Utc::now(),
        };
        self.state
            .write()
            .await
            .ticket_types
            .insert(ticket_type.id, ticket_type.clone());
        ticket_type
    }

    /// Active tiers that still have units left, sorted by name.
    pub async fn list_active_ticket_types(&self) -> Vec<TicketType> {
        let state = self.state.read().await;
        let mut types: Vec<TicketType> = state
            .ticket_types
            .values()
            .filter(|t| t.is_active && t.available_quantity > 0)
            .cloned()
            .collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        types
    }

    pub async fn ticket_type(&self, id: Uuid) -> Option<TicketType> {
        self.state.read().await.ticket_types.get(&id).cloned()
    }

    /// Creates a pending booking after validating every requested item.
    ///
    /// Quantities are checked against availability as a read at this instant,
    /// not a hold: nothing is reserved until a payment is confirmed, and the
    /// clamp in [`confirm_payment`](Self::confirm_payment) absorbs any
    /// oversubscription that slips through the gap.
    ///
    /// # Errors
    ///
    /// `NotFound` if any referenced tier does not exist or is inactive;
    /// `Validation` listing every item whose quantity is zero or exceeds the
    /// tier's availability, or when the request carries no items at all.
    pub async fn create_booking(
        &self,
        customer_name: &str,
        customer_email: &str,
        items: &[(Uuid, u32)],
    ) -> Result<Booking, AppError> {
        if items.is_empty() {
            return Err(AppError::Validation(Vec::new()));
        }

        let mut state = self.state.write().await;

        let mut issues = Vec::new();
        let mut line_items = Vec::with_capacity(items.len());
        for (ticket_type_id, quantity) in items {
            let ticket_type = state
                .ticket_types
                .get(ticket_type_id)
                .filter(|t| t.is_active)
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "Ticket type {ticket_type_id} does not exist or is inactive"
                    ))
                })?;
            if *quantity == 0 || *quantity > ticket_type.available_quantity {
                issues.push(QuantityIssue {
                    ticket_type_name: ticket_type.name.clone(),
                    requested: *quantity,
                    max_available: ticket_type.available_quantity,
                });
                continue;
            }
            line_items.push(LineItem {
                ticket_type_id: *ticket_type_id,
                quantity: *quantity,
                // price snapshot: later price changes do not move this booking
                subtotal: ticket_type.price * Decimal::from(*quantity),
            });
        }
        if !issues.is_empty() {
            return Err(AppError::Validation(issues));
        }

        let booking = Booking {
            reference: Uuid::new_v4(),
            customer_name: customer_name.to_string(),
            customer_email: customer_email.to_string(),
            created_at: Utc::now(),
            status: PaymentStatus::Pending,
            gateway_confirmation_id: None,
            line_items,
        };
        state.bookings.insert(booking.reference, booking.clone());
        info!(reference = %booking.reference, customer = %booking.customer_name, "Booking created");
        Ok(booking)
    }

    pub async fn booking(&self, reference: Uuid) -> Option<Booking> {
        self.state.read().await.bookings.get(&reference).cloned()
    }

    /// Removes a booking. Its line items are owned by the booking value and
    /// go with it; there is nothing else to cascade.
    pub async fn delete_booking(&self, reference: Uuid) -> bool {
        self.state.write().await.bookings.remove(&reference).is_some()
    }

    /// The atomic unit of reconciliation: observe PENDING, transition to
    /// PAID, record the gateway confirmation id, and decrement inventory per
    /// line item, all under one write lock. Every other concurrent caller
    /// for the same reference observes PAID and gets `AlreadyPaid`.
    pub async fn confirm_payment(
        &self,
        reference: Uuid,
        gateway_confirmation_id: Option<&str>,
    ) -> ConfirmOutcome {
        let mut state = self.state.write().await;

        let booking = match state.bookings.get_mut(&reference) {
            None => return ConfirmOutcome::NotFound,
            Some(b) if b.is_paid() => return ConfirmOutcome::AlreadyPaid,
            Some(b) => {
                b.status = PaymentStatus::Paid;
                b.gateway_confirmation_id = gateway_confirmation_id.map(str::to_string);
                b.clone()
            }
        };

        let mut shortfalls = Vec::new();
        for item in &booking.line_items {
            if let Some(ticket_type) = state.ticket_types.get_mut(&item.ticket_type_id) {
                let adjustment =
                    inventory::apply_decrement(ticket_type.available_quantity, item.quantity);
                if !adjustment.sufficient {
                    warn!(
                        ticket_type = %ticket_type.name,
                        reference = %reference,
                        requested = item.quantity,
                        available = ticket_type.available_quantity,
                        "Insufficient quantity at confirmation, clamping to zero"
                    );
                    shortfalls.push(InventoryShortfall {
                        ticket_type_name: ticket_type.name.clone(),
                        requested: item.quantity,
                        available: ticket_type.available_quantity,
                    });
                }
                ticket_type.available_quantity = adjustment.new_quantity;
            }
        }

        info!(reference = %reference, "Booking marked paid");
        ConfirmOutcome::Confirmed { booking, shortfalls }
    }
}

impl Default for BookingLedger {
    fn default() -> Self {
        Self::new()
    }
}

//! Ticket-booking backend core: a booking ledger, an idempotent payment
//! reconciler fed by the gateway's three callback channels, and the
//! clamp-at-zero inventory rule.

pub mod config;
pub mod gateway;
pub mod inventory;
pub mod ledger;
pub mod models;
pub mod reconciler;
pub mod service;
pub mod utils;

pub use config::Config;
pub use ledger::BookingLedger;
pub use service::BookingService;
pub use utils::error::AppError;

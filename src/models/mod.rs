pub mod booking;
pub mod ticket;

pub use booking::{Booking, LineItem, PaymentStatus};
pub use ticket::TicketType;

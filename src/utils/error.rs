use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

/// One offending line of a booking request: the tier by name, what was asked
/// for, and the most that was actually available at validation time.
#[derive(Debug, Clone, Serialize)]
pub struct QuantityIssue {
    pub ticket_type_name: String,
    pub requested: u32,
    pub max_available: u32,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {}", summarize(.0))]
    Validation(Vec<QuantityIssue>),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The payment-session initiator failed. Retryable: the booking named
    /// here is persisted and still pending.
    #[error("Payment gateway error: {message}")]
    Upstream { reference: Uuid, message: String },
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Upstream { .. } => "UPSTREAM_ERROR",
        }
    }

    pub fn log(&self) {
        match self {
            AppError::Validation(issues) => {
                warn!(code = self.code(), issues = ?issues, "Booking request rejected");
            }
            AppError::NotFound(msg) => {
                warn!(code = self.code(), message = %msg, "Resource not found");
            }
            AppError::Upstream { reference, message } => {
                error!(code = self.code(), reference = %reference, message = %message, "Payment gateway failure");
            }
        }
    }
}

fn summarize(issues: &[QuantityIssue]) -> String {
    if issues.is_empty() {
        return "booking contains no items".to_string();
    }
    issues
        .iter()
        .map(|issue| {
            format!(
                "{}: requested {}, max available {}",
                issue.ticket_type_name, issue.requested, issue.max_available
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

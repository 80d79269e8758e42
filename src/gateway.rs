//! External collaborators: the payment-session initiator and the receipt
//! dispatcher. Both are traits so the service can be wired to a real gateway
//! integration in production and to the mocks below in development and tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::Booking;

#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("failed to reach payment gateway: {0}")]
    Connection(String),

    #[error("gateway declined to open a session: {0}")]
    Declined(String),
}

#[derive(Debug, Clone, Error)]
#[error("receipt delivery failed: {0}")]
pub struct ReceiptError(pub String);

#[derive(Debug, Clone)]
pub struct RedirectUrls {
    pub success: String,
    pub fail: String,
    pub cancel: String,
}

/// Store account an initiator presents to the gateway. Owned by the
/// initiator, not part of [`SessionRequest`]: callers never see credentials.
#[derive(Debug, Clone)]
pub struct StoreCredentials {
    pub store_id: String,
    pub store_password: String,
}

/// Everything the gateway needs to open a hosted payment session. The amount
/// is always the server-computed booking total, never a client figure.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub reference: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub customer_name: String,
    pub customer_email: String,
    pub redirect_urls: RedirectUrls,
    pub server_notification_url: String,
}

#[derive(Debug, Clone)]
pub struct InitiatedSession {
    pub gateway_redirect_url: String,
}

/// Opens a payment session with the gateway and returns the URL the customer
/// should be redirected to.
pub trait PaymentSessionInitiator: Send + Sync {
    fn initiate_session(
        &self,
        request: SessionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<InitiatedSession, SessionError>> + Send>>;
}

/// Sends the booking receipt email. Best effort: callers log failures and
/// move on, payment state never depends on the outcome.
pub trait ReceiptDispatcher: Send + Sync {
    fn send_receipt(
        &self,
        booking: &Booking,
    ) -> Pin<Box<dyn Future<Output = Result<(), ReceiptError>> + Send>>;
}

/// Mock initiator for development and tests: hands out a redirect URL under
/// its endpoint, or the scripted error when built with
/// [`failing`](Self::failing).
#[derive(Debug, Clone)]
pub struct MockPaymentSessionInitiator {
    fail_with: Option<SessionError>,
    endpoint: String,
    store_id: String,
}

impl MockPaymentSessionInitiator {
    pub fn new() -> Self {
        Self {
            fail_with: None,
            endpoint: crate::config::SANDBOX_GATEWAY_URL.to_string(),
            store_id: "teststore".to_string(),
        }
    }

    /// Built the way a real integration would be: endpoint from the
    /// sandbox/live switch, store account from the credentials.
    pub fn from_config(config: &crate::config::Config) -> Self {
        let credentials = config.store_credentials();
        Self {
            fail_with: None,
            endpoint: config.gateway_base_url().to_string(),
            store_id: credentials.store_id,
        }
    }

    pub fn failing(error: SessionError) -> Self {
        Self { fail_with: Some(error), ..Self::new() }
    }

    pub fn shared() -> Arc<dyn PaymentSessionInitiator> {
        Arc::new(Self::new())
    }
}

impl Default for MockPaymentSessionInitiator {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentSessionInitiator for MockPaymentSessionInitiator {
    fn initiate_session(
        &self,
        request: SessionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<InitiatedSession, SessionError>> + Send>> {
        let fail_with = self.fail_with.clone();
        let endpoint = self.endpoint.clone();
        let store_id = self.store_id.clone();
        Box::pin(async move {
            if let Some(error) = fail_with {
                return Err(error);
            }
            tracing::info!(
                reference = %request.reference,
                amount = %request.amount,
                currency = %request.currency,
                endpoint = %endpoint,
                store_id = %store_id,
                "Mock payment session opened"
            );
            Ok(InitiatedSession {
                gateway_redirect_url: format!("{endpoint}/session/{}", request.reference),
            })
        })
    }
}

/// Receipt dispatcher test double: counts delivery attempts and optionally
/// fails every one of them.
#[derive(Debug)]
pub struct CountingReceiptDispatcher {
    attempts: AtomicUsize,
    fail: bool,
    from_address: String,
}

impl CountingReceiptDispatcher {
    pub fn new() -> Self {
        Self {
            attempts: AtomicUsize::new(0),
            fail: false,
            from_address: "tickets@example.com".to_string(),
        }
    }

    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            from_address: config.receipt_from_address.clone(),
            ..Self::new()
        }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::new() }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Default for CountingReceiptDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiptDispatcher for CountingReceiptDispatcher {
    fn send_receipt(
        &self,
        booking: &Booking,
    ) -> Pin<Box<dyn Future<Output = Result<(), ReceiptError>> + Send>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let fail = self.fail;
        let reference = booking.reference;
        let email = booking.customer_email.clone();
        let from = self.from_address.clone();
        Box::pin(async move {
            if fail {
                return Err(ReceiptError("smtp unavailable".to_string()));
            }
            tracing::info!(reference = %reference, from = %from, email = %email, "Receipt dispatched");
            Ok(())
        })
    }
}

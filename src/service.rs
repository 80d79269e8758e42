//! The exposed surface of the backend, independent of transport: ticket
//! listing, booking creation with payment-session initiation, and the three
//! gateway callback channels.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::gateway::{PaymentSessionInitiator, ReceiptDispatcher, SessionRequest};
use crate::ledger::BookingLedger;
use crate::models::TicketType;
use crate::reconciler::{self, ChannelTrust, OutcomeReport, ReconcileOutcome, ReportedOutcome};
use crate::utils::error::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct RequestedItem {
    pub ticket_type_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub customer_name: String,
    pub customer_email: String,
    pub items: Vec<RequestedItem>,
}

/// A created booking together with where to send the customer to pay.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    pub reference: Uuid,
    pub gateway_redirect_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectStatus {
    Success,
    Failed,
    Cancelled,
    Error,
}

/// Where a browser channel sends the customer afterwards: the status page
/// with `status` and `id` (or `msg`) query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectTarget {
    pub status: RedirectStatus,
    pub id: Option<Uuid>,
    pub msg: Option<String>,
}

impl RedirectTarget {
    fn with_id(status: RedirectStatus, id: Uuid) -> Self {
        Self { status, id: Some(id), msg: None }
    }

    fn error(msg: &str) -> Self {
        Self { status: RedirectStatus::Error, id: None, msg: Some(msg.to_string()) }
    }

    /// Query string for the status-page redirect, e.g. `status=success&id=...`.
    pub fn query_string(&self) -> String {
        let status = match self.status {
            RedirectStatus::Success => "success",
            RedirectStatus::Failed => "failed",
            RedirectStatus::Cancelled => "cancelled",
            RedirectStatus::Error => "error",
        };
        let mut query = format!("status={status}");
        if let Some(id) = self.id {
            query.push_str(&format!("&id={id}"));
        }
        if let Some(msg) = &self.msg {
            query.push_str(&format!("&msg={msg}"));
        }
        query
    }
}

/// Server-notification report: the gateway's own view of the outcome plus
/// its confirmation id for successful payments.
#[derive(Debug, Clone, Deserialize)]
pub struct IpnReport {
    pub reference: Uuid,
    pub outcome: ReportedOutcome,
    pub gateway_confirmation_id: Option<String>,
}

/// Machine-readable acknowledgment returned to the gateway on the
/// server-notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IpnAck {
    Success,
    AlreadyPaid,
    BookingNotFound,
    UnsuccessfulPayment,
    /// Reserved for the transport layer: reconciliation itself never fails,
    /// but an HTTP front end answers this when it cannot process a
    /// notification at all (unreadable body, storage outage).
    Error,
    InvalidRequest,
}

pub struct BookingService {
    ledger: Arc<BookingLedger>,
    initiator: Arc<dyn PaymentSessionInitiator>,
    receipts: Arc<dyn ReceiptDispatcher>,
    config: Config,
}

impl BookingService {
    pub fn new(
        ledger: Arc<BookingLedger>,
        initiator: Arc<dyn PaymentSessionInitiator>,
        receipts: Arc<dyn ReceiptDispatcher>,
        config: Config,
    ) -> Self {
        Self { ledger, initiator, receipts, config }
    }

    pub fn ledger(&self) -> &BookingLedger {
        &self.ledger
    }

    pub async fn list_active_ticket_types(&self) -> Vec<TicketType> {
        self.ledger.list_active_ticket_types().await
    }

    /// Creates a pending booking, then synchronously asks the gateway for a
    /// payment session keyed by the booking reference.
    ///
    /// # Errors
    ///
    /// Validation and not-found errors from the ledger pass through with no
    /// booking persisted. If session initiation fails the booking is already
    /// persisted and stays pending; the returned `Upstream` error carries
    /// its reference so the caller can retry initiation later.
    pub async fn create_booking(
        &self,
        request: CreateBookingRequest,
    ) -> Result<CheckoutSession, AppError> {
        let items: Vec<(Uuid, u32)> = request
            .items
            .iter()
            .map(|item| (item.ticket_type_id, item.quantity))
            .collect();
        let booking = self
            .ledger
            .create_booking(&request.customer_name, &request.customer_email, &items)
            .await
            .map_err(|e| {
                e.log();
                e
            })?;

        let amount = booking.total_amount();
        info!(reference = %booking.reference, amount = %amount, "Initiating payment session");
        let session_request = SessionRequest {
            reference: booking.reference,
            amount,
            currency: self.config.currency.clone(),
            customer_name: booking.customer_name.clone(),
            customer_email: booking.customer_email.clone(),
            redirect_urls: self.config.redirect_urls(),
            server_notification_url: self.config.notification_url.clone(),
        };
        match self.initiator.initiate_session(session_request).await {
            Ok(session) => Ok(CheckoutSession {
                reference: booking.reference,
                gateway_redirect_url: session.gateway_redirect_url,
            }),
            Err(e) => {
                let err = AppError::Upstream {
                    reference: booking.reference,
                    message: e.to_string(),
                };
                err.log();
                Err(err)
            }
        }
    }

    /// Success redirect channel. The customer's browser lands here after the
    /// gateway reports a completed payment.
    pub async fn payment_succeeded(
        &self,
        reference: Uuid,
        gateway_confirmation_id: Option<String>,
    ) -> RedirectTarget {
        let outcome = reconciler::reconcile(
            &self.ledger,
            self.receipts.as_ref(),
            OutcomeReport {
                reference,
                outcome: ReportedOutcome::Confirmed,
                gateway_confirmation_id,
                channel_trust: ChannelTrust::UntrustedRedirect,
            },
        )
        .await;
        match outcome {
            // fresh confirmation and duplicate both land on the success page
            ReconcileOutcome::Confirmed | ReconcileOutcome::AlreadyPaid => {
                RedirectTarget::with_id(RedirectStatus::Success, reference)
            }
            ReconcileOutcome::BookingNotFound => RedirectTarget::error("BookingNotFound"),
            ReconcileOutcome::Failed | ReconcileOutcome::Cancelled => {
                RedirectTarget::error("PaymentProcessingError")
            }
        }
    }

    /// Fail redirect channel: informational, the booking stays pending.
    pub async fn payment_failed(&self, reference: Uuid) -> RedirectTarget {
        let _ = reconciler::reconcile(
            &self.ledger,
            self.receipts.as_ref(),
            OutcomeReport {
                reference,
                outcome: ReportedOutcome::Failed,
                gateway_confirmation_id: None,
                channel_trust: ChannelTrust::UntrustedRedirect,
            },
        )
        .await;
        RedirectTarget::with_id(RedirectStatus::Failed, reference)
    }

    /// Cancel redirect channel: informational, the booking stays pending.
    pub async fn payment_cancelled(&self, reference: Uuid) -> RedirectTarget {
        let _ = reconciler::reconcile(
            &self.ledger,
            self.receipts.as_ref(),
            OutcomeReport {
                reference,
                outcome: ReportedOutcome::Cancelled,
                gateway_confirmation_id: None,
                channel_trust: ChannelTrust::UntrustedRedirect,
            },
        )
        .await;
        RedirectTarget::with_id(RedirectStatus::Cancelled, reference)
    }

    /// Server-notification channel. Safe for the gateway to retry: a
    /// duplicate of an already-handled notification answers `ALREADY_PAID`
    /// instead of failing.
    pub async fn payment_notification(&self, report: IpnReport) -> IpnAck {
        if report.outcome == ReportedOutcome::Confirmed
            && report.gateway_confirmation_id.is_none()
        {
            warn!(
                reference = %report.reference,
                "Confirmed notification without a gateway confirmation id"
            );
            return IpnAck::InvalidRequest;
        }

        let outcome = reconciler::reconcile(
            &self.ledger,
            self.receipts.as_ref(),
            OutcomeReport {
                reference: report.reference,
                outcome: report.outcome,
                gateway_confirmation_id: report.gateway_confirmation_id,
                channel_trust: ChannelTrust::TrustedServerNotification,
            },
        )
        .await;
        match outcome {
            ReconcileOutcome::Confirmed => IpnAck::Success,
            ReconcileOutcome::AlreadyPaid => IpnAck::AlreadyPaid,
            ReconcileOutcome::BookingNotFound => IpnAck::BookingNotFound,
            ReconcileOutcome::Failed | ReconcileOutcome::Cancelled => {
                IpnAck::UnsuccessfulPayment
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{CountingReceiptDispatcher, MockPaymentSessionInitiator, SessionError};
    use crate::models::PaymentStatus;
    use rust_decimal::Decimal;

    fn config() -> Config {
        Config {
            currency: "BDT".to_string(),
            store_id: "teststore".to_string(),
            store_password: "teststore@pass".to_string(),
            sandbox: true,
            success_url: "http://localhost/payment/success".to_string(),
            fail_url: "http://localhost/payment/fail".to_string(),
            cancel_url: "http://localhost/payment/cancel".to_string(),
            notification_url: "http://localhost/payment/ipn".to_string(),
            receipt_from_address: "tickets@example.com".to_string(),
        }
    }

    fn service_with(
        initiator: MockPaymentSessionInitiator,
    ) -> (BookingService, Arc<CountingReceiptDispatcher>) {
        let receipts = CountingReceiptDispatcher::shared();
        let service = BookingService::new(
            Arc::new(BookingLedger::new()),
            Arc::new(initiator),
            receipts.clone(),
            config(),
        );
        (service, receipts)
    }

    async fn seed_gold(service: &BookingService, stock: u32) -> Uuid {
        service
            .ledger()
            .add_ticket_type("Gold", Decimal::new(2500, 2), stock, true)
            .await
            .id
    }

    fn request(gold: Uuid, quantity: u32) -> CreateBookingRequest {
        CreateBookingRequest {
            customer_name: "Ada".to_string(),
            customer_email: "ada@example.com".to_string(),
            items: vec![RequestedItem { ticket_type_id: gold, quantity }],
        }
    }

    #[tokio::test]
    async fn create_booking_returns_gateway_redirect() {
        let (service, _) = service_with(MockPaymentSessionInitiator::new());
        let gold = seed_gold(&service, 5).await;

        let session = service.create_booking(request(gold, 2)).await.unwrap();
        assert!(session
            .gateway_redirect_url
            .contains(&session.reference.to_string()));

        let booking = service.ledger().booking(session.reference).await.unwrap();
        assert_eq!(booking.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn config_built_initiator_uses_the_configured_endpoint() {
        let receipts = CountingReceiptDispatcher::shared();
        let service = BookingService::new(
            Arc::new(BookingLedger::new()),
            Arc::new(MockPaymentSessionInitiator::from_config(&config())),
            receipts,
            config(),
        );
        let gold = seed_gold(&service, 5).await;

        let session = service.create_booking(request(gold, 1)).await.unwrap();
        assert!(
            session
                .gateway_redirect_url
                .starts_with(config().gateway_base_url()),
            "unexpected redirect: {}",
            session.gateway_redirect_url
        );
    }

    #[tokio::test]
    async fn upstream_failure_leaves_booking_pending() {
        let (service, _) = service_with(MockPaymentSessionInitiator::failing(
            SessionError::Connection("connection refused".to_string()),
        ));
        let gold = seed_gold(&service, 5).await;

        let err = service.create_booking(request(gold, 2)).await.unwrap_err();
        let reference = match err {
            AppError::Upstream { reference, .. } => reference,
            other => panic!("expected upstream error, got {other:?}"),
        };

        // the booking survived the failed initiation and can be reconciled
        let booking = service.ledger().booking(reference).await.unwrap();
        assert_eq!(booking.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn success_redirect_confirms_and_duplicates_share_the_page() {
        let (service, receipts) = service_with(MockPaymentSessionInitiator::new());
        let gold = seed_gold(&service, 5).await;
        let session = service.create_booking(request(gold, 2)).await.unwrap();

        let first = service
            .payment_succeeded(session.reference, Some("val-9".to_string()))
            .await;
        assert_eq!(first.status, RedirectStatus::Success);
        assert_eq!(first.query_string(), format!("status=success&id={}", session.reference));

        let second = service
            .payment_succeeded(session.reference, Some("val-9".to_string()))
            .await;
        assert_eq!(second.status, RedirectStatus::Success);
        assert_eq!(receipts.attempts(), 1);
    }

    #[tokio::test]
    async fn unknown_reference_redirects_to_error() {
        let (service, _) = service_with(MockPaymentSessionInitiator::new());
        let target = service.payment_succeeded(Uuid::new_v4(), None).await;
        assert_eq!(target.status, RedirectStatus::Error);
        assert_eq!(target.msg.as_deref(), Some("BookingNotFound"));
        assert_eq!(target.query_string(), "status=error&msg=BookingNotFound");
    }

    #[tokio::test]
    async fn fail_and_cancel_redirects_keep_booking_pending() {
        let (service, receipts) = service_with(MockPaymentSessionInitiator::new());
        let gold = seed_gold(&service, 5).await;
        let session = service.create_booking(request(gold, 1)).await.unwrap();

        let failed = service.payment_failed(session.reference).await;
        assert_eq!(failed.status, RedirectStatus::Failed);
        let cancelled = service.payment_cancelled(session.reference).await;
        assert_eq!(cancelled.status, RedirectStatus::Cancelled);

        let booking = service.ledger().booking(session.reference).await.unwrap();
        assert_eq!(booking.status, PaymentStatus::Pending);
        assert_eq!(receipts.attempts(), 0);
    }

    #[tokio::test]
    async fn ipn_tokens_match_the_wire_format() {
        let (service, _) = service_with(MockPaymentSessionInitiator::new());
        let gold = seed_gold(&service, 5).await;
        let session = service.create_booking(request(gold, 1)).await.unwrap();

        let ack = service
            .payment_notification(IpnReport {
                reference: session.reference,
                outcome: ReportedOutcome::Confirmed,
                gateway_confirmation_id: Some("val-3".to_string()),
            })
            .await;
        assert_eq!(ack, IpnAck::Success);
        assert_eq!(serde_json::to_value(ack).unwrap(), "SUCCESS");

        let dup = service
            .payment_notification(IpnReport {
                reference: session.reference,
                outcome: ReportedOutcome::Confirmed,
                gateway_confirmation_id: Some("val-3".to_string()),
            })
            .await;
        assert_eq!(serde_json::to_value(dup).unwrap(), "ALREADY_PAID");

        let missing = service
            .payment_notification(IpnReport {
                reference: Uuid::new_v4(),
                outcome: ReportedOutcome::Confirmed,
                gateway_confirmation_id: Some("val-4".to_string()),
            })
            .await;
        assert_eq!(serde_json::to_value(missing).unwrap(), "BOOKING_NOT_FOUND");

        assert_eq!(
            serde_json::to_value(IpnAck::UnsuccessfulPayment).unwrap(),
            "UNSUCCESSFUL_PAYMENT"
        );
        assert_eq!(serde_json::to_value(IpnAck::Error).unwrap(), "ERROR");
        assert_eq!(
            serde_json::to_value(IpnAck::InvalidRequest).unwrap(),
            "INVALID_REQUEST"
        );
    }

    #[tokio::test]
    async fn confirmed_ipn_without_confirmation_id_is_invalid() {
        let (service, receipts) = service_with(MockPaymentSessionInitiator::new());
        let gold = seed_gold(&service, 5).await;
        let session = service.create_booking(request(gold, 1)).await.unwrap();

        let ack = service
            .payment_notification(IpnReport {
                reference: session.reference,
                outcome: ReportedOutcome::Confirmed,
                gateway_confirmation_id: None,
            })
            .await;
        assert_eq!(ack, IpnAck::InvalidRequest);

        // ledger untouched
        let booking = service.ledger().booking(session.reference).await.unwrap();
        assert_eq!(booking.status, PaymentStatus::Pending);
        assert_eq!(receipts.attempts(), 0);
    }

    #[tokio::test]
    async fn failed_ipn_answers_unsuccessful_payment() {
        let (service, _) = service_with(MockPaymentSessionInitiator::new());
        let gold = seed_gold(&service, 5).await;
        let session = service.create_booking(request(gold, 1)).await.unwrap();

        let ack = service
            .payment_notification(IpnReport {
                reference: session.reference,
                outcome: ReportedOutcome::Failed,
                gateway_confirmation_id: None,
            })
            .await;
        assert_eq!(ack, IpnAck::UnsuccessfulPayment);
    }
}

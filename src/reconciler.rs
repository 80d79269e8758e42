//! Payment Reconciler: turns gateway outcome reports into ledger mutations.
//!
//! The same decision rule serves all three callback channels (success, fail
//! and cancel browser redirects, plus the server-to-server notification).
//! It is idempotent under arbitrary duplication and reordering: a booking
//! transitions to paid at most once, inventory is decremented at most once,
//! and the receipt is dispatched at most once, all guarded by the ledger's
//! paid-is-terminal check inside `confirm_payment`.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::gateway::ReceiptDispatcher;
use crate::ledger::{BookingLedger, ConfirmOutcome};

/// Outcome the gateway reports for a transaction reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportedOutcome {
    Confirmed,
    Failed,
    Cancelled,
}

/// How much the delivery channel can be trusted. Browser redirects are
/// client-controlled; the server notification is gateway-to-server. Both
/// currently drive state equally, but every transition performed by an
/// untrusted channel is logged at warn level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelTrust {
    UntrustedRedirect,
    TrustedServerNotification,
}

/// A gateway report as received by one of the callback channels.
#[derive(Debug, Clone)]
pub struct OutcomeReport {
    pub reference: Uuid,
    pub outcome: ReportedOutcome,
    /// Present only for confirmed payments.
    pub gateway_confirmation_id: Option<String>,
    pub channel_trust: ChannelTrust,
}

/// What the reconciler decided. `Failed` and `Cancelled` are informational
/// echoes: the booking stays pending (there is no failed terminal state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconcileOutcome {
    Confirmed,
    AlreadyPaid,
    BookingNotFound,
    Failed,
    Cancelled,
}

/// Applies the decision rule for one report.
///
/// Safe to call any number of times for the same reference, from any mix of
/// channels, in any order. Receipt dispatch happens after the ledger lock is
/// released, only on the winning confirmation; a dispatch failure is logged
/// and swallowed, never rolling back the paid transition.
pub async fn reconcile(
    ledger: &BookingLedger,
    receipts: &dyn ReceiptDispatcher,
    report: OutcomeReport,
) -> ReconcileOutcome {
    match report.outcome {
        ReportedOutcome::Confirmed => {
            let outcome = ledger
                .confirm_payment(report.reference, report.gateway_confirmation_id.as_deref())
                .await;
            match outcome {
                ConfirmOutcome::NotFound => {
                    warn!(reference = %report.reference, "Confirmation for unknown booking reference");
                    ReconcileOutcome::BookingNotFound
                }
                ConfirmOutcome::AlreadyPaid => {
                    info!(reference = %report.reference, "Duplicate confirmation absorbed, booking already paid");
                    ReconcileOutcome::AlreadyPaid
                }
                ConfirmOutcome::Confirmed { booking, shortfalls } => {
                    if report.channel_trust == ChannelTrust::UntrustedRedirect {
                        warn!(
                            reference = %booking.reference,
                            "Paid transition driven by untrusted redirect channel"
                        );
                    }
                    if !shortfalls.is_empty() {
                        warn!(
                            reference = %booking.reference,
                            shortfalls = shortfalls.len(),
                            "Confirmed payment hit inventory shortfall"
                        );
                    }
                    if let Err(e) = receipts.send_receipt(&booking).await {
                        error!(reference = %booking.reference, error = %e, "Receipt dispatch failed");
                    }
                    ReconcileOutcome::Confirmed
                }
            }
        }
        ReportedOutcome::Failed | ReportedOutcome::Cancelled => {
            match ledger.booking(report.reference).await {
                None => {
                    warn!(
                        reference = %report.reference,
                        outcome = ?report.outcome,
                        "Unsuccessful-payment report for unknown booking reference"
                    );
                    ReconcileOutcome::BookingNotFound
                }
                Some(booking) if booking.is_paid() => {
                    info!(
                        reference = %report.reference,
                        outcome = ?report.outcome,
                        "Late unsuccessful-payment report for a paid booking, ignored"
                    );
                    ReconcileOutcome::AlreadyPaid
                }
                Some(_) => {
                    // informational only: no failed terminal state exists
                    info!(
                        reference = %report.reference,
                        outcome = ?report.outcome,
                        "Unsuccessful payment reported, booking left pending"
                    );
                    match report.outcome {
                        ReportedOutcome::Cancelled => ReconcileOutcome::Cancelled,
                        _ => ReconcileOutcome::Failed,
                    }
                }
            }
        }
    }
}

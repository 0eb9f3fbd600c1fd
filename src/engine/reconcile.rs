use serde::Serialize;
use tracing::{error, info, warn};

use crate::model::*;
use crate::notify::{booking_confirmed_text, push_best_effort};
use crate::payment::{PaymentNotification, PaymentOutcome};

use super::Engine;

/// What a payment notification did. Every variant is acknowledged to the
/// provider; only `Confirmed` changed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Confirmed,
    AlreadyConfirmed,
    NotTransitionable,
    UnknownBooking,
    PaymentFailed,
    Malformed,
    UpstreamError,
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Confirmed => "confirmed",
            ReconcileOutcome::AlreadyConfirmed => "already_confirmed",
            ReconcileOutcome::NotTransitionable => "not_transitionable",
            ReconcileOutcome::UnknownBooking => "unknown_booking",
            ReconcileOutcome::PaymentFailed => "payment_failed",
            ReconcileOutcome::Malformed => "malformed",
            ReconcileOutcome::UpstreamError => "upstream_error",
        }
    }
}

impl Engine {
    /// Apply a provider notification. Delivery is at-least-once, so the
    /// current status is read fresh and only `PENDING_PAYMENT` moves;
    /// a redelivery finds `CONFIRMED` and does nothing, notification included.
    pub async fn reconcile(&self, body: &[u8]) -> ReconcileOutcome {
        let outcome = self.reconcile_inner(body).await;
        metrics::counter!(crate::observability::WEBHOOKS_TOTAL, "outcome" => outcome.as_str()).increment(1);
        outcome
    }

    async fn reconcile_inner(&self, body: &[u8]) -> ReconcileOutcome {
        let note = match PaymentNotification::parse(body) {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "ignoring unparseable payment notification");
                return ReconcileOutcome::Malformed;
            }
        };
        let order_id = note.order_id.trim();

        let bookings = match self.fetch_bookings().await {
            Ok(b) => b,
            Err(e) => {
                error!(order_id, error = %e, "could not read ledger for payment notification");
                return ReconcileOutcome::UpstreamError;
            }
        };
        let Some(booking) = bookings.into_iter().find(|b| b.booking_id == order_id) else {
            warn!(order_id, "payment notification for unknown booking");
            return ReconcileOutcome::UnknownBooking;
        };

        if let PaymentOutcome::Failed { code } = note.outcome() {
            warn!(order_id, return_code = %code, status = %booking.status, "payment failed; booking unchanged");
            return ReconcileOutcome::PaymentFailed;
        }

        match booking.status {
            BookingStatus::PendingPayment => {}
            BookingStatus::Confirmed => {
                info!(order_id, "duplicate payment notification; already confirmed");
                return ReconcileOutcome::AlreadyConfirmed;
            }
            ref other => {
                warn!(order_id, status = %other, "payment for booking that can no longer be confirmed");
                return ReconcileOutcome::NotTransitionable;
            }
        }

        if let Err(e) = self
            .update_status(booking.row_number, &BookingStatus::Confirmed, Some(&note.transaction_id))
            .await
        {
            error!(order_id, transaction_id = %note.transaction_id, error = %e, "failed to confirm booking");
            return ReconcileOutcome::UpstreamError;
        }

        let confirmed = Booking {
            status: BookingStatus::Confirmed,
            transaction_id: Some(note.transaction_id.clone()),
            ..booking
        };
        info!(order_id, transaction_id = %note.transaction_id, "booking confirmed");
        push_best_effort(
            self.notifier.as_ref(),
            &confirmed.requester_identity,
            &booking_confirmed_text(&confirmed),
        )
        .await;
        ReconcileOutcome::Confirmed
    }
}

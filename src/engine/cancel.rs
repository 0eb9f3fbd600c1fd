use chrono::NaiveDate;
use tracing::info;

use crate::limits::MAX_ID_LEN;
use crate::model::*;

use super::validate::required;
use super::{Engine, EngineError, PolicyViolation};

impl Engine {
    /// Status and cutoff rules for a user-initiated cancellation. Ownership
    /// is checked separately. Dates only: the time of day never matters.
    pub(super) fn cancellation_policy(&self, booking: &Booking, today: NaiveDate) -> Result<(), PolicyViolation> {
        match &booking.status {
            BookingStatus::PendingPayment => {}
            BookingStatus::Confirmed => return Err(PolicyViolation::AlreadyConfirmed),
            BookingStatus::Cancelled => return Err(PolicyViolation::AlreadyCancelled),
            other => return Err(PolicyViolation::NotCancellable(other.clone())),
        }
        let days = booking.check_in_date.signed_duration_since(today).num_days();
        if days < self.cancel_cutoff_days {
            return Err(PolicyViolation::CutoffPassed {
                days_until_check_in: days,
                cutoff_days: self.cancel_cutoff_days,
            });
        }
        Ok(())
    }

    /// Cancel a pending booking on behalf of its requester. Checks run in
    /// order: existence, ownership, status, cutoff.
    pub async fn cancel(&self, booking_id: &str, requester: &str) -> Result<Booking, EngineError> {
        let booking_id = required("bookingId", booking_id, MAX_ID_LEN)?;
        let requester = required("requesterIdentity", requester, MAX_ID_LEN)?;

        let mut booking = self.find_booking(booking_id).await?;
        if booking.requester_identity != requester {
            return Err(PolicyViolation::NotOwner.into());
        }
        self.cancellation_policy(&booking, self.today())?;

        self.update_status(booking.row_number, &BookingStatus::Cancelled, None)
            .await?;
        booking.status = BookingStatus::Cancelled;

        metrics::counter!(crate::observability::CANCELLATIONS_TOTAL).increment(1);
        info!(booking_id = %booking.booking_id, room_id = %booking.room_id, "booking cancelled");
        Ok(booking)
    }
}

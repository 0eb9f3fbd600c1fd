use serde::Serialize;
use tracing::{info, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::payment::{CheckoutRequest, CheckoutSession};
use crate::records::CellRange;
use crate::tables::{self, BOOKING_STATUS_COL, BOOKING_TRANSACTION_COL, BOOKINGS_APPEND_RANGE, BOOKINGS_RANGE, BOOKINGS_TABLE};

use super::validate::{check_len, required, validate_range};
use super::{Engine, EngineError, PolicyViolation};

/// A booking request as received from a client.
#[derive(Debug, Clone, Default)]
pub struct NewBooking {
    pub requester_identity: String,
    pub display_name: String,
    pub room_id: String,
    pub check_in: String,
    pub check_out: String,
    pub guest_name: String,
    pub guest_phone: String,
    /// What the client displayed. Logged when it disagrees, never stored.
    pub client_total: Option<Price>,
}

#[derive(Debug, Clone)]
pub struct CreatedBooking {
    /// `row_number` is the appended row, or 0 when the store didn't say.
    pub booking: Booking,
    pub room_name: String,
}

/// A booking as its owner sees it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: Booking,
    pub cancellable: bool,
}

impl Engine {
    /// Every parseable booking row, in ledger order. A row a human broke
    /// (bad dates) is skipped with a warning rather than failing every
    /// availability check.
    pub async fn fetch_bookings(&self) -> Result<Vec<Booking>, EngineError> {
        let rows = self.records.get(BOOKINGS_RANGE).await?;
        let mut out = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            match tables::parse_booking(i, row) {
                Ok(Some(b)) => out.push(b),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "skipping malformed booking row"),
            }
        }
        Ok(out)
    }

    /// Rows without an id count toward occupancy but are never found here.
    pub async fn find_booking(&self, booking_id: &str) -> Result<Booking, EngineError> {
        let booking_id = booking_id.trim();
        if booking_id.is_empty() {
            return Err(EngineError::BookingNotFound(String::new()));
        }
        self.fetch_bookings()
            .await?
            .into_iter()
            .find(|b| b.booking_id == booking_id)
            .ok_or_else(|| EngineError::BookingNotFound(booking_id.to_string()))
    }

    pub async fn bookings_for(&self, requester: &str) -> Result<Vec<BookingView>, EngineError> {
        let requester = required("requesterIdentity", requester, MAX_ID_LEN)?;
        let today = self.today();
        Ok(self
            .fetch_bookings()
            .await?
            .into_iter()
            .filter(|b| b.requester_identity == requester)
            .map(|booking| BookingView {
                cancellable: self.cancellation_policy(&booking, today).is_ok(),
                booking,
            })
            .collect())
    }

    /// Recheck availability, price on the server, and append a
    /// `PENDING_PAYMENT` row.
    ///
    /// The store has no transactions: two requests for the last unit can
    /// both pass the recheck before either append lands. That window is
    /// accepted; overbooking is resolved by hand.
    pub async fn create_booking(&self, req: NewBooking) -> Result<CreatedBooking, EngineError> {
        let requester = required("requesterIdentity", &req.requester_identity, MAX_ID_LEN)?;
        let room_id = required("roomId", &req.room_id, MAX_ID_LEN)?;
        let guest_name = required("guestName", &req.guest_name, MAX_NAME_LEN)?;
        let guest_phone = req.guest_phone.trim();
        check_len("guestPhone", guest_phone, MAX_PHONE_LEN)?;
        let display_name = req.display_name.trim();
        check_len("displayName", display_name, MAX_NAME_LEN)?;
        let range = validate_range(&req.check_in, &req.check_out)?;

        let room = self.room(room_id)?;
        let ledger = self.fetch_bookings().await?;
        let avail = self.availability_with(&room, &ledger, range)?;
        if avail.available_count == 0 {
            metrics::counter!(crate::observability::BOOKINGS_REJECTED_TOTAL, "reason" => "capacity").increment(1);
            info!(room_id, %range, "booking rejected: no capacity");
            return Err(EngineError::CapacityConflict {
                room_id: room.id,
                range: range.to_string(),
            });
        }

        let quote = self.price_for(&room, range)?;
        if let Some(client_total) = req.client_total
            && client_total != quote.total_price
        {
            warn!(
                room_id,
                %range,
                client_total,
                server_total = quote.total_price,
                "client total disagrees with server price; using server price"
            );
        }

        let mut booking = Booking {
            booking_id: format!("HB-{}", Ulid::new()),
            timestamp: self.clock.timestamp(),
            requester_identity: requester.to_string(),
            display_name: display_name.to_string(),
            room_id: room.id.clone(),
            check_in_date: range.start,
            check_out_date: range.end,
            guest_name: guest_name.to_string(),
            guest_phone: guest_phone.to_string(),
            total_price: quote.total_price,
            status: BookingStatus::PendingPayment,
            transaction_id: None,
            row_number: 0,
        };
        let row = self
            .records
            .append_row(BOOKINGS_APPEND_RANGE, tables::booking_row(&booking))
            .await?;
        booking.row_number = row.map_or(0, |r| r as usize);

        metrics::counter!(crate::observability::BOOKINGS_CREATED_TOTAL).increment(1);
        info!(
            booking_id = %booking.booking_id,
            room_id = %booking.room_id,
            %range,
            total = booking.total_price,
            row = booking.row_number,
            "booking created"
        );
        Ok(CreatedBooking {
            booking,
            room_name: room.name,
        })
    }

    /// Targeted write of the status cell, plus the transaction cell when
    /// `transaction_id` is given. Other cells of the row are never touched.
    pub async fn update_status(
        &self,
        row: usize,
        status: &BookingStatus,
        transaction_id: Option<&str>,
    ) -> Result<(), EngineError> {
        let row = u32::try_from(row)
            .ok()
            .filter(|r| *r as usize >= tables::FIRST_DATA_ROW)
            .ok_or_else(|| EngineError::validation(format!("row {row} is not a booking row")))?;
        let (range, values) = match transaction_id {
            Some(tx) => (
                CellRange::row_span(BOOKINGS_TABLE, BOOKING_STATUS_COL, BOOKING_TRANSACTION_COL, row),
                vec![status.as_str().to_string(), tx.to_string()],
            ),
            None => (
                CellRange::cell(BOOKINGS_TABLE, BOOKING_STATUS_COL, row),
                vec![status.as_str().to_string()],
            ),
        };
        self.records.update_cells(&range, values).await?;
        Ok(())
    }

    /// Ask the payment provider for a checkout link for a pending booking.
    /// The amount is the total recorded on the booking row.
    pub async fn create_payment(&self, booking_id: &str) -> Result<CheckoutSession, EngineError> {
        let booking_id = required("bookingId", booking_id, MAX_ID_LEN)?;
        let booking = self.find_booking(booking_id).await?;
        if booking.status != BookingStatus::PendingPayment {
            return Err(PolicyViolation::NotPayable(booking.status).into());
        }
        let product_name = self
            .room(&booking.room_id)
            .map(|r| r.name)
            .unwrap_or_else(|_| booking.room_id.clone());
        let session = self
            .payments
            .create_checkout(&CheckoutRequest {
                order_id: booking.booking_id.clone(),
                amount: booking.total_price,
                product_name,
            })
            .await?;
        info!(
            booking_id = %booking.booking_id,
            transaction_id = %session.transaction_id,
            amount = booking.total_price,
            "checkout created"
        );
        Ok(session)
    }
}

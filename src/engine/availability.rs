use tracing::debug;

use crate::model::*;

use super::validate::check_stay_len;
use super::{Engine, EngineError};

// ── Availability Algorithm ────────────────────────────────────────

/// Free units of `room` across `range`: the minimum over every night.
///
/// Per night: a closure override zeroes the whole range (a stay can't span
/// a closed night); otherwise the override's unit count, else the room's
/// base count, minus every non-cancelled booking occupying that night.
///
/// Cost is O(nights × bookings for this room overlapping the range); the
/// caller bounds `nights`. Never negative. An empty range yields 0.
pub fn available_count(
    room: &Room,
    calendar: &InventoryCalendar,
    bookings: &[Booking],
    range: &StayRange,
) -> u32 {
    let relevant: Vec<&Booking> = bookings
        .iter()
        .filter(|b| b.room_id == room.id && b.status.occupies_inventory() && b.stay().overlaps(range))
        .collect();

    let mut min_free: Option<i64> = None;
    for night in range.iter_nights() {
        let ov = calendar.get(night, &room.id);
        if ov.is_some_and(|o| o.is_closed) {
            return 0;
        }
        let units = ov.and_then(|o| o.inventory).unwrap_or(room.total_quantity);
        let occupied = relevant.iter().filter(|b| b.stay().contains_night(night)).count();
        let free = i64::from(units) - occupied as i64;
        min_free = Some(min_free.map_or(free, |m| m.min(free)));
    }

    min_free.unwrap_or(0).max(0) as u32
}

impl Engine {
    pub async fn availability(&self, room_id: &str, range: StayRange) -> Result<AvailabilityInfo, EngineError> {
        check_stay_len(&range)?;
        let room = self.room(room_id)?;
        let bookings = self.fetch_bookings().await?;
        self.availability_with(&room, &bookings, range)
    }

    /// Availability over an already-fetched ledger.
    pub(super) fn availability_with(
        &self,
        room: &Room,
        bookings: &[Booking],
        range: StayRange,
    ) -> Result<AvailabilityInfo, EngineError> {
        let calendar = self.cache.inventory()?;
        let count = available_count(room, &calendar, bookings, &range);
        debug!(room_id = %room.id, %range, count, "availability computed");
        Ok(AvailabilityInfo {
            room_id: room.id.clone(),
            start_date: range.start,
            end_date: range.end,
            available_count: count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> chrono::NaiveDate {
        parse_date(s).unwrap()
    }

    fn range(a: &str, b: &str) -> StayRange {
        StayRange::new(d(a), d(b))
    }

    fn room(units: u32) -> Room {
        Room {
            id: "R".into(),
            name: "Room R".into(),
            description: String::new(),
            price: 1000,
            friday_price: None,
            saturday_price: Some(1500),
            total_quantity: units,
            image_urls: vec![],
            is_active: true,
        }
    }

    fn booking(room_id: &str, check_in: &str, check_out: &str, status: BookingStatus) -> Booking {
        Booking {
            booking_id: format!("HB-{check_in}-{room_id}"),
            timestamp: String::new(),
            requester_identity: "U1".into(),
            display_name: String::new(),
            room_id: room_id.into(),
            check_in_date: d(check_in),
            check_out_date: d(check_out),
            guest_name: "Guest".into(),
            guest_phone: String::new(),
            total_price: 0,
            status,
            transaction_id: None,
            row_number: 2,
        }
    }

    #[test]
    fn base_capacity_without_bookings() {
        let n = available_count(&room(2), &InventoryCalendar::default(), &[], &range("2025-06-06", "2025-06-07"));
        assert_eq!(n, 2);
    }

    #[test]
    fn one_booking_takes_one_unit() {
        let bookings = vec![booking("R", "2025-06-06", "2025-06-07", BookingStatus::PendingPayment)];
        let n = available_count(
            &room(2),
            &InventoryCalendar::default(),
            &bookings,
            &range("2025-06-06", "2025-06-07"),
        );
        assert_eq!(n, 1);
    }

    #[test]
    fn minimum_across_nights() {
        // Busy only on the middle night.
        let bookings = vec![
            booking("R", "2025-06-07", "2025-06-08", BookingStatus::Confirmed),
            booking("R", "2025-06-07", "2025-06-08", BookingStatus::Confirmed),
        ];
        let n = available_count(
            &room(3),
            &InventoryCalendar::default(),
            &bookings,
            &range("2025-06-06", "2025-06-09"),
        );
        assert_eq!(n, 1);
    }

    #[test]
    fn checkout_night_is_free() {
        let bookings = vec![booking("R", "2025-06-05", "2025-06-06", BookingStatus::Confirmed)];
        let n = available_count(
            &room(1),
            &InventoryCalendar::default(),
            &bookings,
            &range("2025-06-06", "2025-06-07"),
        );
        assert_eq!(n, 1);
    }

    #[test]
    fn cancelled_and_other_rooms_ignored() {
        let bookings = vec![
            booking("R", "2025-06-06", "2025-06-07", BookingStatus::Cancelled),
            booking("S", "2025-06-06", "2025-06-07", BookingStatus::Confirmed),
        ];
        let n = available_count(
            &room(1),
            &InventoryCalendar::default(),
            &bookings,
            &range("2025-06-06", "2025-06-07"),
        );
        assert_eq!(n, 1);
    }

    #[test]
    fn closure_on_any_night_zeroes_range() {
        let mut cal = InventoryCalendar::default();
        cal.insert(d("2025-07-04"), "R".into(), DayOverride { inventory: None, is_closed: true });
        assert_eq!(available_count(&room(5), &cal, &[], &range("2025-07-03", "2025-07-05")), 0);
        // Ranges not touching the closed night are unaffected.
        assert_eq!(available_count(&room(5), &cal, &[], &range("2025-07-02", "2025-07-04")), 5);
        assert_eq!(available_count(&room(5), &cal, &[], &range("2025-07-05", "2025-07-06")), 5);
    }

    #[test]
    fn closure_wins_over_explicit_count() {
        let mut cal = InventoryCalendar::default();
        cal.insert(d("2025-07-04"), "R".into(), DayOverride { inventory: Some(9), is_closed: true });
        assert_eq!(available_count(&room(1), &cal, &[], &range("2025-07-04", "2025-07-05")), 0);
    }

    #[test]
    fn override_count_replaces_base() {
        let mut cal = InventoryCalendar::default();
        cal.insert(d("2025-06-06"), "R".into(), DayOverride { inventory: Some(1), is_closed: false });
        cal.insert(d("2025-06-07"), "R".into(), DayOverride { inventory: Some(4), is_closed: false });
        assert_eq!(available_count(&room(2), &cal, &[], &range("2025-06-06", "2025-06-07")), 1);
        assert_eq!(available_count(&room(2), &cal, &[], &range("2025-06-07", "2025-06-08")), 4);
        assert_eq!(available_count(&room(2), &cal, &[], &range("2025-06-06", "2025-06-08")), 1);
    }

    #[test]
    fn override_for_other_room_ignored() {
        let mut cal = InventoryCalendar::default();
        cal.insert(d("2025-06-06"), "S".into(), DayOverride { inventory: None, is_closed: true });
        assert_eq!(available_count(&room(2), &cal, &[], &range("2025-06-06", "2025-06-07")), 2);
    }

    #[test]
    fn overbooked_night_clamps_to_zero() {
        // A manual edit left three bookings on a night with a 1-unit override.
        let mut cal = InventoryCalendar::default();
        cal.insert(d("2025-06-06"), "R".into(), DayOverride { inventory: Some(1), is_closed: false });
        let bookings: Vec<_> = (0..3)
            .map(|_| booking("R", "2025-06-06", "2025-06-07", BookingStatus::Confirmed))
            .collect();
        assert_eq!(available_count(&room(2), &cal, &bookings, &range("2025-06-06", "2025-06-07")), 0);
    }

    #[test]
    fn never_negative_over_many_shapes() {
        let bookings: Vec<_> = (0..6)
            .map(|i| {
                let start = d("2025-06-01") + chrono::Days::new(i);
                let end = start + chrono::Days::new(2);
                booking("R", &format_date(start), &format_date(end), BookingStatus::PendingPayment)
            })
            .collect();
        for units in 0..3 {
            for len in 1..8u64 {
                let start = d("2025-05-30");
                let r = StayRange::new(start, start + chrono::Days::new(len));
                let n = available_count(&room(units), &InventoryCalendar::default(), &bookings, &r);
                assert!(n <= units);
            }
        }
    }
}

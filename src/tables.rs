//! Row layouts of the system-of-record tables and their codecs.
//!
//! Row 1 of every table is a header; data starts at row 2. Cells are
//! human-edited, so parsing tolerates case, whitespace and thousands
//! separators, and rows without their key cells are skipped. A key that is
//! present but unparseable is an error: the caller decides whether that
//! aborts the whole read.

use chrono::NaiveDate;
use thiserror::Error;

use crate::model::*;
use crate::records::cell;

pub const ROOMS_RANGE: &str = "rooms!A2:I";
pub const INVENTORY_RANGE: &str = "inventory_calendar!A2:D";
pub const PRICING_RANGE: &str = "pricing_rules!A2:C";

pub const BOOKINGS_TABLE: &str = "bookings";
pub const BOOKINGS_RANGE: &str = "bookings!A2:L";
pub const BOOKINGS_APPEND_RANGE: &str = "bookings!A:L";
/// Column K.
pub const BOOKING_STATUS_COL: u32 = 10;
/// Column L.
pub const BOOKING_TRANSACTION_COL: u32 = 11;

pub const FIRST_DATA_ROW: usize = 2;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{table} row {row}: {reason}")]
pub struct RowError {
    pub table: &'static str,
    pub row: usize,
    pub reason: String,
}

impl RowError {
    fn new(table: &'static str, index: usize, reason: impl Into<String>) -> Self {
        Self {
            table,
            row: index + FIRST_DATA_ROW,
            reason: reason.into(),
        }
    }
}

fn parse_flag(s: &str) -> bool {
    s.trim().eq_ignore_ascii_case("TRUE")
}

/// Whole-unit amount; accepts `1,500` and `1500.0` as typed into a sheet.
pub fn parse_amount(s: &str) -> Option<Price> {
    let cleaned: String = s.chars().filter(|c| !c.is_whitespace() && *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(n) = cleaned.parse::<Price>() {
        return Some(n);
    }
    match cleaned.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 => Some(f.round() as Price),
        _ => None,
    }
}

fn parse_count(s: &str) -> Option<u32> {
    parse_amount(s).and_then(|n| u32::try_from(n).ok())
}

fn parse_key_date(table: &'static str, index: usize, s: &str) -> Result<NaiveDate, RowError> {
    parse_date(s).ok_or_else(|| RowError::new(table, index, format!("invalid date {s:?}")))
}

/// `rooms`: id, name, description, price, fridayPrice, saturdayPrice,
/// totalQuantity, imageUrl(s), isActive.
pub fn parse_room(row: &[String]) -> Option<Room> {
    let id = cell(row, 0);
    if id.is_empty() {
        return None;
    }
    Some(Room {
        id: id.to_string(),
        name: cell(row, 1).to_string(),
        description: cell(row, 2).to_string(),
        price: parse_amount(cell(row, 3)).unwrap_or(0),
        friday_price: parse_amount(cell(row, 4)),
        saturday_price: parse_amount(cell(row, 5)),
        total_quantity: parse_count(cell(row, 6)).unwrap_or(0),
        image_urls: cell(row, 7)
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        is_active: parse_flag(cell(row, 8)),
    })
}

/// `inventory_calendar`: date, roomId, inventory, close.
pub fn parse_override(index: usize, row: &[String]) -> Result<Option<(NaiveDate, String, DayOverride)>, RowError> {
    let (date, room_id) = (cell(row, 0), cell(row, 1));
    if date.is_empty() || room_id.is_empty() {
        return Ok(None);
    }
    let date = parse_key_date("inventory_calendar", index, date)?;
    let inventory = match cell(row, 2) {
        "" => None,
        s => Some(parse_count(s).ok_or_else(|| {
            RowError::new("inventory_calendar", index, format!("invalid inventory {s:?}"))
        })?),
    };
    Ok(Some((
        date,
        room_id.to_string(),
        DayOverride {
            inventory,
            is_closed: parse_flag(cell(row, 3)),
        },
    )))
}

/// `pricing_rules`: date, roomId, price.
pub fn parse_pricing_rule(index: usize, row: &[String]) -> Result<Option<(NaiveDate, String, Price)>, RowError> {
    let (date, room_id, price) = (cell(row, 0), cell(row, 1), cell(row, 2));
    if date.is_empty() || room_id.is_empty() || price.is_empty() {
        return Ok(None);
    }
    let date = parse_key_date("pricing_rules", index, date)?;
    let price = parse_amount(price)
        .ok_or_else(|| RowError::new("pricing_rules", index, format!("invalid price {price:?}")))?;
    Ok(Some((date, room_id.to_string(), price)))
}

/// `bookings`: bookingId, timestamp, requesterIdentity, displayName, roomId,
/// checkInDate, checkOutDate, guestName, guestPhone, totalPrice, status,
/// transactionId.
pub fn parse_booking(index: usize, row: &[String]) -> Result<Option<Booking>, RowError> {
    let booking_id = cell(row, 0);
    // Hand-typed walk-ins may lack an id but still occupy a unit.
    if booking_id.is_empty() && cell(row, 4).is_empty() {
        return Ok(None);
    }
    let check_in = parse_key_date("bookings", index, cell(row, 5))?;
    let check_out = parse_key_date("bookings", index, cell(row, 6))?;
    if check_out <= check_in {
        return Err(RowError::new("bookings", index, "check-out not after check-in"));
    }
    let transaction_id = match cell(row, 11) {
        "" => None,
        s => Some(s.to_string()),
    };
    Ok(Some(Booking {
        booking_id: booking_id.to_string(),
        timestamp: cell(row, 1).to_string(),
        requester_identity: cell(row, 2).to_string(),
        display_name: cell(row, 3).to_string(),
        room_id: cell(row, 4).to_string(),
        check_in_date: check_in,
        check_out_date: check_out,
        guest_name: cell(row, 7).to_string(),
        guest_phone: cell(row, 8).to_string(),
        total_price: parse_amount(cell(row, 9)).unwrap_or(0),
        status: BookingStatus::parse(cell(row, 10)),
        transaction_id,
        row_number: index + FIRST_DATA_ROW,
    }))
}

pub fn booking_row(b: &Booking) -> Vec<String> {
    vec![
        b.booking_id.clone(),
        b.timestamp.clone(),
        b.requester_identity.clone(),
        b.display_name.clone(),
        b.room_id.clone(),
        format_date(b.check_in_date),
        format_date(b.check_out_date),
        b.guest_name.clone(),
        b.guest_phone.clone(),
        b.total_price.to_string(),
        b.status.as_str().to_string(),
        b.transaction_id.clone().unwrap_or_default(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn amounts_tolerate_sheet_formatting() {
        assert_eq!(parse_amount("1,500"), Some(1500));
        assert_eq!(parse_amount(" 1000 "), Some(1000));
        assert_eq!(parse_amount("1200.0"), Some(1200));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("n/a"), None);
        assert_eq!(parse_amount("-5"), None);
    }

    #[test]
    fn room_row_parses_optional_weekend_prices() {
        let r = parse_room(&row(&["R1", "Twin", "Cozy", "1000", "", "1500", "2", "a.jpg, b.jpg", "true"])).unwrap();
        assert_eq!(r.friday_price, None);
        assert_eq!(r.saturday_price, Some(1500));
        assert_eq!(r.total_quantity, 2);
        assert_eq!(r.image_urls, vec!["a.jpg", "b.jpg"]);
        assert!(r.is_active);
    }

    #[test]
    fn room_row_defaults_inactive_and_zero() {
        let r = parse_room(&row(&["R2", "Suite", "", "abc"])).unwrap();
        assert_eq!(r.price, 0);
        assert_eq!(r.total_quantity, 0);
        assert!(!r.is_active);
        assert!(parse_room(&row(&["", "No id"])).is_none());
    }

    #[test]
    fn override_row_distinguishes_empty_count() {
        let (date, room, ov) = parse_override(0, &row(&["2025-07-04", "R", "", "TRUE"])).unwrap().unwrap();
        assert_eq!(format_date(date), "2025-07-04");
        assert_eq!(room, "R");
        assert_eq!(ov, DayOverride { inventory: None, is_closed: true });

        let (_, _, ov) = parse_override(1, &row(&["2025-07-05", "R", "0"])).unwrap().unwrap();
        assert_eq!(ov, DayOverride { inventory: Some(0), is_closed: false });
    }

    #[test]
    fn override_row_bad_date_is_an_error() {
        let err = parse_override(3, &row(&["07/04/2025", "R"])).unwrap_err();
        assert_eq!(err.table, "inventory_calendar");
        assert_eq!(err.row, 5);
        assert!(parse_override(0, &row(&["", "R", "1"])).unwrap().is_none());
    }

    #[test]
    fn pricing_row_requires_all_cells() {
        assert!(parse_pricing_rule(0, &row(&["2025-06-07", "R"])).unwrap().is_none());
        let (_, _, p) = parse_pricing_rule(0, &row(&["2025-06-07", "R", "2,000"])).unwrap().unwrap();
        assert_eq!(p, 2000);
        assert!(parse_pricing_rule(0, &row(&["2025-06-07", "R", "free"])).is_err());
    }

    #[test]
    fn booking_row_roundtrips_through_sheet_layout() {
        let cells = row(&[
            "HB-1", "2025-06-01T00:00:00Z", "U1", "Amy", "R", "2025-06-06", "2025-06-07", "Amy Lin",
            "0912", "1000", "PENDING_PAYMENT",
        ]);
        let b = parse_booking(4, &cells).unwrap().unwrap();
        assert_eq!(b.row_number, 6);
        assert_eq!(b.status, BookingStatus::PendingPayment);
        assert_eq!(b.transaction_id, None);

        let mut expected = cells.clone();
        expected.push(String::new());
        assert_eq!(booking_row(&b), expected);
    }

    #[test]
    fn booking_row_without_id_is_kept_when_it_names_a_room() {
        let walk_in = row(&["", "", "", "", "S", "2025-06-10", "2025-06-12", "Walk-in", "", "", "CONFIRMED"]);
        let b = parse_booking(0, &walk_in).unwrap().unwrap();
        assert_eq!(b.booking_id, "");
        assert_eq!(b.room_id, "S");
        assert_eq!(b.status, BookingStatus::Confirmed);

        assert!(parse_booking(1, &row(&[])).unwrap().is_none());
        assert!(parse_booking(2, &row(&["", "", "", "", "", "2025-06-10", "2025-06-12"])).unwrap().is_none());
    }

    #[test]
    fn booking_row_rejects_inverted_stay() {
        let cells = row(&["HB-2", "", "U1", "", "R", "2025-06-07", "2025-06-07"]);
        assert!(parse_booking(0, &cells).is_err());
    }
}

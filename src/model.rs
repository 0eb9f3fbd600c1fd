use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Whole currency units. The only money type.
pub type Price = u64;

/// Calendar dates on the wire and in the record store are always `YYYY-MM-DD`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok()
}

pub fn format_date(d: NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

/// Half-open range of nights `[start, end)`. `end` is the check-out date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl StayRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start < end, "StayRange start must be before end");
        Self { start, end }
    }

    /// Returns `None` unless `start < end`.
    pub fn try_new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// Calendar-day difference; never derived from wall-clock durations.
    pub fn nights(&self) -> i64 {
        self.end.signed_duration_since(self.start).num_days()
    }

    pub fn contains_night(&self, d: NaiveDate) -> bool {
        self.start <= d && d < self.end
    }

    pub fn overlaps(&self, other: &StayRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Every occupied night, check-in inclusive, check-out exclusive.
    pub fn iter_nights(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d < end)
    }
}

impl fmt::Display for StayRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", format_date(self.start), format_date(self.end))
    }
}

// ── Cached reference data ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Base nightly price.
    pub price: Price,
    pub friday_price: Option<Price>,
    pub saturday_price: Option<Price>,
    /// Units of this room type sold per night.
    pub total_quantity: u32,
    pub image_urls: Vec<String>,
    pub is_active: bool,
}

impl Room {
    /// Configured weekend price for `d`, if `d` is a weekend night for this room.
    pub fn weekend_price(&self, d: NaiveDate) -> Option<Price> {
        match d.weekday() {
            Weekday::Fri => self.friday_price,
            Weekday::Sat => self.saturday_price,
            _ => None,
        }
    }
}

/// Per-date, per-room exception to capacity or open state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayOverride {
    pub inventory: Option<u32>,
    pub is_closed: bool,
}

/// `date → roomId → override`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InventoryCalendar(pub BTreeMap<NaiveDate, HashMap<String, DayOverride>>);

impl InventoryCalendar {
    pub fn get(&self, date: NaiveDate, room_id: &str) -> Option<&DayOverride> {
        self.0.get(&date).and_then(|rooms| rooms.get(room_id))
    }

    pub fn insert(&mut self, date: NaiveDate, room_id: String, ov: DayOverride) {
        self.0.entry(date).or_default().insert(room_id, ov);
    }

    pub fn len(&self) -> usize {
        self.0.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `date → roomId → absolute nightly price`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PricingCalendar(pub BTreeMap<NaiveDate, HashMap<String, Price>>);

impl PricingCalendar {
    pub fn get(&self, date: NaiveDate, room_id: &str) -> Option<Price> {
        self.0.get(&date).and_then(|rooms| rooms.get(room_id)).copied()
    }

    pub fn insert(&mut self, date: NaiveDate, room_id: String, price: Price) {
        self.0.entry(date).or_default().insert(room_id, price);
    }

    pub fn len(&self) -> usize {
        self.0.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Bookings ────────────────────────────────────────────────────

/// Booking lifecycle. `Unrecognized` preserves whatever a human typed into
/// the status cell; it still occupies inventory and can't be transitioned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BookingStatus {
    PendingPayment,
    Confirmed,
    Cancelled,
    Unrecognized(String),
}

impl BookingStatus {
    pub fn as_str(&self) -> &str {
        match self {
            BookingStatus::PendingPayment => "PENDING_PAYMENT",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Unrecognized(s) => s,
        }
    }

    pub fn parse(cell: &str) -> Self {
        match cell.trim().to_ascii_uppercase().as_str() {
            "PENDING_PAYMENT" => BookingStatus::PendingPayment,
            "CONFIRMED" => BookingStatus::Confirmed,
            "CANCELLED" => BookingStatus::Cancelled,
            _ => BookingStatus::Unrecognized(cell.trim().to_string()),
        }
    }

    /// Everything except a cancellation holds a unit.
    pub fn occupies_inventory(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }

    /// The only edges are out of `PENDING_PAYMENT`.
    pub fn can_transition_to(&self, next: &BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::PendingPayment, BookingStatus::Confirmed)
                | (BookingStatus::PendingPayment, BookingStatus::Cancelled)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for BookingStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BookingStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(BookingStatus::parse(&s))
    }
}

/// One row of the booking ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub booking_id: String,
    pub timestamp: String,
    pub requester_identity: String,
    pub display_name: String,
    pub room_id: String,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub guest_name: String,
    pub guest_phone: String,
    pub total_price: Price,
    pub status: BookingStatus,
    pub transaction_id: Option<String>,
    /// 1-based sheet row, used to address targeted cell updates.
    #[serde(skip)]
    pub row_number: usize,
}

impl Booking {
    pub fn stay(&self) -> StayRange {
        StayRange::new(self.check_in_date, self.check_out_date)
    }

    /// True if this booking holds a unit of `room_id` on night `d`.
    pub fn occupies(&self, room_id: &str, d: NaiveDate) -> bool {
        self.room_id == room_id && self.status.occupies_inventory() && self.stay().contains_night(d)
    }
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityInfo {
    pub room_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub available_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub room_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub nights: i64,
    pub total_price: Price,
}

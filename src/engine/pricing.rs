use chrono::NaiveDate;

use crate::model::*;

use super::validate::check_stay_len;
use super::{Engine, EngineError};

/// Price of one night. Priority: a dated pricing rule, then the room's
/// weekend price for that weekday, then the base price.
pub fn nightly_price(room: &Room, rules: &PricingCalendar, night: NaiveDate) -> Price {
    rules
        .get(night, &room.id)
        .or_else(|| room.weekend_price(night))
        .unwrap_or(room.price)
}

pub fn total_price(room: &Room, rules: &PricingCalendar, range: &StayRange) -> Price {
    range
        .iter_nights()
        .map(|night| nightly_price(room, rules, night))
        .fold(0, Price::saturating_add)
}

impl Engine {
    /// Authoritative price of a stay. Client-supplied totals are never used.
    pub fn price(&self, room_id: &str, range: StayRange) -> Result<PriceQuote, EngineError> {
        check_stay_len(&range)?;
        let room = self.room(room_id)?;
        self.price_for(&room, range)
    }

    pub(super) fn price_for(&self, room: &Room, range: StayRange) -> Result<PriceQuote, EngineError> {
        let rules = self.cache.pricing()?;
        Ok(PriceQuote {
            room_id: room.id.clone(),
            start_date: range.start,
            end_date: range.end,
            nights: range.nights(),
            total_price: total_price(room, &rules, &range),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn room() -> Room {
        Room {
            id: "R".into(),
            name: "Room R".into(),
            description: String::new(),
            price: 1000,
            friday_price: None,
            saturday_price: Some(1500),
            total_quantity: 2,
            image_urls: vec![],
            is_active: true,
        }
    }

    #[test]
    fn friday_and_saturday_scenario() {
        // 2025-06-06 is a Friday: no Friday price configured, so base.
        let r = StayRange::new(d("2025-06-06"), d("2025-06-08"));
        assert_eq!(total_price(&room(), &PricingCalendar::default(), &r), 2500);
    }

    #[test]
    fn friday_override_applies_when_set() {
        let mut rm = room();
        rm.friday_price = Some(1200);
        assert_eq!(nightly_price(&rm, &PricingCalendar::default(), d("2025-06-06")), 1200);
        assert_eq!(nightly_price(&rm, &PricingCalendar::default(), d("2025-06-05")), 1000);
    }

    #[test]
    fn pricing_rule_beats_weekend_and_base() {
        let mut rules = PricingCalendar::default();
        rules.insert(d("2025-06-07"), "R".into(), 800); // Saturday
        rules.insert(d("2025-06-09"), "R".into(), 3000); // Monday
        let rm = room();
        assert_eq!(nightly_price(&rm, &rules, d("2025-06-07")), 800);
        assert_eq!(nightly_price(&rm, &rules, d("2025-06-09")), 3000);
        assert_eq!(nightly_price(&rm, &rules, d("2025-06-08")), 1000);
    }

    #[test]
    fn zero_price_rule_is_honored() {
        let mut rules = PricingCalendar::default();
        rules.insert(d("2025-06-07"), "R".into(), 0);
        assert_eq!(nightly_price(&room(), &rules, d("2025-06-07")), 0);
    }

    #[test]
    fn rule_for_other_room_ignored() {
        let mut rules = PricingCalendar::default();
        rules.insert(d("2025-06-09"), "S".into(), 9999);
        assert_eq!(nightly_price(&room(), &rules, d("2025-06-09")), 1000);
    }

    #[test]
    fn week_long_total() {
        // Mon 2025-06-02 .. Mon 2025-06-09: five weekdays + Fri(base) + Sat(1500).
        let r = StayRange::new(d("2025-06-02"), d("2025-06-09"));
        assert_eq!(total_price(&room(), &PricingCalendar::default(), &r), 6 * 1000 + 1500);
    }
}

use std::time::Instant;

use serde::Serialize;
use tracing::{error, info};

use crate::model::*;
use crate::records::Rows;
use crate::tables::{self, INVENTORY_RANGE, PRICING_RANGE, ROOMS_RANGE, RowError};

use super::{Engine, EngineError};

/// Normalized reference data, ready to be written to the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub rooms: Vec<Room>,
    pub inventory: InventoryCalendar,
    pub pricing: PricingCalendar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub rooms: usize,
    pub overrides: usize,
    pub pricing_rules: usize,
}

/// Build a snapshot from the three raw tables. Any unparseable key cell
/// fails the whole build so a bad edit never reaches readers.
pub fn build_snapshot(rooms: &Rows, inventory: &Rows, pricing: &Rows) -> Result<Snapshot, RowError> {
    let rooms = rooms
        .iter()
        .filter_map(|row| tables::parse_room(row))
        .filter(|r| r.is_active)
        .collect();

    let mut inv = InventoryCalendar::default();
    for (i, row) in inventory.iter().enumerate() {
        if let Some((date, room_id, ov)) = tables::parse_override(i, row)? {
            inv.insert(date, room_id, ov);
        }
    }

    let mut prices = PricingCalendar::default();
    for (i, row) in pricing.iter().enumerate() {
        if let Some((date, room_id, price)) = tables::parse_pricing_rule(i, row)? {
            prices.insert(date, room_id, price);
        }
    }

    Ok(Snapshot {
        rooms,
        inventory: inv,
        pricing: prices,
    })
}

impl Engine {
    /// Pull rooms, overrides and pricing rules in one batched read and
    /// replace the cached documents. On any failure the cache keeps its
    /// last good state.
    pub async fn sync(&self) -> Result<SyncReport, EngineError> {
        let _guard = self.sync_lock.lock().await;
        let started = Instant::now();
        let result = self.sync_inner().await;
        let elapsed = started.elapsed().as_secs_f64();
        metrics::histogram!(crate::observability::SYNC_DURATION_SECONDS).record(elapsed);

        match &result {
            Ok(report) => {
                metrics::counter!(crate::observability::SYNC_TOTAL, "status" => "ok").increment(1);
                metrics::gauge!(crate::observability::ROOMS_CACHED).set(report.rooms as f64);
                info!(
                    rooms = report.rooms,
                    overrides = report.overrides,
                    pricing_rules = report.pricing_rules,
                    elapsed_ms = (elapsed * 1000.0) as u64,
                    "cache sync complete"
                );
            }
            Err(e) => {
                metrics::counter!(crate::observability::SYNC_TOTAL, "status" => "error").increment(1);
                error!(error = %e, "cache sync failed; keeping previous cache");
            }
        }
        result
    }

    async fn sync_inner(&self) -> Result<SyncReport, EngineError> {
        let tables = self
            .records
            .batch_get(&[ROOMS_RANGE, INVENTORY_RANGE, PRICING_RANGE])
            .await?;
        let [rooms, inventory, pricing] = <[Rows; 3]>::try_from(tables).map_err(|got| {
            crate::records::RecordStoreError::Malformed(format!("expected 3 ranges, got {}", got.len()))
        })?;

        let snapshot = build_snapshot(&rooms, &inventory, &pricing)?;

        // Every document is encoded and written whole; nothing is written
        // until all three parsed.
        self.cache.put_rooms(&snapshot.rooms)?;
        self.cache.put_inventory(&snapshot.inventory)?;
        self.cache.put_pricing(&snapshot.pricing)?;

        Ok(SyncReport {
            rooms: snapshot.rooms.len(),
            overrides: snapshot.inventory.len(),
            pricing_rules: snapshot.pricing.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[&[&str]]) -> Rows {
        data.iter().map(|r| r.iter().map(|s| s.to_string()).collect()).collect()
    }

    #[test]
    fn inactive_and_idless_rooms_filtered() {
        let rooms = rows(&[
            &["R1", "Twin", "", "1000", "", "", "2", "", "TRUE"],
            &["R2", "Suite", "", "3000", "", "", "1", "", "FALSE"],
            &["", "Ghost", "", "1", "", "", "1", "", "TRUE"],
            &["R3", "Dorm", "", "500"],
        ]);
        let snap = build_snapshot(&rooms, &vec![], &vec![]).unwrap();
        let ids: Vec<_> = snap.rooms.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["R1"]);
    }

    #[test]
    fn calendars_nest_by_date_then_room() {
        let inventory = rows(&[
            &["2025-07-04", "R1", "", "TRUE"],
            &["2025-07-04", "R2", "3"],
            &["2025-07-05", "R1", "1", "false"],
            &["", "R1", "1"],
        ]);
        let pricing = rows(&[&["2025-06-07", "R1", "1800"], &["2025-06-07", "R1"]]);
        let snap = build_snapshot(&vec![], &inventory, &pricing).unwrap();

        let d = |s| parse_date(s).unwrap();
        assert!(snap.inventory.get(d("2025-07-04"), "R1").unwrap().is_closed);
        assert_eq!(snap.inventory.get(d("2025-07-04"), "R2").unwrap().inventory, Some(3));
        assert_eq!(snap.inventory.get(d("2025-07-05"), "R1").unwrap().inventory, Some(1));
        assert_eq!(snap.inventory.len(), 3);
        assert_eq!(snap.pricing.get(d("2025-06-07"), "R1"), Some(1800));
        assert_eq!(snap.pricing.len(), 1);
    }

    #[test]
    fn later_duplicate_row_wins() {
        let pricing = rows(&[&["2025-06-07", "R1", "1800"], &["2025-06-07", "R1", "2000"]]);
        let snap = build_snapshot(&vec![], &vec![], &pricing).unwrap();
        assert_eq!(snap.pricing.get(parse_date("2025-06-07").unwrap(), "R1"), Some(2000));
    }

    #[test]
    fn bad_date_fails_whole_build() {
        let inventory = rows(&[&["2025-07-04", "R1", "", "TRUE"], &["July 5", "R1", "1"]]);
        let err = build_snapshot(&vec![], &inventory, &vec![]).unwrap_err();
        assert_eq!(err.row, 3);
    }
}

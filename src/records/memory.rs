use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::StatusCode;

use super::{CellRange, RecordStore, RecordStoreError, Rows};

/// In-process stand-in for the spreadsheet. Row 1 of every table is the
/// header, like the real sheet. Used by tests and local runs.
#[derive(Default)]
pub struct MemoryRecordStore {
    tables: DashMap<String, Rows>,
    update_log: Mutex<Vec<(String, Vec<String>)>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a whole table: header row followed by data rows.
    pub fn set_table(&self, name: &str, header: &[&str], rows: Rows) {
        let mut all = Vec::with_capacity(rows.len() + 1);
        all.push(header.iter().map(|s| s.to_string()).collect());
        all.extend(rows);
        self.tables.insert(name.to_string(), all);
    }

    /// Raw rows of a table including the header (empty if unknown).
    pub fn table(&self, name: &str) -> Rows {
        self.tables.get(name).map(|t| t.value().clone()).unwrap_or_default()
    }

    /// Every targeted update so far, as `(A1 range, values)`.
    pub fn updates(&self) -> Vec<(String, Vec<String>)> {
        self.update_log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn unavailable() -> RecordStoreError {
        RecordStoreError::Api {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "record store unavailable".into(),
        }
    }

    fn read_range(&self, range: &CellRange) -> Rows {
        let Some(table) = self.tables.get(&range.table) else {
            return Vec::new();
        };
        let first = range.start_row.unwrap_or(1) as usize;
        let last = range.end_row.map(|r| r as usize).unwrap_or(match range.end_col {
            // `A2:L` is open-ended downward; a lone `K5` is one cell.
            Some(_) => table.len(),
            None if range.start_row.is_some() => first,
            None => table.len(),
        });
        let start_col = range.start_col as usize;
        let width = range.width();

        let mut out: Rows = Vec::new();
        for row in table.iter().skip(first - 1).take(last.saturating_sub(first - 1)) {
            let mut cells: Vec<String> = row.iter().skip(start_col).take(width).cloned().collect();
            while cells.last().is_some_and(|c| c.is_empty()) {
                cells.pop();
            }
            out.push(cells);
        }
        // The real API omits trailing empty rows.
        while out.last().is_some_and(|r| r.is_empty()) {
            out.pop();
        }
        out
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn batch_get(&self, ranges: &[&str]) -> Result<Vec<Rows>, RecordStoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        ranges
            .iter()
            .map(|r| {
                let range = CellRange::parse(r).ok_or_else(|| RecordStoreError::InvalidRange(r.to_string()))?;
                Ok(self.read_range(&range))
            })
            .collect()
    }

    async fn append_row(&self, range: &str, row: Vec<String>) -> Result<Option<u32>, RecordStoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        let range = CellRange::parse(range).ok_or_else(|| RecordStoreError::InvalidRange(range.to_string()))?;
        let mut table = self.tables.entry(range.table).or_default();
        table.push(row);
        Ok(Some(table.len() as u32))
    }

    async fn update_cells(&self, range: &CellRange, values: Vec<String>) -> Result<(), RecordStoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        let row_no = range
            .start_row
            .ok_or_else(|| RecordStoreError::InvalidRange(range.to_string()))? as usize;
        if values.len() > range.width() {
            return Err(RecordStoreError::InvalidRange(format!(
                "{range}: {} values for {} cells",
                values.len(),
                range.width()
            )));
        }
        {
            let mut table = self.tables.entry(range.table.clone()).or_default();
            while table.len() < row_no {
                table.push(Vec::new());
            }
            let row = &mut table[row_no - 1];
            for (offset, value) in values.iter().enumerate() {
                let col = range.start_col as usize + offset;
                if row.len() <= col {
                    row.resize(col + 1, String::new());
                }
                row[col] = value.clone();
            }
        }
        if let Ok(mut log) = self.update_log.lock() {
            log.push((range.to_string(), values));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn reads_skip_header_and_trim_trailing_cells() {
        let store = MemoryRecordStore::new();
        store.set_table("t", &["a", "b", "c"], vec![row(&["1", "2", ""]), row(&["3", "", ""])]);
        let rows = store.get("t!A2:C").await.unwrap();
        assert_eq!(rows, vec![row(&["1", "2"]), row(&["3"])]);
    }

    #[tokio::test]
    async fn batch_get_preserves_order() {
        let store = MemoryRecordStore::new();
        store.set_table("x", &["h"], vec![row(&["x1"])]);
        store.set_table("y", &["h"], vec![row(&["y1"]), row(&["y2"])]);
        let out = store.batch_get(&["y!A2:A", "x!A2:A", "missing!A2:A"]).await.unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].len(), 2);
        assert_eq!(out[1], vec![row(&["x1"])]);
        assert!(out[2].is_empty());
    }

    #[tokio::test]
    async fn append_reports_row_number() {
        let store = MemoryRecordStore::new();
        store.set_table("t", &["h"], vec![row(&["a"])]);
        let pos = store.append_row("t!A:L", row(&["b"])).await.unwrap();
        assert_eq!(pos, Some(3));
    }

    #[tokio::test]
    async fn update_touches_only_named_cells() {
        let store = MemoryRecordStore::new();
        store.set_table("t", &["a", "b", "c"], vec![row(&["1", "2", "3"])]);
        store
            .update_cells(&CellRange::cell("t", 1, 2), vec!["X".into()])
            .await
            .unwrap();
        assert_eq!(store.table("t")[1], row(&["1", "X", "3"]));
        assert_eq!(store.updates(), vec![("t!B2".to_string(), vec!["X".to_string()])]);
    }

    #[tokio::test]
    async fn update_rejects_too_many_values() {
        let store = MemoryRecordStore::new();
        let result = store
            .update_cells(&CellRange::cell("t", 0, 2), vec!["a".into(), "b".into()])
            .await;
        assert!(matches!(result, Err(RecordStoreError::InvalidRange(_))));
    }

    #[tokio::test]
    async fn injected_failures() {
        let store = MemoryRecordStore::new();
        store.set_fail_reads(true);
        assert!(store.get("t!A2:A").await.is_err());
        store.set_fail_writes(true);
        assert!(store.append_row("t!A:A", vec![]).await.is_err());
    }
}

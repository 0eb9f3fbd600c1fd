//! Client side of the external system of record.
//!
//! The store is a human-editable spreadsheet: no transactions, no row
//! locks, and writes become visible to readers eventually. Everything here
//! addresses data by table name and A1 range.

pub mod a1;
pub mod memory;
pub mod sheets;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::auth::AuthError;

pub use a1::CellRange;
pub use memory::MemoryRecordStore;
pub use sheets::SheetsClient;

/// Rows as returned by the store: trailing empty cells may be missing.
pub type Rows = Vec<Vec<String>>;

#[derive(Debug, Error)]
pub enum RecordStoreError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("record store API error (status {status}): {message}")]
    Api { status: StatusCode, message: String },
    #[error("malformed record store response: {0}")]
    Malformed(String),
    #[error("invalid range: {0}")]
    InvalidRange(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch several ranges in one round trip. Output order matches `ranges`.
    async fn batch_get(&self, ranges: &[&str]) -> Result<Vec<Rows>, RecordStoreError>;

    /// Append one row after the last non-empty row of the range's table.
    /// Returns the 1-based row the store wrote to, when it reports one.
    async fn append_row(&self, range: &str, row: Vec<String>) -> Result<Option<u32>, RecordStoreError>;

    /// Overwrite exactly the cells named by `range`, left to right.
    async fn update_cells(&self, range: &CellRange, values: Vec<String>) -> Result<(), RecordStoreError>;

    async fn get(&self, range: &str) -> Result<Rows, RecordStoreError> {
        let mut all = self.batch_get(&[range]).await?;
        all.pop()
            .ok_or_else(|| RecordStoreError::Malformed(format!("no value range returned for {range}")))
    }
}

/// Cell `i` of a sparse row, trimmed; missing cells read as empty.
pub fn cell(row: &[String], i: usize) -> &str {
    row.get(i).map(|s| s.trim()).unwrap_or("")
}

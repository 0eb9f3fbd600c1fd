//! Fast read replica of the reference tables.
//!
//! Each document lives under one key and is only ever replaced whole, so a
//! reader sees either the previous or the next complete snapshot of that
//! table.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::model::*;

pub const ROOMS_KEY: &str = "rooms_data";
pub const INVENTORY_KEY: &str = "inventory_calendar";
pub const PRICING_KEY: &str = "pricing_rules";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cached document {key} is corrupt: {source}")]
    Corrupt {
        key: &'static str,
        source: serde_json::Error,
    },
    #[error("failed to encode document {key}: {source}")]
    Encode {
        key: &'static str,
        source: serde_json::Error,
    },
}

/// String key-value store. `put` replaces the value atomically.
pub trait KvCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Arc<str>>;
    fn put(&self, key: &str, value: String);
}

#[derive(Default)]
pub struct MemoryCache {
    docs: DashMap<String, Arc<str>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Arc<str>> {
        self.docs.get(key).map(|e| e.value().clone())
    }

    fn put(&self, key: &str, value: String) {
        self.docs.insert(key.to_string(), Arc::from(value));
    }
}

/// Typed view over the three reference documents.
#[derive(Clone)]
pub struct ReferenceCache {
    kv: Arc<dyn KvCache>,
}

impl ReferenceCache {
    pub fn new(kv: Arc<dyn KvCache>) -> Self {
        Self { kv }
    }

    fn read<T: DeserializeOwned>(&self, key: &'static str) -> Result<Option<T>, CacheError> {
        let Some(raw) = self.kv.get(key) else {
            return Ok(None);
        };
        // Documents pasted in by hand sometimes carry a byte-order mark.
        let text = raw.strip_prefix('\u{feff}').unwrap_or(&*raw);
        serde_json::from_str(text)
            .map(Some)
            .map_err(|source| CacheError::Corrupt { key, source })
    }

    fn write<T: Serialize>(&self, key: &'static str, doc: &T) -> Result<(), CacheError> {
        let json = serde_json::to_string(doc).map_err(|source| CacheError::Encode { key, source })?;
        self.kv.put(key, json);
        Ok(())
    }

    /// Active rooms, or `None` if no sync has populated the cache yet.
    pub fn rooms(&self) -> Result<Option<Vec<Room>>, CacheError> {
        self.read(ROOMS_KEY)
    }

    /// Missing calendar means no overrides.
    pub fn inventory(&self) -> Result<InventoryCalendar, CacheError> {
        Ok(self.read(INVENTORY_KEY)?.unwrap_or_default())
    }

    pub fn pricing(&self) -> Result<PricingCalendar, CacheError> {
        Ok(self.read(PRICING_KEY)?.unwrap_or_default())
    }

    pub fn put_rooms(&self, rooms: &[Room]) -> Result<(), CacheError> {
        self.write(ROOMS_KEY, &rooms)
    }

    pub fn put_inventory(&self, cal: &InventoryCalendar) -> Result<(), CacheError> {
        self.write(INVENTORY_KEY, cal)
    }

    pub fn put_pricing(&self, cal: &PricingCalendar) -> Result<(), CacheError> {
        self.write(PRICING_KEY, cal)
    }
}

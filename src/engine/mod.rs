mod availability;
mod cancel;
mod error;
mod ledger;
mod pricing;
mod reconcile;
mod sync;
mod validate;

pub use availability::available_count;
pub use error::{EngineError, PolicyViolation};
pub use ledger::{BookingView, CreatedBooking, NewBooking};
pub use pricing::{nightly_price, total_price};
pub use reconcile::ReconcileOutcome;
pub use sync::{Snapshot, SyncReport, build_snapshot};
pub use validate::validate_range;

use std::sync::Arc;

use chrono::{Local, NaiveDate, SecondsFormat, Utc};
use tokio::sync::Mutex;

use crate::cache::{KvCache, ReferenceCache};
use crate::model::Room;
use crate::notify::Notifier;
use crate::payment::PaymentGateway;
use crate::records::RecordStore;

/// Cancellation closes this many calendar days before check-in.
pub const DEFAULT_CANCEL_CUTOFF_DAYS: i64 = 2;

/// Source of "now". Cancellation compares calendar dates only.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
    fn timestamp(&self) -> String;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn timestamp(&self) -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Frozen clock for tests and replays.
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }

    fn timestamp(&self) -> String {
        format!("{}T00:00:00.000Z", crate::model::format_date(self.0))
    }
}

/// Request handlers share one `Engine`. The only in-process state is the
/// read cache; the booking ledger lives in the record store.
pub struct Engine {
    pub records: Arc<dyn RecordStore>,
    pub cache: ReferenceCache,
    pub notifier: Arc<dyn Notifier>,
    pub payments: Arc<dyn PaymentGateway>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) cancel_cutoff_days: i64,
    /// Serializes syncs so an older snapshot never lands after a newer one.
    pub(super) sync_lock: Mutex<()>,
}

impl Engine {
    pub fn new(
        records: Arc<dyn RecordStore>,
        kv: Arc<dyn KvCache>,
        notifier: Arc<dyn Notifier>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            records,
            cache: ReferenceCache::new(kv),
            notifier,
            payments,
            clock: Arc::new(SystemClock),
            cancel_cutoff_days: DEFAULT_CANCEL_CUTOFF_DAYS,
            sync_lock: Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cancel_cutoff_days(mut self, days: i64) -> Self {
        self.cancel_cutoff_days = days;
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Active rooms from the cache. A cache no sync has filled yet is an
    /// error, not an empty list.
    pub fn rooms(&self) -> Result<Vec<Room>, EngineError> {
        self.cache.rooms()?.ok_or(EngineError::CacheUnavailable)
    }

    pub fn room(&self, room_id: &str) -> Result<Room, EngineError> {
        self.rooms()?
            .into_iter()
            .find(|r| r.id == room_id)
            .ok_or_else(|| EngineError::RoomNotFound(room_id.to_string()))
    }
}

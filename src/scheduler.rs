use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::engine::Engine;

/// Background task that refreshes the reference cache. The first tick fires
/// immediately so the cache is warm shortly after startup. A failed sync is
/// logged by `Engine::sync`; the next tick is the retry.
pub async fn run_sync_loop(engine: Arc<Engine>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        if let Err(e) = engine.sync().await {
            debug!("scheduled sync will retry next tick: {e}");
        }
    }
}

use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total API requests. Labels: route, status.
pub const HTTP_REQUESTS_TOTAL: &str = "innkeep_http_requests_total";

/// Histogram: API request latency in seconds. Labels: route.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "innkeep_http_request_duration_seconds";

/// Counter: bookings appended to the ledger.
pub const BOOKINGS_CREATED_TOTAL: &str = "innkeep_bookings_created_total";

/// Counter: booking attempts refused. Labels: reason.
pub const BOOKINGS_REJECTED_TOTAL: &str = "innkeep_bookings_rejected_total";

/// Counter: payment webhooks handled. Labels: outcome.
pub const WEBHOOKS_TOTAL: &str = "innkeep_webhooks_total";

/// Counter: cancellations applied.
pub const CANCELLATIONS_TOTAL: &str = "innkeep_cancellations_total";

// ── Background work ─────────────────────────────────────────────

/// Counter: cache sync runs. Labels: status.
pub const SYNC_TOTAL: &str = "innkeep_sync_total";

/// Histogram: cache sync duration in seconds.
pub const SYNC_DURATION_SECONDS: &str = "innkeep_sync_duration_seconds";

/// Gauge: active rooms in the cache after the last good sync.
pub const ROOMS_CACHED: &str = "innkeep_rooms_cached";

/// Counter: best-effort pushes that failed.
pub const NOTIFICATIONS_FAILED_TOTAL: &str = "innkeep_notifications_failed_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

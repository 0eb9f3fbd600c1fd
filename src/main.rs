use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use innkeep::auth::ServiceAccountAuth;
use innkeep::cache::MemoryCache;
use innkeep::config::Config;
use innkeep::engine::Engine;
use innkeep::http::{self, AppState};
use innkeep::notify::{LogNotifier, MessagingClient, Notifier};
use innkeep::payment::HttpPaymentGateway;
use innkeep::records::SheetsClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    innkeep::observability::init(config.metrics_port)?;

    let token_source = Arc::new(ServiceAccountAuth::from_json(&config.service_account_key)?);
    let records = Arc::new(SheetsClient::new(
        config.sheets_base_url.clone(),
        config.sheet_id.clone(),
        token_source,
    ));
    let notifier: Arc<dyn Notifier> = match &config.messaging_token {
        Some(token) => Arc::new(MessagingClient::new(config.messaging_base_url.clone(), token.clone())),
        None => Arc::new(LogNotifier),
    };
    let payments = Arc::new(HttpPaymentGateway::new(config.payment.clone()));

    let engine = Arc::new(
        Engine::new(records, Arc::new(MemoryCache::new()), notifier, payments)
            .with_cancel_cutoff_days(config.cancel_cutoff_days),
    );

    let sync_task = tokio::spawn(innkeep::scheduler::run_sync_loop(engine.clone(), config.sync_interval));

    let app = http::router(AppState {
        engine,
        webhook_secret: config.webhook_secret.as_deref().map(Arc::from),
    });

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("innkeep listening on {addr}");
    info!("  sheet: {}", config.sheet_id);
    info!("  sync_interval: {}s", config.sync_interval.as_secs());
    info!("  cancel_cutoff_days: {}", config.cancel_cutoff_days);
    info!("  messaging: {}", if config.messaging_token.is_some() { "enabled" } else { "log only" });
    info!("  webhook signature: {}", if config.webhook_secret.is_some() { "required" } else { "not checked" });
    info!("  metrics: {}", config.metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    // Graceful shutdown: stop accepting on SIGTERM/ctrl-c, let in-flight requests finish
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!("SIGTERM handler unavailable: {e}");
                    ctrl_c.await.ok();
                }
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
        info!("shutdown signal received");
    };

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    sync_task.abort();
    info!("innkeep stopped");
    Ok(())
}

//! Process configuration, read once from `INNKEEP_*` environment variables.

use std::time::Duration;

use thiserror::Error;

use crate::engine::DEFAULT_CANCEL_CUTOFF_DAYS;
use crate::payment::GatewayConfig;

pub const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";
pub const DEFAULT_PAYMENT_BASE_URL: &str = "https://sandbox-api-pay.line.me";
pub const DEFAULT_MESSAGING_BASE_URL: &str = "https://api.line.me";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub metrics_port: Option<u16>,
    pub sync_interval: Duration,
    pub sheet_id: String,
    pub sheets_base_url: String,
    pub service_account_key: String,
    pub payment: GatewayConfig,
    pub webhook_secret: Option<String>,
    pub messaging_token: Option<String>,
    pub messaging_base_url: String,
    pub cancel_cutoff_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any name → value lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));
        let or = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        Ok(Self {
            bind: or("INNKEEP_BIND", "0.0.0.0"),
            port: parse_or(&get, "INNKEEP_PORT", 8787)?,
            metrics_port: parse_opt(&get, "INNKEEP_METRICS_PORT")?,
            sync_interval: Duration::from_secs(parse_or(&get, "INNKEEP_SYNC_INTERVAL_SECS", 300u64)?.max(1)),
            sheet_id: required("INNKEEP_SHEET_ID")?,
            sheets_base_url: or("INNKEEP_SHEETS_BASE_URL", DEFAULT_SHEETS_BASE_URL),
            service_account_key: required("INNKEEP_SERVICE_ACCOUNT_KEY")?,
            payment: GatewayConfig {
                base_url: or("INNKEEP_PAYMENT_BASE_URL", DEFAULT_PAYMENT_BASE_URL),
                channel_id: or("INNKEEP_PAYMENT_CHANNEL_ID", ""),
                channel_secret: or("INNKEEP_PAYMENT_CHANNEL_SECRET", ""),
                currency: or("INNKEEP_PAYMENT_CURRENCY", "TWD"),
                confirm_url: or("INNKEEP_PAYMENT_CONFIRM_URL", ""),
                cancel_url: or("INNKEEP_PAYMENT_CANCEL_URL", ""),
            },
            webhook_secret: get("INNKEEP_WEBHOOK_SECRET"),
            messaging_token: get("INNKEEP_MESSAGING_TOKEN"),
            messaging_base_url: or("INNKEEP_MESSAGING_BASE_URL", DEFAULT_MESSAGING_BASE_URL),
            cancel_cutoff_days: parse_or(&get, "INNKEEP_CANCEL_CUTOFF_DAYS", DEFAULT_CANCEL_CUTOFF_DAYS)?,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn parse_opt<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    get(name)
        .map(|v| v.trim().parse().map_err(|_| ConfigError::Invalid { name, value: v }))
        .transpose()
}

fn parse_or<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    Ok(parse_opt(get, name)?.unwrap_or(default))
}

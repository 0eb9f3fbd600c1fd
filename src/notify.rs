use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::model::{Booking, format_date};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("messaging API error (status {status}): {message}")]
    Api { status: StatusCode, message: String },
}

/// Outbound message channel to the person who made a booking.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn push(&self, recipient: &str, text: &str) -> Result<(), NotifyError>;
}

/// Push a message, logging instead of failing. The triggering operation has
/// already committed by the time we get here.
pub async fn push_best_effort(notifier: &dyn Notifier, recipient: &str, text: &str) {
    if recipient.is_empty() {
        return;
    }
    if let Err(e) = notifier.push(recipient, text).await {
        warn!(%recipient, error = %e, "notification failed");
        metrics::counter!(crate::observability::NOTIFICATIONS_FAILED_TOTAL).increment(1);
    }
}

pub fn booking_received_text(b: &Booking, room_name: &str) -> String {
    format!(
        "Booking {} received: {} from {} to {}, total {}. Please complete payment to confirm.",
        b.booking_id,
        room_name,
        format_date(b.check_in_date),
        format_date(b.check_out_date),
        b.total_price
    )
}

pub fn booking_confirmed_text(b: &Booking) -> String {
    format!(
        "Payment received. Booking {} is confirmed for {} to {}.",
        b.booking_id,
        format_date(b.check_in_date),
        format_date(b.check_out_date)
    )
}

/// Messaging-platform push API client.
pub struct MessagingClient {
    client: Client,
    base_url: String,
    token: String,
}

impl MessagingClient {
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }
}

#[async_trait]
impl Notifier for MessagingClient {
    async fn push(&self, recipient: &str, text: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(format!("{}/v2/bot/message/push", self.base_url))
            .bearer_auth(&self.token)
            .json(&json!({
                "to": recipient,
                "messages": [{ "type": "text", "text": text }]
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(NotifyError::Api { status, message });
        }
        Ok(())
    }
}

/// Used when no messaging credential is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn push(&self, recipient: &str, text: &str) -> Result<(), NotifyError> {
        info!(%recipient, %text, "notification (messaging disabled)");
        Ok(())
    }
}

/// Keeps every push in memory. Lets tests count deliveries.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.sent().len()
    }

    /// Make every subsequent push fail (after recording the attempt).
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn push(&self, recipient: &str, text: &str) -> Result<(), NotifyError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((recipient.to_string(), text.to_string()));
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Api {
                status: StatusCode::BAD_GATEWAY,
                message: "injected failure".into(),
            });
        }
        Ok(())
    }
}

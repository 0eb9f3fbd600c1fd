//! Payment provider boundary: checkout creation and webhook envelopes.
//!
//! Outbound requests are signed with HMAC-SHA256 over
//! `secret + path + body + nonce`, base64 encoded, the way the provider's
//! v3 API expects. Inbound webhooks may carry a base64 HMAC of the raw body.

use std::sync::Mutex;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};
use sha2::Sha256;
use thiserror::Error;
use tracing::error;

use crate::model::Price;

type HmacSha256 = Hmac<Sha256>;

pub const REQUEST_PATH: &str = "/v3/payments/request";
pub const SUCCESS_CODE: &str = "0000";

pub const CHANNEL_ID_HEADER: &str = "X-LINE-ChannelId";
pub const NONCE_HEADER: &str = "X-LINE-Authorization-Nonce";
pub const SIGNATURE_HEADER: &str = "X-LINE-Authorization";
pub const WEBHOOK_SIGNATURE_HEADER: &str = "X-Payment-Signature";

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("payment API error (status {status}): {message}")]
    Api { status: StatusCode, message: String },
    #[error("payment request declined ({code}): {message}")]
    Declined { code: String, message: String },
    #[error("malformed payment payload: {0}")]
    Malformed(String),
    #[error("unusable signing key: {0}")]
    SigningKey(#[from] hmac::digest::InvalidLength),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub order_id: String,
    pub amount: Price,
    pub product_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub payment_url: String,
    pub transaction_id: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout(&self, req: &CheckoutRequest) -> Result<CheckoutSession, PaymentError>;
}

fn keyed(secret: &str) -> Result<HmacSha256, PaymentError> {
    Ok(HmacSha256::new_from_slice(secret.as_bytes())?)
}

/// `base64(HMAC-SHA256(secret, secret + path + body + nonce))`.
pub fn sign_request(secret: &str, path: &str, body: &str, nonce: &str) -> Result<String, PaymentError> {
    let mut mac = keyed(secret)?;
    mac.update(secret.as_bytes());
    mac.update(path.as_bytes());
    mac.update(body.as_bytes());
    mac.update(nonce.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a webhook body signature.
pub fn verify_webhook_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = BASE64.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = keyed(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

pub fn sign_webhook_body(secret: &str, body: &[u8]) -> Result<String, PaymentError> {
    let mut mac = keyed(secret)?;
    mac.update(body);
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub channel_id: String,
    pub channel_secret: String,
    pub currency: String,
    pub confirm_url: String,
    pub cancel_url: String,
}

pub struct HttpPaymentGateway {
    client: Client,
    config: GatewayConfig,
}

impl HttpPaymentGateway {
    pub fn new(mut config: GatewayConfig) -> Self {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            config,
        }
    }

    fn request_body(&self, req: &CheckoutRequest) -> Value {
        json!({
            "amount": req.amount,
            "currency": self.config.currency,
            "orderId": req.order_id,
            "packages": [{
                "id": req.order_id,
                "amount": req.amount,
                "products": [{ "name": req.product_name, "quantity": 1, "price": req.amount }]
            }],
            "redirectUrls": {
                "confirmUrl": self.config.confirm_url,
                "cancelUrl": self.config.cancel_url
            }
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderResponse {
    return_code: String,
    #[serde(default)]
    return_message: String,
    info: Option<ProviderInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderInfo {
    payment_url: ProviderPaymentUrl,
    #[serde(deserialize_with = "string_or_number")]
    transaction_id: String,
}

#[derive(Deserialize)]
struct ProviderPaymentUrl {
    web: String,
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_checkout(&self, req: &CheckoutRequest) -> Result<CheckoutSession, PaymentError> {
        let body = self.request_body(req).to_string();
        let nonce = ulid::Ulid::new().to_string();
        let signature = sign_request(&self.config.channel_secret, REQUEST_PATH, &body, &nonce)?;

        let response = self
            .client
            .post(format!("{}{}", self.config.base_url, REQUEST_PATH))
            .header("Content-Type", "application/json")
            .header(CHANNEL_ID_HEADER, &self.config.channel_id)
            .header(NONCE_HEADER, &nonce)
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(%status, %message, order_id = %req.order_id, "payment request failed");
            return Err(PaymentError::Api { status, message });
        }

        let parsed: ProviderResponse = response.json().await?;
        if parsed.return_code != SUCCESS_CODE {
            return Err(PaymentError::Declined {
                code: parsed.return_code,
                message: parsed.return_message,
            });
        }
        let info = parsed
            .info
            .ok_or_else(|| PaymentError::Malformed("success response without info".into()))?;
        Ok(CheckoutSession {
            payment_url: info.payment_url.web,
            transaction_id: info.transaction_id,
        })
    }
}

// ── Webhook envelope ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Succeeded,
    Failed { code: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentNotification {
    pub order_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub transaction_id: String,
    pub return_code: String,
}

impl PaymentNotification {
    pub fn parse(body: &[u8]) -> Result<Self, PaymentError> {
        let n: PaymentNotification =
            serde_json::from_slice(body).map_err(|e| PaymentError::Malformed(e.to_string()))?;
        if n.order_id.trim().is_empty() {
            return Err(PaymentError::Malformed("empty orderId".into()));
        }
        Ok(n)
    }

    pub fn outcome(&self) -> PaymentOutcome {
        if self.return_code == SUCCESS_CODE {
            PaymentOutcome::Succeeded
        } else {
            PaymentOutcome::Failed {
                code: self.return_code.clone(),
            }
        }
    }
}

/// Transaction ids are 19-digit integers that some clients send unquoted.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// Gateway that hands out canned sessions; records every request.
#[derive(Default)]
pub struct StaticGateway {
    requests: Mutex<Vec<CheckoutRequest>>,
}

impl StaticGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<CheckoutRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PaymentGateway for StaticGateway {
    async fn create_checkout(&self, req: &CheckoutRequest) -> Result<CheckoutSession, PaymentError> {
        if let Ok(mut r) = self.requests.lock() {
            r.push(req.clone());
        }
        Ok(CheckoutSession {
            payment_url: format!("https://pay.example/checkout/{}", req.order_id),
            transaction_id: format!("tx-{}", req.order_id),
        })
    }
}

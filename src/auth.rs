use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error};

const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh this long before the provider's stated expiry.
const EXPIRY_SLACK: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("service account key is not valid JSON: {0}")]
    InvalidKey(#[from] serde_json::Error),
    #[error("failed to sign credential assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("token exchange rejected (status {status}): {message}")]
    Rejected { status: StatusCode, message: String },
}

/// Source of bearer tokens for the record store.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, AuthError>;
}

/// Fixed token, for tests and pre-minted credentials.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, AuthError> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
    error_description: Option<String>,
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// Mints short-lived access tokens from a service-account key: sign an RS256
/// assertion, exchange it at the token endpoint, cache until near expiry.
pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    pub fn from_json(key_json: &str) -> Result<Self, AuthError> {
        let key: ServiceAccountKey = serde_json::from_str(key_json)?;
        Self::new(key)
    }

    pub fn new(key: ServiceAccountKey) -> Result<Self, AuthError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        Ok(Self {
            key,
            encoding_key,
            client: reqwest::Client::new(),
            cached: Mutex::new(None),
        })
    }

    fn sign_assertion(&self, now: i64) -> Result<String, AuthError> {
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SPREADSHEETS_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        Ok(jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)?)
    }

    async fn exchange(&self) -> Result<CachedToken, AuthError> {
        let assertion = self.sign_assertion(chrono::Utc::now().timestamp())?;
        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body: TokenResponse = response.json().await?;
        match body.access_token {
            Some(token) if status.is_success() => {
                let lifetime = Duration::from_secs(body.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS as u64));
                Ok(CachedToken {
                    token,
                    refresh_at: Instant::now() + lifetime.saturating_sub(EXPIRY_SLACK),
                })
            }
            _ => {
                let message = body
                    .error_description
                    .or(body.error)
                    .unwrap_or_else(|| "no access_token in response".to_string());
                error!(%status, %message, "service credential exchange failed");
                Err(AuthError::Rejected { status, message })
            }
        }
    }
}

#[async_trait]
impl TokenSource for ServiceAccountAuth {
    async fn access_token(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;
        if let Some(c) = cached.as_ref()
            && Instant::now() < c.refresh_at
        {
            return Ok(c.token.clone());
        }
        debug!(client_email = %self.key.client_email, "minting service credential");
        let fresh = self.exchange().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::engine::EngineError;
    use crate::records::{RecordStore, RecordStoreError, SheetsClient};

    const TEST_KEY_PEM: &str = include_str!("../tests/fixtures/service_account_key.pem");

    fn auth(server: &MockServer) -> ServiceAccountAuth {
        ServiceAccountAuth::new(ServiceAccountKey {
            client_email: "svc@inn.iam".into(),
            private_key: TEST_KEY_PEM.into(),
            token_uri: server.url("/token"),
        })
        .unwrap()
    }

    fn token_endpoint(server: &MockServer, expires_in: u64) -> httpmock::Mock<'_> {
        server.mock(|when, then| {
            when.method(POST)
                .path("/token")
                .header("content-type", "application/x-www-form-urlencoded")
                .body_contains("assertion=");
            then.status(200)
                .json_body(json!({ "access_token": "ya29.test", "expires_in": expires_in, "token_type": "Bearer" }));
        })
    }

    #[tokio::test]
    async fn token_is_cached_until_near_expiry() {
        let server = MockServer::start();
        let mock = token_endpoint(&server, 3600);
        let src = auth(&server);

        assert_eq!(src.access_token().await.unwrap(), "ya29.test");
        assert_eq!(src.access_token().await.unwrap(), "ya29.test");
        mock.assert_hits(1);
    }

    #[tokio::test]
    async fn token_inside_expiry_slack_is_refreshed() {
        let server = MockServer::start();
        let mock = token_endpoint(&server, EXPIRY_SLACK.as_secs() / 2);
        let src = auth(&server);

        src.access_token().await.unwrap();
        src.access_token().await.unwrap();
        mock.assert_hits(2);
    }

    #[tokio::test]
    async fn rejected_exchange_surfaces_as_auth_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(400)
                .json_body(json!({ "error": "invalid_grant", "error_description": "Invalid JWT Signature." }));
        });
        let sheets_hit = server.mock(|when, then| {
            when.path_contains("/v4/spreadsheets/");
            then.status(200).json_body(json!({ "valueRanges": [] }));
        });

        let err = auth(&server).access_token().await.unwrap_err();
        match err {
            AuthError::Rejected { status, message } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(message, "Invalid JWT Signature.");
            }
            other => panic!("expected rejection, got {other:?}"),
        }

        let store = SheetsClient::new(server.base_url(), "sheet123".into(), Arc::new(auth(&server)));
        let err = store.get("rooms!A2:I").await.unwrap_err();
        assert!(matches!(err, RecordStoreError::Auth(AuthError::Rejected { .. })));
        let err = EngineError::from(err);
        assert!(err.is_auth_failure());
        assert_eq!(err.code(), "auth_failure");
        sheets_hit.assert_hits(0);
    }

    #[tokio::test]
    async fn static_token_is_returned_verbatim() {
        let src = StaticToken("abc".into());
        assert_eq!(src.access_token().await.unwrap(), "abc");
    }

    #[test]
    fn key_json_must_parse() {
        let result = ServiceAccountAuth::from_json("{not json");
        assert!(matches!(result, Err(AuthError::InvalidKey(_))));
    }

    #[test]
    fn key_must_be_rsa_pem() {
        let json = r#"{"client_email":"svc@example.iam","private_key":"not a pem"}"#;
        let result = ServiceAccountAuth::from_json(json);
        assert!(matches!(result, Err(AuthError::Signing(_))));
    }

    #[test]
    fn token_uri_defaults() {
        let key: ServiceAccountKey =
            serde_json::from_str(r#"{"client_email":"a","private_key":"b"}"#).unwrap();
        assert_eq!(key.token_uri, "https://oauth2.googleapis.com/token");
    }
}

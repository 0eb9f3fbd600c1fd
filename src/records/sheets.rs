use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::error;

use super::{CellRange, RecordStore, RecordStoreError, Rows};
use crate::auth::TokenSource;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchGetResponse {
    #[serde(default)]
    value_ranges: Vec<ValueRange>,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    updates: Option<AppendUpdates>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    updated_range: Option<String>,
}

/// Spreadsheet values API client.
pub struct SheetsClient {
    client: Client,
    base_url: String,
    sheet_id: String,
    tokens: Arc<dyn TokenSource>,
}

impl SheetsClient {
    pub fn new(base_url: String, sheet_id: String, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            sheet_id,
            tokens,
        }
    }

    fn values_url(&self, suffix: &str) -> String {
        format!("{}/v4/spreadsheets/{}/values{}", self.base_url, self.sheet_id, suffix)
    }

    async fn check(response: Response) -> Result<Response, RecordStoreError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        error!(%status, %message, "record store request failed");
        Err(RecordStoreError::Api { status, message })
    }
}

/// Sheets returns strings under the default render option, but numbers and
/// booleans show up when a range is rendered unformatted.
fn cell_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl RecordStore for SheetsClient {
    async fn batch_get(&self, ranges: &[&str]) -> Result<Vec<Rows>, RecordStoreError> {
        let token = self.tokens.access_token().await?;
        let query: Vec<(&str, &str)> = ranges.iter().map(|r| ("ranges", *r)).collect();
        let response = self
            .client
            .get(self.values_url(":batchGet"))
            .bearer_auth(token)
            .query(&query)
            .send()
            .await?;
        let body: BatchGetResponse = Self::check(response).await?.json().await?;

        if body.value_ranges.len() != ranges.len() {
            return Err(RecordStoreError::Malformed(format!(
                "asked for {} ranges, got {}",
                ranges.len(),
                body.value_ranges.len()
            )));
        }
        Ok(body
            .value_ranges
            .into_iter()
            .map(|vr| {
                vr.values
                    .into_iter()
                    .map(|row| row.iter().map(cell_text).collect())
                    .collect()
            })
            .collect())
    }

    async fn append_row(&self, range: &str, row: Vec<String>) -> Result<Option<u32>, RecordStoreError> {
        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .post(self.values_url(&format!("/{range}:append")))
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .json(&json!({ "values": [row] }))
            .send()
            .await?;
        let body: AppendResponse = Self::check(response).await?.json().await?;
        Ok(body
            .updates
            .and_then(|u| u.updated_range)
            .and_then(|r| CellRange::parse(&r))
            .and_then(|r| r.last_row()))
    }

    async fn update_cells(&self, range: &CellRange, values: Vec<String>) -> Result<(), RecordStoreError> {
        let token = self.tokens.access_token().await?;
        let range = range.to_string();
        let response = self
            .client
            .put(self.values_url(&format!("/{range}")))
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "range": range, "values": [values] }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> SheetsClient {
        SheetsClient::new(
            server.base_url(),
            "sheet123".into(),
            Arc::new(StaticToken("tok".into())),
        )
    }

    #[tokio::test]
    async fn batch_get_returns_rows_per_range() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v4/spreadsheets/sheet123/values:batchGet")
                .query_param("ranges", "rooms!A2:I")
                .header("authorization", "Bearer tok");
            then.status(200).json_body(json!({
                "valueRanges": [
                    { "range": "rooms!A2:I3", "values": [["R1", "Twin", "", 1000]] },
                    { "range": "pricing_rules!A2:C" }
                ]
            }));
        });

        let out = client(&server)
            .batch_get(&["rooms!A2:I", "pricing_rules!A2:C"])
            .await
            .unwrap();
        mock.assert();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0][0], vec!["R1", "Twin", "", "1000"]);
        assert!(out[1].is_empty());
    }

    #[tokio::test]
    async fn batch_get_rejects_short_response() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v4/spreadsheets/sheet123/values:batchGet");
            then.status(200).json_body(json!({ "valueRanges": [] }));
        });

        let result = client(&server).batch_get(&["rooms!A2:I"]).await;
        assert!(matches!(result, Err(RecordStoreError::Malformed(_))));
    }

    #[tokio::test]
    async fn append_reports_updated_row() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v4/spreadsheets/sheet123/values/bookings!A:L:append")
                .query_param("valueInputOption", "RAW")
                .json_body(json!({ "values": [["HB-1", "x"]] }));
            then.status(200).json_body(json!({
                "updates": { "updatedRange": "bookings!A14:L14", "updatedRows": 1 }
            }));
        });

        let pos = client(&server)
            .append_row("bookings!A:L", vec!["HB-1".into(), "x".into()])
            .await
            .unwrap();
        mock.assert();
        assert_eq!(pos, Some(14));
    }

    #[tokio::test]
    async fn update_puts_only_target_cells() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PUT)
                .path("/v4/spreadsheets/sheet123/values/bookings!K7:L7")
                .json_body(json!({ "range": "bookings!K7:L7", "values": [["CONFIRMED", "tx-9"]] }));
            then.status(200).json_body(json!({ "updatedCells": 2 }));
        });

        client(&server)
            .update_cells(
                &CellRange::row_span("bookings", 10, 11, 7),
                vec!["CONFIRMED".into(), "tx-9".into()],
            )
            .await
            .unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn api_error_surfaces_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v4/spreadsheets/sheet123/values:batchGet");
            then.status(403).body("PERMISSION_DENIED");
        });

        let result = client(&server).batch_get(&["rooms!A2:I"]).await;
        match result {
            Err(RecordStoreError::Api { status, message }) => {
                assert_eq!(status, reqwest::StatusCode::FORBIDDEN);
                assert_eq!(message, "PERMISSION_DENIED");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }
}

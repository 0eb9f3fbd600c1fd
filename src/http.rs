//! JSON API over the engine.
//!
//! Endpoints, all under `/api` except the probe:
//! - `GET  /health`
//! - `GET  /api/rooms`: active rooms from the cache
//! - `GET  /api/availability?roomId&startDate&endDate`
//! - `GET  /api/calculate-price?roomId&startDate&endDate`
//! - `POST /api/bookings`
//! - `POST /api/bookings/cancel`
//! - `GET  /api/my-bookings?requesterIdentity`
//! - `POST /api/payment/create`
//! - `POST /api/payment/webhook`: provider callback, always acknowledged
//! - `GET  /api/sync`: manual cache refresh

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, MatchedPath, Query, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::engine::{Engine, EngineError, NewBooking, PolicyViolation, validate_range};
use crate::limits::MAX_WEBHOOK_BODY;
use crate::model::{Price, Room};
use crate::notify::{booking_received_text, push_best_effort};
use crate::observability;
use crate::payment::{WEBHOOK_SIGNATURE_HEADER, verify_webhook_signature};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    /// When set, webhook bodies must carry a matching HMAC signature.
    pub webhook_secret: Option<Arc<str>>,
}

/// Build the axum router (separated for testing).
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/rooms", get(list_rooms))
        .route("/availability", get(availability))
        .route("/calculate-price", get(calculate_price))
        .route("/bookings", post(create_booking))
        .route("/bookings/cancel", post(cancel_booking))
        .route("/my-bookings", get(my_bookings))
        .route("/payment/create", post(create_payment))
        .route("/payment/webhook", post(payment_webhook))
        .route("/sync", get(sync).post(sync));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .route_layer(middleware::from_fn(track_requests))
        .layer(DefaultBodyLimit::max(MAX_WEBHOOK_BODY))
        .with_state(state)
}

async fn track_requests(req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let started = Instant::now();
    let response = next.run(req).await;
    let status = response.status().as_u16().to_string();
    metrics::histogram!(observability::HTTP_REQUEST_DURATION_SECONDS, "route" => route.clone())
        .record(started.elapsed().as_secs_f64());
    metrics::counter!(observability::HTTP_REQUESTS_TOTAL, "route" => route, "status" => status).increment(1);
    response
}

// ── Errors ───────────────────────────────────────────────────────

/// Engine error rendered as an HTTP response. Collaborator failures are
/// logged here and reach the client only as a generic 500.
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError(e)
    }
}

pub fn status_for(e: &EngineError) -> StatusCode {
    match e {
        EngineError::Validation(_) => StatusCode::BAD_REQUEST,
        EngineError::RoomNotFound(_) | EngineError::BookingNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::CapacityConflict { .. } => StatusCode::CONFLICT,
        EngineError::Policy(PolicyViolation::NotOwner) => StatusCode::FORBIDDEN,
        EngineError::Policy(_) => StatusCode::CONFLICT,
        EngineError::CacheUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if self.0.is_internal() {
            error!(error = %self.0, code = self.0.code(), "request failed upstream");
            return (status, Json(json!({ "error": "internal error" }))).into_response();
        }
        let body = json!({ "error": self.0.to_string(), "code": self.0.code() });
        (status, Json(body)).into_response()
    }
}

fn bad_json(e: JsonRejection) -> ApiError {
    ApiError(EngineError::validation(e.body_text()))
}

fn bad_query(e: QueryRejection) -> ApiError {
    ApiError(EngineError::validation(e.body_text()))
}

fn require<'a>(field: &str, value: &'a Option<String>) -> Result<&'a str, ApiError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(EngineError::validation(format!("missing {field}")).into()),
    }
}

// ── Handlers ─────────────────────────────────────────────────────

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn list_rooms(State(state): State<AppState>) -> Result<Json<Vec<Room>>, ApiError> {
    Ok(Json(state.engine.rooms()?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RangeQuery {
    room_id: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
}

async fn availability(
    State(state): State<AppState>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(q) = query.map_err(bad_query)?;
    let room_id = require("roomId", &q.room_id)?;
    let range = validate_range(require("startDate", &q.start_date)?, require("endDate", &q.end_date)?)?;
    match state.engine.availability(room_id, range).await {
        Ok(info) => Ok(Json(info).into_response()),
        Err(e @ EngineError::RoomNotFound(_)) => {
            let body = json!({
                "error": e.to_string(),
                "code": e.code(),
                "roomId": room_id,
                "availableCount": 0,
            });
            Ok((StatusCode::NOT_FOUND, Json(body)).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

async fn calculate_price(
    State(state): State<AppState>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(q) = query.map_err(bad_query)?;
    let room_id = require("roomId", &q.room_id)?;
    let range = validate_range(require("startDate", &q.start_date)?, require("endDate", &q.end_date)?)?;
    Ok(Json(state.engine.price(room_id, range)?).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookingBody {
    #[serde(default, alias = "lineUserId")]
    requester_identity: String,
    #[serde(default, alias = "lineDisplayName")]
    display_name: String,
    #[serde(default)]
    room_id: String,
    #[serde(default)]
    check_in_date: String,
    #[serde(default)]
    check_out_date: String,
    #[serde(default)]
    guest_name: String,
    #[serde(default)]
    guest_phone: String,
    total_price: Option<Price>,
}

async fn create_booking(
    State(state): State<AppState>,
    body: Result<Json<BookingBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(bad_json)?;
    let created = state
        .engine
        .create_booking(NewBooking {
            requester_identity: body.requester_identity,
            display_name: body.display_name,
            room_id: body.room_id,
            check_in: body.check_in_date,
            check_out: body.check_out_date,
            guest_name: body.guest_name,
            guest_phone: body.guest_phone,
            client_total: body.total_price,
        })
        .await?;

    let b = &created.booking;
    push_best_effort(
        state.engine.notifier.as_ref(),
        &b.requester_identity,
        &booking_received_text(b, &created.room_name),
    )
    .await;

    let body = json!({
        "success": true,
        "bookingId": b.booking_id,
        "status": b.status,
        "roomId": b.room_id,
        "roomName": created.room_name,
        "checkInDate": b.check_in_date,
        "checkOutDate": b.check_out_date,
        "totalPrice": b.total_price,
    });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelBody {
    booking_id: Option<String>,
    #[serde(alias = "lineUserId")]
    requester_identity: Option<String>,
}

async fn cancel_booking(
    State(state): State<AppState>,
    body: Result<Json<CancelBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.map_err(bad_json)?;
    let booking_id = require("bookingId", &body.booking_id)?;
    let requester = require("requesterIdentity", &body.requester_identity)?;
    let booking = state.engine.cancel(booking_id, requester).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Booking cancelled successfully",
        "bookingId": booking.booking_id,
        "status": booking.status,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequesterQuery {
    #[serde(alias = "lineUserId")]
    requester_identity: Option<String>,
}

async fn my_bookings(
    State(state): State<AppState>,
    query: Result<Query<RequesterQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(q) = query.map_err(bad_query)?;
    let requester = require("requesterIdentity", &q.requester_identity)?;
    Ok(Json(state.engine.bookings_for(requester).await?).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentBody {
    booking_id: Option<String>,
}

async fn create_payment(
    State(state): State<AppState>,
    body: Result<Json<PaymentBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.map_err(bad_json)?;
    let booking_id = require("bookingId", &body.booking_id)?;
    let session = state.engine.create_payment(booking_id).await?;
    Ok(Json(json!({
        "bookingId": booking_id,
        "paymentUrl": session.payment_url,
        "transactionId": session.transaction_id,
    })))
}

/// Provider callback. A signature mismatch is the only non-2xx answer;
/// everything else, including notifications we can't use, is acknowledged
/// so the provider stops retrying.
async fn payment_webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if let Some(secret) = state.webhook_secret.as_deref() {
        let signature = headers
            .get(WEBHOOK_SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !verify_webhook_signature(secret, &body, signature) {
            warn!(bytes = body.len(), "rejecting payment webhook with bad signature");
            metrics::counter!(observability::WEBHOOKS_TOTAL, "outcome" => "bad_signature").increment(1);
            return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "invalid signature" }))).into_response();
        }
    }
    let outcome = state.engine.reconcile(&body).await;
    Json(json!({ "received": true, "outcome": outcome })).into_response()
}

async fn sync(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let report = state.engine.sync().await?;
    info!(?report, "manual sync requested");
    Ok(Json(json!({
        "success": true,
        "message": "Manual sync completed successfully!",
        "report": report,
    })))
}

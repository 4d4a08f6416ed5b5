use axum::extract::{Path, Query, State};
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::cache::{CacheUpdate, WebhookEvent};
use crate::credentials::EQUIPMENT_TYPES;
use crate::envelope::{timestamp, ErrorEnvelope, RelaySuccess, SuccessResponse};
use crate::server::AppState;
use crate::validation::{validate_cancel, validate_reschedule, ValidationErrors};

const SERVICE_NAME: &str = "Cal.com Integration API";

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl IntoResponse for ErrorEnvelope {
    fn into_response(self) -> Response {
        (status_code(self.status), Json(self)).into_response()
    }
}

fn relayed(message: &'static str, outcome: Result<RelaySuccess, ErrorEnvelope>) -> Response {
    match outcome {
        Ok(success) => (
            status_code(success.status),
            Json(SuccessResponse::new(message, success.data)),
        )
            .into_response(),
        Err(envelope) => envelope.into_response(),
    }
}

fn validation_failed(errors: ValidationErrors) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "success": false,
            "error": {
                "message": "Validation failed",
                "details": errors.into_details(),
            },
            "timestamp": timestamp(),
        })),
    )
        .into_response()
}

fn internal_error(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "success": false,
            "error": {
                "message": message,
                "timestamp": timestamp(),
            },
        })),
    )
        .into_response()
}

// Validators work on the raw JSON so that type errors are reported per field
fn parse_body(body: &Bytes) -> Result<Value, Response> {
    serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "Request body is not valid JSON");
        let mut errors = ValidationErrors::default();
        errors.push("Request body must be valid JSON");
        validation_failed(errors)
    })
}

pub(crate) async fn root_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "message": "Cal.com Integration API Server",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "GET /health",
            "bookings": "GET /bookings",
            "booking": "GET /api/bookings/{uid}?equipmentType=TYPE",
            "reschedule": "POST /reschedule",
            "cancel": "POST /cancel",
            "webhook": "POST /webhook/calcom",
            "cachedBookings": "GET /webhook/bookings"
        },
        "supportedEquipment": EQUIPMENT_TYPES,
        "configuredEquipment": state.relay.equipment_types(),
    }))
}

pub(crate) async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "OK",
        "timestamp": timestamp(),
        "service": SERVICE_NAME,
    }))
}

pub(crate) async fn bookings_handler(State(state): State<AppState>) -> Response {
    info!("Fetching upcoming bookings for all equipment types");

    match state.relay.upcoming_bookings(Utc::now()).await {
        Ok(upcoming) => Json(json!({
            "success": true,
            "data": upcoming,
            "timestamp": timestamp(),
        }))
        .into_response(),
        Err(envelope) => envelope.into_response(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BookingQuery {
    equipment_type: Option<String>,
}

pub(crate) async fn booking_handler(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Query(query): Query<BookingQuery>,
) -> Response {
    let outcome = state
        .relay
        .get_booking(&uid, query.equipment_type.as_deref())
        .await;
    relayed("Booking retrieved successfully", outcome)
}

pub(crate) async fn reschedule_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let body = match parse_body(&body) {
        Ok(body) => body,
        Err(response) => return response,
    };

    let request = match validate_reschedule(&body, Utc::now()) {
        Ok(request) => request,
        Err(errors) => {
            warn!(errors = %errors, "Reschedule request validation failed");
            return validation_failed(errors);
        }
    };

    info!(
        booking_uid = %request.booking_uid,
        rescheduled_by = %request.rescheduled_by,
        "Processing reschedule request"
    );
    let outcome = state.relay.reschedule_booking(&request).await;
    relayed("Booking rescheduled successfully", outcome)
}

pub(crate) async fn cancel_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let body = match parse_body(&body) {
        Ok(body) => body,
        Err(response) => return response,
    };

    let request = match validate_cancel(&body) {
        Ok(request) => request,
        Err(errors) => {
            warn!(errors = %errors, "Cancel request validation failed");
            return validation_failed(errors);
        }
    };

    info!(booking_uid = %request.booking_uid, "Processing cancel request");
    let outcome = state.relay.cancel_booking(&request).await;
    relayed("Booking cancelled successfully", outcome)
}

pub(crate) async fn webhook_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let event = match WebhookEvent::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "Webhook error");
            return internal_error("Internal server error");
        }
    };

    let trigger = event.trigger.clone();
    let uid = event.uid.clone();
    match state.cache.apply(event) {
        CacheUpdate::Dropped => {
            info!(?trigger, ?uid, "Webhook event for unknown booking dropped");
        }
        update => {
            info!(?trigger, ?uid, ?update, "Webhook received");
        }
    }

    Json(json!({ "received": true })).into_response()
}

pub(crate) async fn cached_bookings_handler(State(state): State<AppState>) -> impl IntoResponse {
    let bookings = state.cache.snapshot();
    Json(json!({
        "success": true,
        "data": {
            "totalCount": bookings.len(),
            "bookings": bookings,
        },
        "timestamp": timestamp(),
    }))
}

pub(crate) async fn not_found_handler(method: Method, uri: Uri) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "error": {
                "message": "Endpoint not found",
                "path": uri.to_string(),
                "method": method.as_str(),
            },
        })),
    )
        .into_response()
}

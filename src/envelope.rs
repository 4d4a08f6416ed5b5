// Uniform response shapes for everything the relay sends back to its callers

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::RelayError;

pub const UNREACHABLE_MESSAGE: &str =
    "Unable to connect to Cal.com API. Please check your internet connection and try again";
pub const UNREACHABLE_DETAILS: &str = "Network timeout or connection refused";
pub const UNEXPECTED_MESSAGE: &str = "Unexpected error occurred while processing the request";
pub const NO_DETAILS: &str = "No additional details available";

/// ISO-8601 UTC timestamp with millisecond precision, e.g. `2026-10-16T09:30:00.000Z`.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Reschedule,
    Cancel,
    Fetch,
    List,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Reschedule => "reschedule",
            Operation::Cancel => "cancel",
            Operation::Fetch => "fetch",
            Operation::List => "list",
        }
    }
}

/// Fixed message table for upstream HTTP failures.
pub fn upstream_error_message(status: u16) -> String {
    match status {
        400 => "Invalid request data provided to Cal.com API".to_string(),
        401 => "Unauthorized: Invalid or expired API key".to_string(),
        403 => "Forbidden: Insufficient permissions for this operation".to_string(),
        404 => "Booking not found or already processed".to_string(),
        429 => "Rate limit exceeded. Please try again later".to_string(),
        500 => "Cal.com API server error. Please try again later".to_string(),
        other => format!("Cal.com API error: {other}"),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub details: Value,
}

// {success:false, operation, status, error:{message, details}, timestamp}
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub operation: Operation,
    pub status: u16,
    pub error: ErrorBody,
    pub timestamp: String,
}

impl ErrorEnvelope {
    pub fn new(operation: Operation, status: u16, message: impl Into<String>, details: Value) -> Self {
        Self {
            success: false,
            operation,
            status,
            error: ErrorBody {
                message: message.into(),
                details,
            },
            timestamp: timestamp(),
        }
    }

    pub fn from_error(err: &RelayError, operation: Operation) -> Self {
        match err {
            RelayError::UnknownEquipment { valid_types, .. } => Self::new(
                operation,
                400,
                err.to_string(),
                json!({ "validTypes": valid_types }),
            ),
            RelayError::NotConfigured => {
                Self::new(operation, 500, err.to_string(), Value::String(NO_DETAILS.into()))
            }
            RelayError::Upstream { status, body } => Self::new(
                operation,
                *status,
                upstream_error_message(*status),
                body.clone()
                    .unwrap_or_else(|| Value::String(NO_DETAILS.to_string())),
            ),
            RelayError::Unreachable(_) => Self::new(
                operation,
                503,
                UNREACHABLE_MESSAGE,
                Value::String(UNREACHABLE_DETAILS.to_string()),
            ),
            RelayError::Internal(message) => Self::new(
                operation,
                500,
                UNEXPECTED_MESSAGE,
                Value::String(message.clone()),
            ),
        }
    }
}

// What the relay hands back on any 2xx from upstream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelaySuccess {
    pub success: bool,
    pub data: Value,
    pub status: u16,
}

impl RelaySuccess {
    pub fn new(status: u16, data: Value) -> Self {
        Self {
            success: true,
            data,
            status,
        }
    }
}

// Body of a 2xx reply from one of the relay endpoints
#[derive(Debug, Clone, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: &'static str,
    pub data: Value,
    pub timestamp: String,
}

impl SuccessResponse {
    pub fn new(message: &'static str, data: Value) -> Self {
        Self {
            success: true,
            message,
            data,
            timestamp: timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_statuses_use_fixed_messages() {
        let table = [
            (400, "Invalid request data provided to Cal.com API"),
            (401, "Unauthorized: Invalid or expired API key"),
            (403, "Forbidden: Insufficient permissions for this operation"),
            (404, "Booking not found or already processed"),
            (429, "Rate limit exceeded. Please try again later"),
            (500, "Cal.com API server error. Please try again later"),
        ];
        for (status, message) in table {
            assert_eq!(upstream_error_message(status), message);
        }
    }

    #[test]
    fn other_statuses_fall_back_to_generic_message() {
        assert_eq!(upstream_error_message(418), "Cal.com API error: 418");
        assert_eq!(upstream_error_message(502), "Cal.com API error: 502");
        assert_eq!(upstream_error_message(422), "Cal.com API error: 422");
    }

    #[test]
    fn upstream_error_keeps_status_and_body() {
        let err = RelayError::Upstream {
            status: 404,
            body: Some(json!({ "message": "booking missing" })),
        };
        let envelope = ErrorEnvelope::from_error(&err, Operation::Cancel);

        assert!(!envelope.success);
        assert_eq!(envelope.status, 404);
        assert_eq!(envelope.error.message, "Booking not found or already processed");
        assert_eq!(envelope.error.details["message"], "booking missing");
    }

    #[test]
    fn upstream_error_without_body_says_so() {
        let err = RelayError::Upstream {
            status: 502,
            body: None,
        };
        let envelope = ErrorEnvelope::from_error(&err, Operation::Fetch);
        assert_eq!(envelope.error.details, Value::String(NO_DETAILS.to_string()));
    }

    #[test]
    fn unreachable_maps_to_503() {
        let err = RelayError::Unreachable("connection refused".to_string());
        let envelope = ErrorEnvelope::from_error(&err, Operation::Reschedule);

        assert_eq!(envelope.status, 503);
        assert_eq!(envelope.error.message, UNREACHABLE_MESSAGE);
        assert_eq!(envelope.error.details, UNREACHABLE_DETAILS);
    }

    #[test]
    fn internal_maps_to_500_with_cause() {
        let err = RelayError::Internal("builder error: bad url".to_string());
        let envelope = ErrorEnvelope::from_error(&err, Operation::Cancel);

        assert_eq!(envelope.status, 500);
        assert_eq!(envelope.error.message, UNEXPECTED_MESSAGE);
        assert_eq!(envelope.error.details, "builder error: bad url");
    }

    #[test]
    fn unknown_equipment_is_a_bad_request() {
        let err = RelayError::UnknownEquipment {
            equipment: "DRONE".to_string(),
            valid_types: vec!["PROJECTOR".to_string(), "SPEAKER".to_string()],
        };
        let envelope = ErrorEnvelope::from_error(&err, Operation::Reschedule);

        assert_eq!(envelope.status, 400);
        assert_eq!(envelope.error.message, "No credential for equipment type: DRONE");
        assert_eq!(envelope.error.details["validTypes"][1], "SPEAKER");
    }

    #[test]
    fn envelope_serializes_operation_in_lowercase() {
        let envelope = ErrorEnvelope::new(Operation::Reschedule, 400, "bad", Value::Null);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["operation"], "reschedule");
        assert_eq!(json["success"], false);
        assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));
    }
}

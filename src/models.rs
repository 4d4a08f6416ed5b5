// Request and response types shared by the validators, the upstream client and the relay service

use serde::{Deserialize, Serialize};
use serde_json::Value;

// Body forwarded to the upstream reschedule endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleRequest {
    pub booking_uid: String,
    pub start_time: String,
    pub end_time: String,
    pub rescheduled_by: String,
    pub rescheduling_reason: String,
    #[serde(skip)]
    pub equipment_type: Option<String>,
}

// Body forwarded to the upstream cancel endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub booking_uid: String,
    pub cancellation_reason: String,
    #[serde(skip)]
    pub equipment_type: Option<String>,
}

// A 2xx answer from upstream, body already decoded
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamReply {
    pub status: u16,
    pub body: Value,
}

/// One upcoming booking as returned by `GET /bookings`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingSummary {
    pub uid: String,
    pub equipment_type: String,
    pub start_time: String,
    pub end_time: String,
    pub attendee_email: String,
    pub title: String,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingBookings {
    pub bookings: Vec<BookingSummary>,
    pub total_count: usize,
    pub equipment_types: Vec<String>,
}

// Booking relay service: picks the upstream credential for the requested
// equipment, calls Cal.com once and folds every outcome into the success or
// error envelope. No retries.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::calcom::SchedulingApi;
use crate::credentials::{ApiKey, CredentialTable};
use crate::envelope::{ErrorEnvelope, Operation, RelaySuccess};
use crate::error::RelayError;
use crate::models::{BookingSummary, CancelRequest, RescheduleRequest, UpcomingBookings, UpstreamReply};
use crate::validation::parse_date_time;

const DEFAULT_ATTENDEE_EMAIL: &str = "No email";
const DEFAULT_TITLE: &str = "Equipment Booking";
const FALLBACK_SOURCE: &str = "DEFAULT";

pub struct BookingRelay {
    api: Arc<dyn SchedulingApi>,
    credentials: CredentialTable,
}

impl BookingRelay {
    pub fn new(api: Arc<dyn SchedulingApi>, credentials: CredentialTable) -> Self {
        Self { api, credentials }
    }

    pub fn equipment_types(&self) -> Vec<String> {
        self.credentials.equipment_types()
    }

    fn settle(
        operation: Operation,
        booking_uid: &str,
        outcome: Result<UpstreamReply, RelayError>,
    ) -> Result<RelaySuccess, ErrorEnvelope> {
        match outcome {
            Ok(reply) => {
                info!(
                    operation = operation.as_str(),
                    booking_uid,
                    status = reply.status,
                    "Cal.com call succeeded"
                );
                Ok(RelaySuccess::new(reply.status, reply.body))
            }
            Err(err) => {
                error!(
                    operation = operation.as_str(),
                    booking_uid,
                    error = %err,
                    "Cal.com call failed"
                );
                Err(ErrorEnvelope::from_error(&err, operation))
            }
        }
    }

    pub async fn reschedule_booking(
        &self,
        request: &RescheduleRequest,
    ) -> Result<RelaySuccess, ErrorEnvelope> {
        info!(
            booking_uid = %request.booking_uid,
            start_time = %request.start_time,
            end_time = %request.end_time,
            equipment_type = ?request.equipment_type,
            "Attempting to reschedule booking"
        );

        let outcome = match self.credentials.resolve(request.equipment_type.as_deref()) {
            Ok(key) => self.api.reschedule(key, request).await,
            Err(err) => Err(err),
        };
        Self::settle(Operation::Reschedule, &request.booking_uid, outcome)
    }

    pub async fn cancel_booking(&self, request: &CancelRequest) -> Result<RelaySuccess, ErrorEnvelope> {
        info!(
            booking_uid = %request.booking_uid,
            equipment_type = ?request.equipment_type,
            "Attempting to cancel booking"
        );

        let outcome = match self.credentials.resolve(request.equipment_type.as_deref()) {
            Ok(key) => self.api.cancel(key, request).await,
            Err(err) => Err(err),
        };
        Self::settle(Operation::Cancel, &request.booking_uid, outcome)
    }

    pub async fn get_booking(
        &self,
        booking_uid: &str,
        equipment_type: Option<&str>,
    ) -> Result<RelaySuccess, ErrorEnvelope> {
        info!(booking_uid, equipment_type = ?equipment_type, "Fetching booking details");

        let outcome = match self.credentials.resolve(equipment_type) {
            Ok(key) => self.api.get_booking(key, booking_uid).await,
            Err(err) => Err(err),
        };
        Self::settle(Operation::Fetch, booking_uid, outcome)
    }

    /// Upcoming bookings across every configured equipment type. An equipment
    /// type whose fetch fails is logged and skipped.
    pub async fn upcoming_bookings(
        &self,
        now: DateTime<Utc>,
    ) -> Result<UpcomingBookings, ErrorEnvelope> {
        if self.credentials.is_empty() {
            return Err(ErrorEnvelope::from_error(
                &RelayError::NotConfigured,
                Operation::List,
            ));
        }

        // Only CAL_API_KEY configured: list with that single key
        let mut sources: Vec<(&str, &ApiKey)> = self.credentials.iter().collect();
        if sources.is_empty() {
            if let Some(key) = self.credentials.fallback() {
                sources.push((FALLBACK_SOURCE, key));
            }
        }

        let fetches = sources.into_iter().map(|(equipment_type, key)| async move {
            (equipment_type, self.api.list_bookings(key).await)
        });

        let mut upcoming: Vec<(DateTime<Utc>, BookingSummary)> = Vec::new();
        for (equipment_type, outcome) in join_all(fetches).await {
            match outcome {
                Ok(reply) => upcoming.extend(upcoming_from_reply(equipment_type, &reply.body, now)),
                Err(err) => {
                    warn!(equipment_type, error = %err, "Failed to fetch bookings, skipping equipment");
                }
            }
        }

        upcoming.sort_by(|(a, _), (b, _)| a.cmp(b));
        let bookings: Vec<BookingSummary> = upcoming.into_iter().map(|(_, booking)| booking).collect();

        Ok(UpcomingBookings {
            total_count: bookings.len(),
            bookings,
            equipment_types: self.equipment_types(),
        })
    }
}

// v1 answers {bookings:[...]}, v2 answers {data:[...]}
fn upcoming_from_reply(
    equipment_type: &str,
    body: &Value,
    now: DateTime<Utc>,
) -> Vec<(DateTime<Utc>, BookingSummary)> {
    let Some(list) = body
        .get("bookings")
        .or_else(|| body.get("data"))
        .and_then(Value::as_array)
    else {
        warn!(equipment_type, "Unexpected bookings response shape");
        return Vec::new();
    };

    list.iter()
        .filter_map(|booking| {
            let uid = booking.get("uid").and_then(Value::as_str)?;
            let start_raw = booking.get("startTime").and_then(Value::as_str)?;
            let start = parse_date_time(start_raw).filter(|start| *start > now)?;

            let summary = BookingSummary {
                uid: uid.to_string(),
                equipment_type: equipment_type.to_string(),
                start_time: start_raw.to_string(),
                end_time: booking
                    .get("endTime")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                attendee_email: booking
                    .get("attendees")
                    .and_then(|attendees| attendees.get(0))
                    .and_then(|attendee| attendee.get("email"))
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_ATTENDEE_EMAIL)
                    .to_string(),
                title: booking
                    .get("title")
                    .and_then(Value::as_str)
                    .filter(|title| !title.is_empty())
                    .unwrap_or(DEFAULT_TITLE)
                    .to_string(),
                status: booking
                    .get("status")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            };
            Some((start, summary))
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::mock_api::{MockReply, MockSchedulingApi};
    use super::*;
    use crate::envelope::{UNREACHABLE_DETAILS, UNREACHABLE_MESSAGE};
    use chrono::TimeZone;
    use serde_json::json;

    fn credentials() -> CredentialTable {
        CredentialTable::new()
            .with_equipment("PROJECTOR", "key-projector")
            .with_equipment("SPEAKER", "key-speaker")
            .with_equipment("LOGITECH1", "key-logitech1")
    }

    fn relay(api: Arc<MockSchedulingApi>) -> BookingRelay {
        BookingRelay::new(api, credentials())
    }

    fn reschedule(equipment_type: Option<&str>) -> RescheduleRequest {
        RescheduleRequest {
            booking_uid: "bk_1".to_string(),
            start_time: "2030-01-01T10:00:00Z".to_string(),
            end_time: "2030-01-01T11:00:00Z".to_string(),
            rescheduled_by: "ops@example.com".to_string(),
            rescheduling_reason: "Moved".to_string(),
            equipment_type: equipment_type.map(str::to_string),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn selects_credential_by_equipment_type() {
        let api = Arc::new(MockSchedulingApi::new());
        let relay = relay(api.clone());

        let success = relay.reschedule_booking(&reschedule(Some("speaker"))).await.unwrap();
        assert!(success.success);
        assert_eq!(success.status, 200);
        assert_eq!(api.keys_seen().await, vec!["key-speaker"]);
    }

    #[tokio::test]
    async fn mirrors_upstream_success_status() {
        let api = Arc::new(MockSchedulingApi::new());
        api.set_reply("cancel", "key-projector", MockReply::Ok(201, json!({ "id": 7 })))
            .await;

        let request = CancelRequest {
            booking_uid: "bk_1".to_string(),
            cancellation_reason: "Not needed".to_string(),
            equipment_type: Some("PROJECTOR".to_string()),
        };
        let success = relay(api).cancel_booking(&request).await.unwrap();
        assert_eq!(success.status, 201);
        assert_eq!(success.data["id"], 7);
    }

    #[tokio::test]
    async fn unknown_equipment_never_reaches_upstream() {
        let api = Arc::new(MockSchedulingApi::new());
        let envelope = relay(api.clone())
            .reschedule_booking(&reschedule(Some("hologram")))
            .await
            .unwrap_err();

        assert_eq!(envelope.status, 400);
        assert_eq!(envelope.operation, Operation::Reschedule);
        assert_eq!(envelope.error.message, "No credential for equipment type: HOLOGRAM");
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn missing_equipment_without_fallback_is_rejected() {
        let api = Arc::new(MockSchedulingApi::new());
        let envelope = relay(api.clone())
            .reschedule_booking(&reschedule(None))
            .await
            .unwrap_err();
        assert_eq!(envelope.status, 400);
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn missing_equipment_uses_fallback_key() {
        let api = Arc::new(MockSchedulingApi::new());
        let relay = BookingRelay::new(api.clone(), credentials().with_fallback("key-default"));
        relay.reschedule_booking(&reschedule(None)).await.unwrap();
        assert_eq!(api.keys_seen().await, vec!["key-default"]);
    }

    #[tokio::test]
    async fn upstream_statuses_map_to_fixed_messages() {
        let cases = [
            (400, "Invalid request data provided to Cal.com API"),
            (401, "Unauthorized: Invalid or expired API key"),
            (403, "Forbidden: Insufficient permissions for this operation"),
            (404, "Booking not found or already processed"),
            (429, "Rate limit exceeded. Please try again later"),
            (500, "Cal.com API server error. Please try again later"),
            (503, "Cal.com API error: 503"),
            (409, "Cal.com API error: 409"),
        ];

        for (status, message) in cases {
            let api = Arc::new(MockSchedulingApi::new());
            api.set_reply("get", "key-projector", MockReply::Status(status, None))
                .await;

            let envelope = relay(api)
                .get_booking("bk_1", Some("PROJECTOR"))
                .await
                .unwrap_err();
            assert_eq!(envelope.status, status);
            assert_eq!(envelope.error.message, message);
            assert_eq!(envelope.operation, Operation::Fetch);
        }
    }

    #[tokio::test]
    async fn unreachable_upstream_is_503() {
        let api = Arc::new(MockSchedulingApi::new());
        api.set_reply("reschedule", "key-projector", MockReply::Unreachable)
            .await;

        let envelope = relay(api.clone())
            .reschedule_booking(&reschedule(Some("PROJECTOR")))
            .await
            .unwrap_err();
        assert_eq!(envelope.status, 503);
        assert_eq!(envelope.error.message, UNREACHABLE_MESSAGE);
        assert_eq!(envelope.error.details, UNREACHABLE_DETAILS);
        // reported once, not retried
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn other_failures_are_500_with_cause() {
        let api = Arc::new(MockSchedulingApi::new());
        api.set_reply("cancel", "key-speaker", MockReply::Internal("bad header".to_string()))
            .await;

        let request = CancelRequest {
            booking_uid: "bk_1".to_string(),
            cancellation_reason: "Not needed".to_string(),
            equipment_type: Some("SPEAKER".to_string()),
        };
        let envelope = relay(api).cancel_booking(&request).await.unwrap_err();
        assert_eq!(envelope.status, 500);
        assert_eq!(envelope.error.details, "bad header");
    }

    #[tokio::test]
    async fn upcoming_bookings_filters_sorts_and_skips_failures() {
        let api = Arc::new(MockSchedulingApi::new());
        api.set_reply(
            "list",
            "key-projector",
            MockReply::Ok(
                200,
                json!({ "bookings": [
                    { "uid": "p-late", "startTime": "2026-11-02T09:00:00Z", "endTime": "2026-11-02T10:00:00Z",
                      "title": "Board meeting", "status": "ACCEPTED",
                      "attendees": [{ "email": "ceo@example.com" }] },
                    { "uid": "p-past", "startTime": "2026-10-01T09:00:00Z", "endTime": "2026-10-01T10:00:00Z" }
                ]}),
            ),
        )
        .await;
        api.set_reply(
            "list",
            "key-speaker",
            MockReply::Ok(
                200,
                json!({ "data": [
                    { "uid": "s-early", "startTime": "2026-10-17T09:00:00Z", "endTime": "2026-10-17T10:00:00Z" }
                ]}),
            ),
        )
        .await;
        api.set_reply("list", "key-logitech1", MockReply::Unreachable)
            .await;

        let upcoming = relay(api).upcoming_bookings(now()).await.unwrap();

        let uids: Vec<&str> = upcoming.bookings.iter().map(|b| b.uid.as_str()).collect();
        assert_eq!(uids, vec!["s-early", "p-late"]);
        assert_eq!(upcoming.total_count, 2);
        assert_eq!(upcoming.equipment_types, vec!["LOGITECH1", "PROJECTOR", "SPEAKER"]);

        let early = &upcoming.bookings[0];
        assert_eq!(early.equipment_type, "SPEAKER");
        assert_eq!(early.attendee_email, "No email");
        assert_eq!(early.title, "Equipment Booking");

        let late = &upcoming.bookings[1];
        assert_eq!(late.attendee_email, "ceo@example.com");
        assert_eq!(late.status.as_deref(), Some("ACCEPTED"));
    }

    #[tokio::test]
    async fn upcoming_bookings_without_credentials_is_a_config_error() {
        let api = Arc::new(MockSchedulingApi::new());
        let relay = BookingRelay::new(api, CredentialTable::new());
        let envelope = relay.upcoming_bookings(now()).await.unwrap_err();
        assert_eq!(envelope.status, 500);
        assert_eq!(
            envelope.error.message,
            "Server configuration error: API key not configured"
        );
    }

    #[tokio::test]
    async fn upcoming_bookings_with_only_fallback_key() {
        let api = Arc::new(MockSchedulingApi::new());
        api.set_reply(
            "list",
            "key-default",
            MockReply::Ok(
                200,
                json!({ "bookings": [
                    { "uid": "d1", "startTime": "2026-10-18T09:00:00Z", "endTime": "2026-10-18T10:00:00Z" }
                ]}),
            ),
        )
        .await;

        let relay = BookingRelay::new(api.clone(), CredentialTable::new().with_fallback("key-default"));
        let upcoming = relay.upcoming_bookings(now()).await.unwrap();

        assert_eq!(api.keys_seen().await, vec!["key-default"]);
        assert_eq!(upcoming.total_count, 1);
        assert_eq!(upcoming.bookings[0].uid, "d1");
        assert_eq!(upcoming.bookings[0].equipment_type, "DEFAULT");
    }

    #[tokio::test]
    async fn fallback_key_not_listed_when_equipment_keys_exist() {
        let api = Arc::new(MockSchedulingApi::new());
        let relay = BookingRelay::new(api.clone(), credentials().with_fallback("key-default"));
        relay.upcoming_bookings(now()).await.unwrap();
        assert!(!api.keys_seen().await.contains(&"key-default".to_string()));
        assert_eq!(api.calls(), 3);
    }

    #[test]
    fn unexpected_list_shape_yields_nothing() {
        assert!(upcoming_from_reply("PROJECTOR", &json!({ "bookings": "none" }), now()).is_empty());
        assert!(upcoming_from_reply("PROJECTOR", &Value::Null, now()).is_empty());
    }
}

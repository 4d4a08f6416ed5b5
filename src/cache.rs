// In-memory booking cache fed by Cal.com webhooks.
// Keyed by booking uid; each entry carries the status of the latest event seen for it.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;

use crate::error::WebhookError;
use crate::validation::parse_date_time;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BookingStatus {
    Created,
    Cancelled,
    Rescheduled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookTrigger {
    BookingCreated,
    BookingCancelled,
    BookingRescheduled,
    Other(String),
}

impl From<&str> for WebhookTrigger {
    fn from(value: &str) -> Self {
        match value {
            "BOOKING_CREATED" => WebhookTrigger::BookingCreated,
            "BOOKING_CANCELLED" => WebhookTrigger::BookingCancelled,
            "BOOKING_RESCHEDULED" => WebhookTrigger::BookingRescheduled,
            other => WebhookTrigger::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEvent {
    pub trigger: WebhookTrigger,
    pub uid: Option<String>,
    pub title: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub created_at: Option<String>,
    pub attendee_name: Option<String>,
    pub attendee_email: Option<String>,
}

fn text(source: &Value, field: &str) -> Option<String> {
    source
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
}

impl WebhookEvent {
    /// An empty body reads as an event with no trigger.
    pub fn from_slice(raw: &[u8]) -> Result<Self, WebhookError> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Self::from_value(&Value::Object(Default::default()));
        }
        let body: Value = serde_json::from_slice(raw)?;
        Self::from_value(&body)
    }

    /// Cal.com nests the booking under `payload`; flat bodies with the fields
    /// at the top level (and `attendees.0.*` keys) are accepted as well.
    pub fn from_value(body: &Value) -> Result<Self, WebhookError> {
        if !body.is_object() {
            return Err(WebhookError::NotAnObject);
        }

        let booking = body
            .get("payload")
            .filter(|payload| payload.is_object())
            .unwrap_or(body);
        let attendee = booking
            .get("attendees")
            .and_then(|attendees| attendees.get(0));

        let trigger = body
            .get("triggerEvent")
            .and_then(Value::as_str)
            .unwrap_or_default();

        Ok(Self {
            trigger: WebhookTrigger::from(trigger),
            uid: text(booking, "uid").or_else(|| text(body, "uid")),
            title: text(booking, "title"),
            start_time: text(booking, "startTime"),
            end_time: text(booking, "endTime"),
            created_at: text(body, "createdAt").or_else(|| text(booking, "createdAt")),
            attendee_name: attendee
                .and_then(|a| text(a, "name"))
                .or_else(|| text(body, "attendees.0.name")),
            attendee_email: attendee
                .and_then(|a| text(a, "email"))
                .or_else(|| text(body, "attendees.0.email")),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedBooking {
    pub uid: String,
    pub title: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub created_at: Option<String>,
    pub attendee_name: Option<String>,
    pub attendee_email: Option<String>,
    pub status: BookingStatus,
    pub updated_at: DateTime<Utc>,
}

// What applying one webhook event did to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheUpdate {
    Inserted,
    Replaced,
    StatusChanged(BookingStatus),
    // Cancel/reschedule for a uid never created, or an event without a uid
    Dropped,
    // Trigger the cache does not track
    Ignored,
}

#[derive(Debug, Default)]
pub struct BookingCache {
    entries: DashMap<String, CachedBooking>,
}

impl BookingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, event: WebhookEvent) -> CacheUpdate {
        let status = match event.trigger {
            WebhookTrigger::BookingCreated => BookingStatus::Created,
            WebhookTrigger::BookingCancelled => BookingStatus::Cancelled,
            WebhookTrigger::BookingRescheduled => BookingStatus::Rescheduled,
            WebhookTrigger::Other(_) => return CacheUpdate::Ignored,
        };

        let Some(uid) = event.uid else {
            return CacheUpdate::Dropped;
        };

        if status == BookingStatus::Created {
            let booking = CachedBooking {
                uid: uid.clone(),
                title: event.title,
                start_time: event.start_time,
                end_time: event.end_time,
                created_at: event.created_at,
                attendee_name: event.attendee_name,
                attendee_email: event.attendee_email,
                status,
                updated_at: Utc::now(),
            };
            return match self.entries.insert(uid, booking) {
                Some(_) => CacheUpdate::Replaced,
                None => CacheUpdate::Inserted,
            };
        }

        // get_mut holds the shard lock, so lookup and update are one step
        match self.entries.get_mut(&uid) {
            Some(mut entry) => {
                entry.status = status;
                entry.updated_at = Utc::now();
                CacheUpdate::StatusChanged(status)
            }
            None => CacheUpdate::Dropped,
        }
    }

    pub fn get(&self, uid: &str) -> Option<CachedBooking> {
        self.entries.get(uid).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All cached bookings ordered by start time; entries without a
    /// parseable start time go last.
    pub fn snapshot(&self) -> Vec<CachedBooking> {
        let mut bookings: Vec<CachedBooking> = self
            .entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        bookings.sort_by(|a, b| {
            let a_start = a.start_time.as_deref().and_then(parse_date_time);
            let b_start = b.start_time.as_deref().and_then(parse_date_time);
            let by_start = match (a_start, b_start) {
                (Some(a_start), Some(b_start)) => a_start.cmp(&b_start),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            by_start.then_with(|| a.uid.cmp(&b.uid))
        });
        bookings
    }
}

// Request validators. Pure functions over the raw JSON body: they either
// produce a typed request or report every rule that was violated.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use std::fmt;

use crate::models::{CancelRequest, RescheduleRequest};

const MIN_CANCELLATION_REASON_CHARS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationErrors(Vec<String>);

impl ValidationErrors {
    pub(crate) fn push(&mut self, rule: impl Into<String>) {
        self.0.push(rule.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn details(&self) -> &[String] {
        &self.0
    }

    pub fn into_details(self) -> Vec<String> {
        self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("; "))
    }
}

/// Parses an ISO-8601 date-time. A time component (`T`) is mandatory;
/// offsets are honoured and offset-less values are read as UTC.
pub fn parse_date_time(value: &str) -> Option<DateTime<Utc>> {
    if !value.contains('T') {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

// Non-empty string or a "required" violation
fn required_string<'a>(body: &'a Value, field: &str, errors: &mut ValidationErrors) -> Option<&'a str> {
    match body.get(field).and_then(Value::as_str) {
        Some(value) if !value.is_empty() => Some(value),
        _ => {
            errors.push(format!("{field} is required and must be a string"));
            None
        }
    }
}

fn optional_equipment_type(body: &Value, errors: &mut ValidationErrors) -> Option<String> {
    match body.get("equipmentType") {
        None | Some(Value::Null) => None,
        Some(Value::String(value)) if value.trim().is_empty() => None,
        Some(Value::String(value)) => Some(value.trim().to_string()),
        Some(_) => {
            errors.push("equipmentType must be a string");
            None
        }
    }
}

pub fn validate_reschedule(
    body: &Value,
    now: DateTime<Utc>,
) -> Result<RescheduleRequest, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let booking_uid = required_string(body, "bookingUid", &mut errors);
    let start_time = required_string(body, "startTime", &mut errors);
    let end_time = required_string(body, "endTime", &mut errors);
    let rescheduled_by = required_string(body, "rescheduledBy", &mut errors);
    let rescheduling_reason = required_string(body, "reschedulingReason", &mut errors);
    let equipment_type = optional_equipment_type(body, &mut errors);

    let start = start_time.and_then(|raw| {
        let parsed = parse_date_time(raw);
        if parsed.is_none() {
            errors.push("startTime must be a valid ISO 8601 date string");
        }
        parsed
    });
    let end = end_time.and_then(|raw| {
        let parsed = parse_date_time(raw);
        if parsed.is_none() {
            errors.push("endTime must be a valid ISO 8601 date string");
        }
        parsed
    });

    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            errors.push("startTime must be before endTime");
        }
        if start < now {
            errors.push("startTime cannot be in the past");
        }
    }

    match (booking_uid, start_time, end_time, rescheduled_by, rescheduling_reason) {
        (Some(booking_uid), Some(start_time), Some(end_time), Some(rescheduled_by), Some(reason))
            if errors.is_empty() =>
        {
            Ok(RescheduleRequest {
                booking_uid: booking_uid.to_string(),
                start_time: start_time.to_string(),
                end_time: end_time.to_string(),
                rescheduled_by: rescheduled_by.to_string(),
                rescheduling_reason: reason.to_string(),
                equipment_type,
            })
        }
        _ => Err(errors),
    }
}

pub fn validate_cancel(body: &Value) -> Result<CancelRequest, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let booking_uid = required_string(body, "bookingUid", &mut errors);
    let reason = required_string(body, "cancellationReason", &mut errors);
    let equipment_type = optional_equipment_type(body, &mut errors);

    if let Some(reason) = reason {
        if reason.chars().count() < MIN_CANCELLATION_REASON_CHARS {
            errors.push(format!(
                "cancellationReason must be at least {MIN_CANCELLATION_REASON_CHARS} characters long"
            ));
        }
    }

    match (booking_uid, reason) {
        (Some(booking_uid), Some(reason)) if errors.is_empty() => Ok(CancelRequest {
            booking_uid: booking_uid.to_string(),
            cancellation_reason: reason.to_string(),
            equipment_type,
        }),
        _ => Err(errors),
    }
}

// Upstream Cal.com API client. One shared reqwest client; the credential is
// chosen per call by the relay service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Url};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::credentials::ApiKey;
use crate::error::{ConfigError, RelayError};
use crate::models::{CancelRequest, RescheduleRequest, UpstreamReply};

#[async_trait]
pub trait SchedulingApi: Send + Sync + 'static {
    async fn reschedule(
        &self,
        key: &ApiKey,
        request: &RescheduleRequest,
    ) -> Result<UpstreamReply, RelayError>;

    async fn cancel(&self, key: &ApiKey, request: &CancelRequest)
        -> Result<UpstreamReply, RelayError>;

    async fn get_booking(&self, key: &ApiKey, booking_uid: &str)
        -> Result<UpstreamReply, RelayError>;

    async fn list_bookings(&self, key: &ApiKey) -> Result<UpstreamReply, RelayError>;
}

#[derive(Debug, Clone)]
pub struct CalcomClient {
    http: reqwest::Client,
    base_url: Url,
}

impl CalcomClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ConfigError::Invalid(format!("invalid Cal.com base URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::Invalid(format!(
                "Cal.com base URL {base_url} cannot carry a path"
            )));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;

        Ok(Self { http, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RelayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RelayError::Internal(format!("cannot build URL from {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder, key: &ApiKey) -> Result<UpstreamReply, RelayError> {
        let request = request
            .bearer_auth(key.expose())
            .build()
            .map_err(RelayError::from_transport)?;

        info!(method = %request.method(), url = %request.url(), "Cal.com API request");

        let response = self.http.execute(request).await.map_err(|e| {
            warn!(error = %e, "Cal.com API request failed");
            RelayError::from_transport(e)
        })?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(RelayError::from_transport)?;
        let body = decode_body(&text);

        if (200..300).contains(&status) {
            debug!(status, "Cal.com API response");
            Ok(UpstreamReply {
                status,
                body: body.unwrap_or(Value::Null),
            })
        } else {
            warn!(status, body = %text, "Cal.com API error response");
            Err(RelayError::Upstream { status, body })
        }
    }
}

// JSON when it parses, raw text otherwise, nothing for an empty body
fn decode_body(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
}

#[async_trait]
impl SchedulingApi for CalcomClient {
    async fn reschedule(
        &self,
        key: &ApiKey,
        request: &RescheduleRequest,
    ) -> Result<UpstreamReply, RelayError> {
        let url = self.endpoint(&["bookings", "reschedule"])?;
        self.send(self.http.post(url).json(request), key).await
    }

    async fn cancel(
        &self,
        key: &ApiKey,
        request: &CancelRequest,
    ) -> Result<UpstreamReply, RelayError> {
        let url = self.endpoint(&["bookings", "cancel"])?;
        self.send(self.http.post(url).json(request), key).await
    }

    async fn get_booking(
        &self,
        key: &ApiKey,
        booking_uid: &str,
    ) -> Result<UpstreamReply, RelayError> {
        let url = self.endpoint(&["bookings", booking_uid])?;
        self.send(self.http.get(url), key).await
    }

    async fn list_bookings(&self, key: &ApiKey) -> Result<UpstreamReply, RelayError> {
        let url = self.endpoint(&["bookings"])?;
        self.send(self.http.get(url), key).await
    }
}

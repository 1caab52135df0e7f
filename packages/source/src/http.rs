//! HTTP client for the `/analyze-fire-map` detection endpoint.
//!
//! Sends `POST {lat, lng, radius_km}` and decodes the detection list from
//! the response. Failures are never retried here: the synchronization
//! layer reports them and keeps the last good overlay on screen.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use wildfire_map_fire_models::FetchRequest;

use crate::{BackendError, DetectionBackend, DetectionResponse};

/// Maximum length of an error body included in [`BackendError::Status`].
const DETAIL_PREVIEW_LEN: usize = 300;

/// JSON body sent to the detection endpoint.
#[derive(Debug, Serialize)]
struct AnalyzeBody<'a> {
    lat: f64,
    lng: f64,
    radius_km: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_range: Option<&'a str>,
}

/// [`DetectionBackend`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    url: String,
    date_range: Option<String>,
}

impl HttpBackend {
    /// Creates a client for the endpoint at `url`.
    ///
    /// When `timeout` is `None` the transport default applies.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Http`] if the underlying client cannot be
    /// built (e.g. TLS backend initialization failure).
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, BackendError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            url: url.into(),
            date_range: None,
        })
    }

    /// Sets the look-back window sent with each request (e.g. `"7d"`).
    #[must_use]
    pub fn with_date_range(mut self, date_range: Option<String>) -> Self {
        self.date_range = date_range;
        self
    }

    /// The endpoint URL this client posts to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DetectionBackend for HttpBackend {
    async fn fetch_detections(
        &self,
        request: &FetchRequest,
    ) -> Result<DetectionResponse, BackendError> {
        let body = AnalyzeBody {
            lat: request.center.lat,
            lng: request.center.lng,
            radius_km: request.radius_km,
            date_range: self.date_range.as_deref(),
        };

        log::debug!(
            "POST {} request={} lat={:.4} lng={:.4} radius_km={:.1}",
            self.url,
            request.request_id,
            body.lat,
            body.lng,
            body.radius_km
        );

        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = error_detail(&text);
            log::warn!("Detection request {} failed: HTTP {status}: {detail}", request.request_id);
            return Err(BackendError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let value: serde_json::Value = response.json().await?;
        DetectionResponse::from_json(value)
    }
}

/// Extracts a readable message from a non-success response body.
///
/// Prefers the `detail` field of a JSON body, then falls back to a
/// truncated copy of the raw text.
fn error_detail(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        match value.get("detail") {
            Some(serde_json::Value::String(detail)) => return detail.clone(),
            Some(other) if !other.is_null() => return other.to_string(),
            _ => {}
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "no error details".to_string();
    }
    if trimmed.len() > DETAIL_PREVIEW_LEN {
        let cut = trimmed
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|i| *i <= DETAIL_PREVIEW_LEN)
            .last()
            .unwrap_or(0);
        format!("{}...", &trimmed[..cut])
    } else {
        trimmed.to_string()
    }
}

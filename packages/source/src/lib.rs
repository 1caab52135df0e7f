#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Fire detection backend client and record normalization.
//!
//! The backend is reached through the [`DetectionBackend`] trait so the
//! synchronization layer can be driven by the real HTTP endpoint
//! ([`http::HttpBackend`]) or by an in-memory fake in tests. Responses are
//! untrusted; [`normalize::normalize_detections`] turns them into validated
//! detections, optionally filtered to a region from the
//! [`region_registry`].

pub mod http;
pub mod normalize;
pub mod region_registry;

use async_trait::async_trait;
use wildfire_map_fire_models::{FetchRequest, RawDetection};

/// Errors that can occur while talking to the detection backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The backend answered with a non-success status.
    #[error("Backend returned HTTP {status}: {detail}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// The `detail` message from the error body, or the raw body.
        detail: String,
    },

    /// The response was valid JSON but not the expected shape.
    #[error("Malformed backend response: {message}")]
    Malformed {
        /// Description of what went wrong.
        message: String,
    },
}

/// A successful answer from the detection endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionResponse {
    /// Raw detection records, unvalidated.
    pub detections: Vec<RawDetection>,
    /// Optional analysis payload, passed through untouched.
    pub analysis: Option<serde_json::Value>,
}

impl DetectionResponse {
    /// Extracts detections from a decoded response body.
    ///
    /// Accepts `{ "fire_detections": [...] }` and the older
    /// `{ "fire_data": { "fires": [...] } }` layout. A missing or `null`
    /// detection list in an otherwise valid object is treated as empty.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Malformed`] if the body is not an object or
    /// the detection list is present but not an array.
    pub fn from_json(body: serde_json::Value) -> Result<Self, BackendError> {
        let serde_json::Value::Object(mut map) = body else {
            return Err(BackendError::Malformed {
                message: "response body is not a JSON object".to_string(),
            });
        };

        let analysis = map.remove("analysis").filter(|v| !v.is_null());

        let list = match map.remove("fire_detections") {
            Some(value) if !value.is_null() => value,
            _ => map
                .remove("fire_data")
                .and_then(|mut data| data.get_mut("fires").map(serde_json::Value::take))
                .unwrap_or(serde_json::Value::Null),
        };

        let detections = match list {
            serde_json::Value::Array(items) => items.into_iter().map(RawDetection).collect(),
            serde_json::Value::Null => Vec::new(),
            other => {
                return Err(BackendError::Malformed {
                    message: format!("expected detection array, got {other}"),
                });
            }
        };

        Ok(Self {
            detections,
            analysis,
        })
    }
}

/// A service that returns fire detections around a point.
#[async_trait]
pub trait DetectionBackend: Send + Sync {
    /// Fetches raw detections for the request's center and radius.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] on transport failure, non-success status,
    /// or an undecodable body.
    async fn fetch_detections(
        &self,
        request: &FetchRequest,
    ) -> Result<DetectionResponse, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_fire_detections_array() {
        let response = DetectionResponse::from_json(json!({
            "fire_detections": [{"lat": 1.0, "lng": 2.0}, {"lat": 3.0, "lng": 4.0}],
            "analysis": {"risk": "high"},
        }))
        .unwrap();

        assert_eq!(response.detections.len(), 2);
        assert_eq!(response.analysis, Some(json!({"risk": "high"})));
    }

    #[test]
    fn reads_nested_fire_data_layout() {
        let response = DetectionResponse::from_json(json!({
            "status": "success",
            "fire_data": {"count": 1, "fires": [{"latitude": "34.1", "longitude": "-118.2"}]},
        }))
        .unwrap();

        assert_eq!(response.detections.len(), 1);
        assert!(response.analysis.is_none());
    }

    #[test]
    fn missing_detection_list_is_empty() {
        let response = DetectionResponse::from_json(json!({"fire_detections": null})).unwrap();
        assert!(response.detections.is_empty());
    }

    #[test]
    fn rejects_non_object_body_and_non_array_list() {
        assert!(matches!(
            DetectionResponse::from_json(json!([1, 2])),
            Err(BackendError::Malformed { .. })
        ));
        assert!(matches!(
            DetectionResponse::from_json(json!({"fire_detections": "nope"})),
            Err(BackendError::Malformed { .. })
        ));
    }
}

use std::time::Duration;

use base64::{Engine, prelude::BASE64_STANDARD};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{DetectError, DetectionResult};

/// Prefix the backend expects; it strips everything up to the comma.
const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

pub fn encode_data_url(bytes: &[u8]) -> String {
    let mut url = String::with_capacity(DATA_URL_PREFIX.len() + bytes.len().div_ceil(3) * 4);
    url.push_str(DATA_URL_PREFIX);
    BASE64_STANDARD.encode_string(bytes, &mut url);
    url
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Thin client for `POST /api/detect`.
#[derive(Debug, Clone)]
pub struct DetectionClient {
    http: reqwest::Client,
    detect_url: String,
    timeout: Duration,
}

impl DetectionClient {
    pub fn new(detect_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            detect_url: detect_url.into(),
            timeout,
        }
    }

    pub fn detect_url(&self) -> &str {
        &self.detect_url
    }

    /// Sends one encoded image and normalizes the answer.
    pub async fn detect(&self, image_data_url: &str) -> Result<DetectionResult, DetectError> {
        let response = self
            .http
            .post(&self.detect_url)
            .timeout(self.timeout)
            .json(&json!({ "image": image_data_url }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(%status, bytes = body.len(), "detection response");

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("Detection failed")
                        .to_string()
                });
            return Err(DetectError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let result: DetectionResult =
            serde_json::from_str(&body).map_err(|e| DetectError::MalformedResponse(e.to_string()))?;
        for anomaly in result.anomalies() {
            warn!(%anomaly, "backend result outside its contract");
        }
        Ok(result)
    }
}

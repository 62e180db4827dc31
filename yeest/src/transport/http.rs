//! reqwest-backed transport.

use std::time::Duration;

use serde_json::Value;

use super::{Endpoint, Method, Transport, TransportError};

/// Talks JSON over HTTP to a backend at a fixed base address.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Transport for HttpTransport {
    async fn call(
        &self,
        endpoint: Endpoint,
        payload: &Value,
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        let url = format!("{}{}", self.base_url, endpoint.path());
        tracing::debug!(%endpoint, %url, ?timeout, "calling backend");

        let request = match endpoint.method() {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url).json(payload),
        };

        let resp = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(&e, timeout))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| classify(&e, timeout))?;

        if !status.is_success() {
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }

        match serde_json::from_str(&body) {
            Ok(value) => Ok(value),
            Err(e) if endpoint.is_acknowledgement() => {
                tracing::debug!(%endpoint, error = %e, "non-JSON acknowledgement accepted");
                Ok(Value::Null)
            }
            Err(e) => Err(TransportError::Malformed(e.to_string())),
        }
    }
}

fn classify(err: &reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else {
        TransportError::Unreachable(err.to_string())
    }
}

/// Pull a human-readable reason out of an error body.
///
/// The backend uses `{"detail": ...}`; the local proxy uses `{"error": ...}`.
fn error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["detail", "error"]
        .iter()
        .filter_map(|key| value.get(key).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
        .map(String::from)
}

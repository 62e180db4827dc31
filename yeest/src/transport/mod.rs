//! Transport adapter for the answer-generation backend.
//!
//! Every backend interaction is a single JSON request with a bounded timeout.
//! Failures are folded into [`TransportError`] so callers can tell a stopped
//! backend from a slow one, a refusal, or garbage. No retries happen here.

mod endpoint;
mod error;
mod http;

use std::future::Future;
use std::time::Duration;

use serde_json::Value;

pub use endpoint::{Endpoint, Method};
pub use error::TransportError;
pub use http::HttpTransport;

/// Issues one request to a logical backend endpoint.
pub trait Transport: Send + Sync {
    /// Send `payload` to `endpoint`, waiting at most `timeout` for the full
    /// response. Returns the parsed JSON body on a 2xx status.
    fn call(
        &self,
        endpoint: Endpoint,
        payload: &Value,
        timeout: Duration,
    ) -> impl Future<Output = Result<Value, TransportError>> + Send;
}

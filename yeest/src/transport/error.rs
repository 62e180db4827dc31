//! Transport failure taxonomy.

use std::time::Duration;

use thiserror::Error;

use super::Endpoint;

const UNREACHABLE_MESSAGE: &str =
    "Backend service is not available. Please make sure the backend is running.";
const MALFORMED_MESSAGE: &str = "Received an unreadable response from the backend.";

/// Why a backend call did not produce a usable body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No connection could be established.
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// Nothing came back within the bound.
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The backend answered with a non-2xx status.
    #[error("backend rejected request with status {status}")]
    Rejected { status: u16, detail: Option<String> },

    /// The body was not JSON or lacked required fields.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl TransportError {
    /// Short kind name for structured logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unreachable(_) => "unreachable",
            Self::Timeout(_) => "timeout",
            Self::Rejected { .. } => "rejected",
            Self::Malformed(_) => "malformed",
        }
    }

    /// Text suitable for a chat bubble or banner.
    ///
    /// Backend-supplied detail wins when present; otherwise a generic message
    /// for the failure kind (or, for refusals, for the endpoint).
    pub fn user_message(&self, endpoint: Endpoint) -> String {
        match self {
            Self::Unreachable(_) => UNREACHABLE_MESSAGE.to_string(),
            Self::Timeout(bound) => format!(
                "The backend took too long to respond (no answer within {bound:?}). Please try again."
            ),
            Self::Rejected {
                detail: Some(detail),
                ..
            } => detail.clone(),
            Self::Rejected { detail: None, .. } => endpoint.fallback_message().to_string(),
            Self::Malformed(_) => MALFORMED_MESSAGE.to_string(),
        }
    }
}

//! Logical backend endpoints.

/// HTTP method used by an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A backend operation the front-end knows how to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Answer a question given the prior conversation.
    Chat,
    /// Forget the backend's conversation memory.
    ResetMemory,
    /// Drop the backend's ingested-document index.
    ResetIndex,
    /// Liveness probe.
    Health,
}

impl Endpoint {
    /// Short name used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::ResetMemory => "reset-memory",
            Self::ResetIndex => "reset-index",
            Self::Health => "health",
        }
    }

    /// Path relative to the backend base address.
    pub const fn path(self) -> &'static str {
        match self {
            Self::Chat => "/chat",
            Self::ResetMemory => "/clear-memory",
            Self::ResetIndex => "/clear-vector-store",
            Self::Health => "/health",
        }
    }

    pub const fn method(self) -> Method {
        match self {
            Self::Health => Method::Get,
            Self::Chat | Self::ResetMemory | Self::ResetIndex => Method::Post,
        }
    }

    /// Whether any 2xx counts as success regardless of the body.
    pub const fn is_acknowledgement(self) -> bool {
        matches!(self, Self::ResetMemory | Self::ResetIndex)
    }

    /// Message shown when the backend refuses without saying why.
    pub const fn fallback_message(self) -> &'static str {
        match self {
            Self::Chat => "Backend error",
            Self::ResetMemory => "Failed to clear memory",
            Self::ResetIndex => "Failed to clear vector store",
            Self::Health => "Health check failed",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//! Runtime configuration, resolved once at startup.

use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Backend address used when nothing else is configured.
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";

/// Environment variables consulted for the backend address, in order.
const BACKEND_URL_VARS: &[&str] = &["BACKEND_URL", "NEXT_PUBLIC_BACKEND_URL"];

/// Answer requests may fan out to several retrievers downstream.
pub const DEFAULT_CHAT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base address of the backend, without a trailing slash.
    pub backend_url: String,
    /// Bound for `chat` requests.
    pub chat_timeout: Duration,
    /// Bound for reset and health requests.
    pub reset_timeout: Duration,
}

impl Config {
    /// Resolve from the process environment.
    pub fn from_env(backend_url_override: Option<&str>) -> Result<Self> {
        Self::from_lookup(backend_url_override, |key| std::env::var(key).ok())
    }

    /// Resolve using `lookup` in place of the environment.
    ///
    /// Precedence: explicit override, then `BACKEND_URL`, then
    /// `NEXT_PUBLIC_BACKEND_URL`, then [`DEFAULT_BACKEND_URL`]. Blank values
    /// count as unset.
    pub fn from_lookup(
        backend_url_override: Option<&str>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let raw = backend_url_override
            .map(str::to_string)
            .filter(|v| !v.trim().is_empty())
            .or_else(|| {
                BACKEND_URL_VARS
                    .iter()
                    .filter_map(|&key| lookup(key))
                    .find(|v| !v.trim().is_empty())
            })
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

        Ok(Self {
            backend_url: normalize_url(&raw)?,
            chat_timeout: DEFAULT_CHAT_TIMEOUT,
            reset_timeout: DEFAULT_RESET_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_chat_timeout(mut self, timeout: Duration) -> Self {
        self.chat_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }
}

fn normalize_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = reqwest::Url::parse(trimmed)
        .with_context(|| format!("Invalid backend URL: {trimmed}"))?;

    if !matches!(url.scheme(), "http" | "https") {
        bail!(
            "Backend URL must use http or https, got '{}': {trimmed}",
            url.scheme()
        );
    }

    Ok(trimmed.to_string())
}

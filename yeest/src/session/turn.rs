//! Turn model representing one message in the conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Prefix carried by assistant turns that stand in for a failed request.
pub const ERROR_MARKER: &str = "❌ ";

/// Author of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Question typed by the user.
    User,
    /// Answer (or failure notice) produced for the user.
    Assistant,
}

impl Role {
    /// Convert role to its wire string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a cited excerpt came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Wikipedia,
    News,
    Reddit,
    Other,
}

impl Provenance {
    /// Parse the `metadata.source` value sent by the backend.
    pub fn from_source(s: &str) -> Self {
        match s {
            "wikipedia" => Self::Wikipedia,
            "news" => Self::News,
            "reddit" => Self::Reddit,
            _ => Self::Other,
        }
    }

    /// Human-readable label, `None` for unknown sources.
    pub const fn label(self) -> Option<&'static str> {
        match self {
            Self::Wikipedia => Some("Wikipedia"),
            Self::News => Some("News"),
            Self::Reddit => Some("Reddit"),
            Self::Other => None,
        }
    }
}

/// A citation attached to an assistant turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Excerpt text.
    pub content: String,
    /// Free-form metadata; only `source`, `title` and `url` are interpreted.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl SourceRef {
    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Provenance of the excerpt. Missing or non-string values map to `Other`.
    pub fn provenance(&self) -> Provenance {
        self.metadata_str("source")
            .map_or(Provenance::Other, Provenance::from_source)
    }

    /// Display title, if the backend supplied one.
    pub fn title(&self) -> Option<&str> {
        self.metadata_str("title").filter(|t| !t.is_empty())
    }

    /// Link to the original document, if any.
    pub fn url(&self) -> Option<&str> {
        self.metadata_str("url").filter(|u| !u.is_empty())
    }
}

/// One message in the conversation. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Who authored the turn.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// Citations; only non-empty on successful assistant turns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceRef>,
    /// When the turn was appended locally.
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// Create a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            sources: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Create an assistant turn carrying an answer and its citations.
    pub fn assistant(content: impl Into<String>, sources: Vec<SourceRef>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            sources,
            created_at: Utc::now(),
        }
    }

    /// Create an assistant turn standing in for a failed request.
    pub fn failure(message: &str) -> Self {
        Self::assistant(format!("{ERROR_MARKER}{message}"), Vec::new())
    }

    /// Whether this turn reports a failure rather than an answer.
    pub fn is_failure(&self) -> bool {
        self.role == Role::Assistant && self.content.starts_with(ERROR_MARKER)
    }
}

/// The shape of a history entry on the wire: role and content only.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry<'a> {
    pub role: Role,
    pub content: &'a str,
}

impl<'a> From<&'a Turn> for HistoryEntry<'a> {
    fn from(turn: &'a Turn) -> Self {
        Self {
            role: turn.role,
            content: &turn.content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source(metadata: Value) -> SourceRef {
        serde_json::from_value(json!({"content": "excerpt", "metadata": metadata})).unwrap()
    }

    #[test]
    fn provenance_from_metadata() {
        assert_eq!(
            source(json!({"source": "wikipedia"})).provenance(),
            Provenance::Wikipedia
        );
        assert_eq!(source(json!({"source": "news"})).provenance(), Provenance::News);
        assert_eq!(source(json!({"source": "reddit"})).provenance(), Provenance::Reddit);
        assert_eq!(source(json!({"source": "arxiv"})).provenance(), Provenance::Other);
        assert_eq!(source(json!({"source": 7})).provenance(), Provenance::Other);
        assert_eq!(source(json!({})).provenance(), Provenance::Other);
    }

    #[test]
    fn title_and_url_accessors() {
        let s = source(json!({"title": "France", "url": "https://en.wikipedia.org/wiki/France"}));
        assert_eq!(s.title(), Some("France"));
        assert_eq!(s.url(), Some("https://en.wikipedia.org/wiki/France"));

        let s = source(json!({"title": "", "page": 3}));
        assert_eq!(s.title(), None);
        assert_eq!(s.url(), None);
    }

    #[test]
    fn source_without_metadata_deserializes() {
        let s: SourceRef = serde_json::from_value(json!({"content": "bare"})).unwrap();
        assert!(s.metadata.is_empty());
        assert_eq!(s.provenance(), Provenance::Other);
    }

    #[test]
    fn failure_turn_is_marked() {
        let turn = Turn::failure("Backend error");
        assert_eq!(turn.role, Role::Assistant);
        assert!(turn.content.contains("Backend error"));
        assert!(turn.is_failure());
        assert!(turn.sources.is_empty());
        assert!(!Turn::assistant("Paris", Vec::new()).is_failure());
    }

    #[test]
    fn history_entry_carries_role_and_content_only() {
        let turn = Turn::user("hello");
        let value = serde_json::to_value(HistoryEntry::from(&turn)).unwrap();
        assert_eq!(value, json!({"role": "user", "content": "hello"}));
    }
}

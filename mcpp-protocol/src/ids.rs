use serde::Deserialize;
use serde::Serialize;

/// Stable identifier of a single tool invocation.
///
/// A `CallId` is opaque to the core: callers mint it (or the dispatcher
/// generates one when absent) and it is never reused after deletion from
/// the cache. We newtype the raw string so cache keys, placeholder parses,
/// and consent-cache keys can't accidentally be built from the wrong kind
/// of string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(String);

impl CallId {
    /// Grammar for the `call_id` component of a placeholder: `[A-Za-z0-9_-]+`.
    pub fn is_valid(s: &str) -> bool {
        !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }

    pub fn new(s: impl Into<String>) -> Option<Self> {
        let s = s.into();
        if Self::is_valid(&s) { Some(Self(s)) } else { None }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::borrow::Borrow<str> for CallId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CallId {
    type Error = InvalidCallId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidCallId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidCallId;

impl std::fmt::Display for InvalidCallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "call_id must match [A-Za-z0-9_-]+ and be non-empty")
    }
}

impl std::error::Error for InvalidCallId {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_grammar_chars() {
        assert!(CallId::new("t1").is_some());
        assert!(CallId::new("call_id-123").is_some());
    }

    #[test]
    fn rejects_empty_and_illegal_chars() {
        assert!(CallId::new("").is_none());
        assert!(CallId::new("has a space").is_none());
        assert!(CallId::new("has.dot").is_none());
    }
}

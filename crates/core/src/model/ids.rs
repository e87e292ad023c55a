use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a catalog problem, structurally `<topicId>-<index>`.
///
/// The topic prefix is what progress aggregation groups by, so ids are kept
/// verbatim (no case folding or trimming beyond rejecting blank input).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProblemId(String);

impl ProblemId {
    /// Creates a new `ProblemId`
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this id belongs to the given topic (plain prefix match).
    #[must_use]
    pub fn has_topic_prefix(&self, topic: &str) -> bool {
        self.0.starts_with(topic)
    }
}

/// Identifier of a catalog topic (e.g. `arrays`).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicId(String);

impl TopicId {
    /// Creates a new `TopicId`
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Language tag attached to a snippet, normalized to lowercase.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct LanguageId(String);

impl LanguageId {
    /// The one language with a genuine in-process interpreter.
    pub const RHAI: &'static str = "rhai";

    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_ascii_lowercase())
    }

    #[must_use]
    pub fn rhai() -> Self {
        Self(Self::RHAI.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for LanguageId {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<LanguageId> for String {
    fn from(id: LanguageId) -> Self {
        id.0
    }
}

impl fmt::Debug for ProblemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProblemId({})", self.0)
    }
}

impl fmt::Debug for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TopicId({})", self.0)
    }
}

impl fmt::Debug for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LanguageId({})", self.0)
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for ProblemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── FromStr Implementations ───────────────────────────────────────────────────

/// Error type for parsing an id from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} must not be blank", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for ProblemId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ParseIdError { kind: "ProblemId" });
        }
        Ok(Self::new(s))
    }
}

impl FromStr for TopicId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ParseIdError { kind: "TopicId" });
        }
        Ok(Self::new(s))
    }
}

impl FromStr for LanguageId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ParseIdError { kind: "LanguageId" });
        }
        Ok(Self::new(s))
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problem_id_display_is_verbatim() {
        let id = ProblemId::new("arrays-1");
        assert_eq!(id.to_string(), "arrays-1");
    }

    #[test]
    fn problem_id_topic_prefix() {
        let id = ProblemId::new("linked-lists-3");
        assert!(id.has_topic_prefix("linked-lists"));
        assert!(!id.has_topic_prefix("arrays"));
    }

    #[test]
    fn blank_ids_are_rejected() {
        assert!("   ".parse::<ProblemId>().is_err());
        assert!("".parse::<TopicId>().is_err());
        assert!("\t".parse::<LanguageId>().is_err());
    }

    #[test]
    fn language_id_is_normalized() {
        let id: LanguageId = " Rhai ".parse().unwrap();
        assert_eq!(id, LanguageId::rhai());
        assert_eq!(LanguageId::new("CPP").as_str(), "cpp");
    }

    #[test]
    fn problem_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&ProblemId::new("trees-2")).unwrap();
        assert_eq!(json, "\"trees-2\"");
    }
}

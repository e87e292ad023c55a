use std::collections::HashSet;

use serde::Deserialize;
use thiserror::Error;

use crate::model::ids::{LanguageId, ProblemId, TopicId};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("malformed catalog: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("duplicate problem id: {0}")]
    DuplicateProblem(ProblemId),

    #[error("problem {problem} does not start with its topic id {topic}")]
    TopicMismatch { topic: TopicId, problem: ProblemId },
}

/// What the core needs to know about a catalog problem.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemEntry {
    pub id: ProblemId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub expected_output: Option<String>,
    pub canonical_language: LanguageId,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub problems: Vec<ProblemEntry>,
}

/// Read-only problem source consumed by the progress and execution paths.
pub trait ProblemCatalog: Send + Sync {
    fn topics(&self) -> &[Topic];

    fn problem(&self, id: &ProblemId) -> Option<&ProblemEntry> {
        self.topics()
            .iter()
            .flat_map(|topic| topic.problems.iter())
            .find(|problem| &problem.id == id)
    }

    fn total_problems(&self) -> usize {
        self.topics().iter().map(|topic| topic.problems.len()).sum()
    }

    fn total_for_topic(&self, topic: &TopicId) -> usize {
        self.topics()
            .iter()
            .find(|t| &t.id == topic)
            .map_or(0, |t| t.problems.len())
    }
}

/// Catalog held entirely in memory, typically loaded from a JSON file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticCatalog {
    topics: Vec<Topic>,
}

#[derive(Deserialize)]
struct CatalogFile {
    topics: Vec<Topic>,
}

impl StaticCatalog {
    /// Build a catalog, checking id uniqueness and topic prefixes.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::DuplicateProblem` or `CatalogError::TopicMismatch`.
    pub fn new(topics: Vec<Topic>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for topic in &topics {
            for problem in &topic.problems {
                if !problem.id.has_topic_prefix(topic.id.as_str()) {
                    return Err(CatalogError::TopicMismatch {
                        topic: topic.id.clone(),
                        problem: problem.id.clone(),
                    });
                }
                if !seen.insert(problem.id.clone()) {
                    return Err(CatalogError::DuplicateProblem(problem.id.clone()));
                }
            }
        }
        Ok(Self { topics })
    }

    /// Parse `{"topics": [...]}` JSON.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the JSON is malformed or fails validation.
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(raw)?;
        Self::new(file.topics)
    }
}

impl ProblemCatalog for StaticCatalog {
    fn topics(&self) -> &[Topic] {
        &self.topics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "topics": [
            {
                "id": "arrays",
                "title": "Arrays",
                "problems": [
                    { "id": "arrays-1", "title": "Two Sum", "expectedOutput": "[0,1]", "canonicalLanguage": "javascript" },
                    { "id": "arrays-2", "canonicalLanguage": "rhai" }
                ]
            },
            { "id": "graphs", "problems": [ { "id": "graphs-1", "canonicalLanguage": "Python" } ] }
        ]
    }"#;

    #[test]
    fn loads_json_catalog() {
        let catalog = StaticCatalog::from_json(SAMPLE).unwrap();
        assert_eq!(catalog.total_problems(), 3);
        assert_eq!(catalog.total_for_topic(&TopicId::new("arrays")), 2);
        assert_eq!(catalog.total_for_topic(&TopicId::new("heaps")), 0);

        let two_sum = catalog.problem(&ProblemId::new("arrays-1")).unwrap();
        assert_eq!(two_sum.expected_output.as_deref(), Some("[0,1]"));
        assert_eq!(two_sum.canonical_language.as_str(), "javascript");

        let graph = catalog.problem(&ProblemId::new("graphs-1")).unwrap();
        assert_eq!(graph.canonical_language.as_str(), "python");
        assert_eq!(graph.expected_output, None);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let raw = r#"{"topics":[{"id":"a","problems":[
            {"id":"a-1","canonicalLanguage":"rhai"},
            {"id":"a-1","canonicalLanguage":"rhai"}]}]}"#;
        assert!(matches!(
            StaticCatalog::from_json(raw),
            Err(CatalogError::DuplicateProblem(_))
        ));
    }

    #[test]
    fn rejects_problem_outside_topic_prefix() {
        let raw = r#"{"topics":[{"id":"trees","problems":[{"id":"graphs-1","canonicalLanguage":"rhai"}]}]}"#;
        assert!(matches!(
            StaticCatalog::from_json(raw),
            Err(CatalogError::TopicMismatch { .. })
        ));
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(matches!(
            StaticCatalog::from_json("{"),
            Err(CatalogError::Malformed(_))
        ));
    }
}

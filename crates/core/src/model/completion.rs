use std::collections::HashSet;

use crate::model::ids::ProblemId;

/// Set of problems the learner has marked done.
///
/// Backed by a hash set so membership checks and toggles stay O(1) amortized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionSet {
    ids: HashSet<ProblemId>,
}

impl CompletionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `id`. Returns the membership after the flip.
    pub fn toggle(&mut self, id: ProblemId) -> bool {
        if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        }
    }

    #[must_use]
    pub fn contains(&self, id: &ProblemId) -> bool {
        self.ids.contains(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Number of completed ids starting with `topic`.
    #[must_use]
    pub fn count_for_topic(&self, topic: &str) -> usize {
        self.ids
            .iter()
            .filter(|id| id.has_topic_prefix(topic))
            .count()
    }

    /// Completed ids in lexical order, the shape persisted to storage.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<ProblemId> {
        let mut ids: Vec<ProblemId> = self.ids.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Percentage of `total` covered by ids in `topic`.
    #[must_use]
    pub fn topic_progress(&self, topic: &str, total: usize) -> u8 {
        progress_percent(self.count_for_topic(topic), total)
    }

    /// Percentage of `total` covered by all completed ids.
    #[must_use]
    pub fn overall_progress(&self, total: usize) -> u8 {
        progress_percent(self.len(), total)
    }
}

impl FromIterator<ProblemId> for CompletionSet {
    fn from_iter<I: IntoIterator<Item = ProblemId>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

/// `round(100 * done / total)`, rounding halves up and clamped to 100.
///
/// A zero `total` yields 0 instead of dividing by zero. Stale ids can make
/// `done` exceed `total`; the clamp keeps the result a valid percentage.
#[must_use]
pub fn progress_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let done = done as u128;
    let total = total as u128;
    let rounded = (200 * done + total) / (2 * total);
    u8::try_from(rounded.min(100)).unwrap_or(100)
}

use drill_core::model::{CompletionSet, ProblemId, TopicId};
use storage::repository::KeyValueStore;

use crate::persist::{PersistQueue, keys};

/// Persistent set of completed problems.
///
/// Every toggle queues a write of the full set; the in-memory set stays
/// authoritative if that write later fails.
pub struct ProgressLedger {
    completed: CompletionSet,
    persist: PersistQueue,
}

impl ProgressLedger {
    /// Load the completion set from `store`.
    ///
    /// Missing, unreadable or malformed data yields an empty set.
    pub async fn load(store: &dyn KeyValueStore, persist: PersistQueue) -> Self {
        let completed = match store.get(keys::COMPLETED_PROBLEM_IDS).await {
            Ok(Some(raw)) => decode_ids(&raw),
            Ok(None) => CompletionSet::new(),
            Err(err) => {
                tracing::warn!(error = %err, "could not read completed problems; starting empty");
                CompletionSet::new()
            }
        };
        tracing::debug!(completed = completed.len(), "progress ledger loaded");
        Self { completed, persist }
    }

    /// Flip completion of `id` and queue the full set for persistence.
    ///
    /// Returns whether `id` is completed after the flip.
    pub fn toggle(&mut self, id: ProblemId) -> bool {
        let completed = self.completed.toggle(id);
        match serde_json::to_string(&self.completed.sorted_ids()) {
            Ok(encoded) => self.persist.write(keys::COMPLETED_PROBLEM_IDS, encoded),
            Err(err) => tracing::warn!(error = %err, "could not encode completed problems"),
        }
        completed
    }

    #[must_use]
    pub fn is_completed(&self, id: &ProblemId) -> bool {
        self.completed.contains(id)
    }

    #[must_use]
    pub fn completed(&self) -> &CompletionSet {
        &self.completed
    }

    /// Rounded percentage of `total_count` completed within `topic`; 0 when
    /// `total_count` is 0.
    #[must_use]
    pub fn progress_for_topic(&self, topic: &TopicId, total_count: usize) -> u8 {
        self.completed.topic_progress(topic.as_str(), total_count)
    }

    /// Rounded percentage of `total_count` completed overall; 0 when
    /// `total_count` is 0.
    #[must_use]
    pub fn overall_progress(&self, total_count: usize) -> u8 {
        self.completed.overall_progress(total_count)
    }
}

fn decode_ids(raw: &str) -> CompletionSet {
    match serde_json::from_str::<Vec<ProblemId>>(raw) {
        Ok(ids) => ids.into_iter().collect(),
        Err(err) => {
            tracing::warn!(error = %err, "completed problems are malformed; starting empty");
            CompletionSet::new()
        }
    }
}

//! Write-behind persistence shared by the ledger and the timer.

use std::sync::Arc;

use storage::repository::KeyValueStore;
use tokio::sync::{mpsc, oneshot};

/// Keys owned by the core services.
pub mod keys {
    pub const COMPLETED_PROBLEM_IDS: &str = "completed-problem-ids";
    pub const TOTAL_ELAPSED_SECONDS: &str = "total-elapsed-seconds";
    pub const TARGET_DURATION_SECONDS: &str = "target-duration-seconds";
}

enum PersistCommand {
    Write { key: &'static str, value: String },
    Flush(oneshot::Sender<()>),
}

/// Fire-and-forget writer in front of a `KeyValueStore`.
///
/// Writes are applied by a single background task in the order they were
/// issued, so a later value for a key always lands after an earlier one.
/// Failures are logged and dropped; callers keep their in-memory state.
#[derive(Clone)]
pub struct PersistQueue {
    tx: mpsc::UnboundedSender<PersistCommand>,
}

impl PersistQueue {
    /// Spawn the writer task on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn(store: Arc<dyn KeyValueStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(store, rx));
        Self { tx }
    }

    /// Queue `value` for `key` without waiting for the store.
    pub fn write(&self, key: &'static str, value: String) {
        if self.tx.send(PersistCommand::Write { key, value }).is_err() {
            tracing::warn!(key, "persistence writer is gone; dropping write");
        }
    }

    /// Wait until every write queued before this call has been attempted.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(PersistCommand::Flush(ack_tx)).is_err() {
            return;
        }
        let _ = ack_rx.await;
    }
}

async fn run_writer(
    store: Arc<dyn KeyValueStore>,
    mut rx: mpsc::UnboundedReceiver<PersistCommand>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            PersistCommand::Write { key, value } => {
                if let Err(err) = store.set(key, &value).await {
                    tracing::warn!(key, error = %err, "persist write failed; keeping in-memory state");
                }
            }
            PersistCommand::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

use std::sync::Arc;

use drill_core::model::{ExecutionRequest, LanguageId, ProblemCatalog, ProblemId, TopicId};
use storage::repository::Storage;

use crate::code_check::{CheckOutcome, CodeCheckService};
use crate::error::AppServicesError;
use crate::execution::{BackendRegistry, SandboxConfig};
use crate::persist::PersistQueue;
use crate::progress_ledger::ProgressLedger;
use crate::session_timer::SessionTimer;

/// Assembles the process-wide ledger, timer and code checker over one store.
pub struct AppServices {
    persist: PersistQueue,
    ledger: ProgressLedger,
    timer: Arc<SessionTimer>,
    code_check: Arc<CodeCheckService>,
    catalog: Arc<dyn ProblemCatalog>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        catalog: Arc<dyn ProblemCatalog>,
        sandbox: SandboxConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, catalog, sandbox).await)
    }

    /// Build services over a throwaway in-memory store.
    pub async fn in_memory(catalog: Arc<dyn ProblemCatalog>) -> Self {
        Self::from_storage(Storage::in_memory(), catalog, SandboxConfig::default()).await
    }

    /// Load persisted state from `storage` and start the persistence writer.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn from_storage(
        storage: Storage,
        catalog: Arc<dyn ProblemCatalog>,
        sandbox: SandboxConfig,
    ) -> Self {
        let persist = PersistQueue::spawn(Arc::clone(&storage.kv));
        let ledger = ProgressLedger::load(storage.kv.as_ref(), persist.clone()).await;
        let timer = Arc::new(SessionTimer::load(storage.kv.as_ref(), persist.clone()).await);
        let code_check = Arc::new(CodeCheckService::new(Arc::new(BackendRegistry::standard(
            sandbox,
        ))));
        tracing::info!(
            problems = catalog.total_problems(),
            completed = ledger.completed().len(),
            "app services ready"
        );

        Self {
            persist,
            ledger,
            timer,
            code_check,
            catalog,
        }
    }

    #[must_use]
    pub fn ledger(&self) -> &ProgressLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut ProgressLedger {
        &mut self.ledger
    }

    #[must_use]
    pub fn timer(&self) -> Arc<SessionTimer> {
        Arc::clone(&self.timer)
    }

    #[must_use]
    pub fn code_check(&self) -> Arc<CodeCheckService> {
        Arc::clone(&self.code_check)
    }

    #[must_use]
    pub fn catalog(&self) -> &dyn ProblemCatalog {
        self.catalog.as_ref()
    }

    /// Completion percentage of `topic`, sized by the catalog.
    #[must_use]
    pub fn topic_progress(&self, topic: &TopicId) -> u8 {
        self.ledger
            .progress_for_topic(topic, self.catalog.total_for_topic(topic))
    }

    /// Completion percentage across the whole catalog.
    #[must_use]
    pub fn overall_progress(&self) -> u8 {
        self.ledger.overall_progress(self.catalog.total_problems())
    }

    /// Build a request for a catalog problem.
    ///
    /// `language` defaults to the problem's canonical language and the
    /// expected output comes from the catalog.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::UnknownProblem` if `problem_id` is not in the
    /// catalog.
    pub fn problem_request(
        &self,
        problem_id: &ProblemId,
        source: impl Into<String>,
        language: Option<LanguageId>,
    ) -> Result<ExecutionRequest, AppServicesError> {
        let problem = self
            .catalog
            .problem(problem_id)
            .ok_or_else(|| AppServicesError::UnknownProblem(problem_id.clone()))?;
        let language = language.unwrap_or_else(|| problem.canonical_language.clone());

        let mut request = ExecutionRequest::new(source, language);
        request.expected_output = problem.expected_output.clone();
        Ok(request)
    }

    /// Run `source` against a catalog problem; see [`AppServices::problem_request`].
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::UnknownProblem` if `problem_id` is not in the
    /// catalog.
    pub async fn check_problem(
        &self,
        problem_id: &ProblemId,
        source: impl Into<String>,
        language: Option<LanguageId>,
    ) -> Result<CheckOutcome, AppServicesError> {
        let request = self.problem_request(problem_id, source, language)?;
        Ok(self.code_check.check(request).await)
    }

    /// Wait for every queued persistence write to be attempted.
    pub async fn flush(&self) {
        self.persist.flush().await;
    }
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use drill_core::model::{ExecutionFailure, ExecutionRequest, ExecutionResult, Verdict, judge};
use tokio::task::AbortHandle;

use crate::execution::BackendRegistry;

/// Outcome of a finished "try it" run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub result: ExecutionResult,
    pub verdict: Verdict,
}

impl CheckReport {
    /// True when the output was echoed rather than produced by running code.
    #[must_use]
    pub fn is_simulated(&self) -> bool {
        !self.result.backend.is_genuine()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Completed(CheckReport),
    /// A newer run started, or the caller cancelled, before this one finished.
    Discarded,
}

/// Runs submissions and judges them, keeping at most one run live.
///
/// Starting a run aborts the previous one; a run whose ticket is no longer
/// current reports `Discarded` instead of a result.
pub struct CodeCheckService {
    backends: Arc<BackendRegistry>,
    generation: AtomicU64,
    in_flight: Mutex<Option<AbortHandle>>,
}

impl CodeCheckService {
    #[must_use]
    pub fn new(backends: Arc<BackendRegistry>) -> Self {
        Self {
            backends,
            generation: AtomicU64::new(0),
            in_flight: Mutex::new(None),
        }
    }

    /// Run `request` on its language's backend and compare the output with
    /// `request.expected_output`.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn check(&self, request: ExecutionRequest) -> CheckOutcome {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let expected = request.expected_output.clone();
        let kind = self.backends.backend_for(&request.language).kind();

        let backends = Arc::clone(&self.backends);
        let task = tokio::spawn(async move { backends.run(&request).await });
        let _abort_on_drop = AbortOnDrop(task.abort_handle());
        if let Some(previous) = self.lock_in_flight().replace(task.abort_handle()) {
            previous.abort();
        }

        let joined = task.await;
        if self.generation.load(Ordering::SeqCst) != ticket {
            tracing::debug!(ticket, "dropping superseded execution result");
            return CheckOutcome::Discarded;
        }
        self.lock_in_flight().take();

        let result = match joined {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => return CheckOutcome::Discarded,
            Err(err) => {
                tracing::warn!(error = %err, "execution task failed");
                ExecutionResult::failed(
                    kind,
                    String::new(),
                    ExecutionFailure::Internal(err.to_string()),
                    Duration::ZERO,
                )
            }
        };
        let verdict = judge(&result, expected.as_deref());
        tracing::debug!(
            backend = result.backend.label(),
            ?verdict,
            elapsed_ms = result.elapsed.as_millis(),
            "execution finished"
        );
        CheckOutcome::Completed(CheckReport { result, verdict })
    }

    /// Abandon the live run, if any. Its caller receives `Discarded`.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.lock_in_flight().take() {
            handle.abort();
        }
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, Option<AbortHandle>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use drill_core::model::{BackendKind, LanguageId};

    use super::*;
    use crate::execution::{ExecutionBackend, SandboxConfig, SimulatedBackend};

    /// Waits, then prints its own source.
    struct SlowEcho(Duration);

    #[async_trait]
    impl ExecutionBackend for SlowEcho {
        fn kind(&self) -> BackendKind {
            BackendKind::NativeInterpreter
        }

        async fn run(&self, request: &ExecutionRequest) -> ExecutionResult {
            tokio::time::sleep(self.0).await;
            ExecutionResult::completed(self.kind(), request.source.clone(), self.0)
        }
    }

    fn slow_service() -> Arc<CodeCheckService> {
        let registry = BackendRegistry::new(Arc::new(SimulatedBackend))
            .with_backend(LanguageId::new("slow"), Arc::new(SlowEcho(Duration::from_millis(50))));
        Arc::new(CodeCheckService::new(Arc::new(registry)))
    }

    fn slow(source: &str) -> ExecutionRequest {
        ExecutionRequest::new(source, LanguageId::new("slow"))
    }

    #[tokio::test]
    async fn matching_output_passes() {
        let service = CodeCheckService::new(Arc::new(BackendRegistry::standard(
            SandboxConfig::default(),
        )));
        let request = ExecutionRequest::new(r#"print("hello");"#, LanguageId::rhai())
            .with_expected_output("hello\n");

        let CheckOutcome::Completed(report) = service.check(request).await else {
            panic!("run should complete");
        };
        assert_eq!(report.verdict, Verdict::Pass);
        assert!(!report.is_simulated());
    }

    #[tokio::test]
    async fn runtime_error_fails_even_when_output_matches() {
        let service = CodeCheckService::new(Arc::new(BackendRegistry::default()));
        let request = ExecutionRequest::new(r#"print("hello"); throw "late";"#, LanguageId::rhai())
            .with_expected_output("hello");

        let CheckOutcome::Completed(report) = service.check(request).await else {
            panic!("run should complete");
        };
        assert_eq!(report.result.captured_output, "hello");
        assert_eq!(report.verdict, Verdict::Fail);
    }

    #[tokio::test]
    async fn simulated_runs_are_flagged() {
        let service = CodeCheckService::new(Arc::new(BackendRegistry::default()));
        let request = ExecutionRequest::new("fmt.Println(1)", LanguageId::new("go"));

        let CheckOutcome::Completed(report) = service.check(request).await else {
            panic!("run should complete");
        };
        assert!(report.is_simulated());
        assert_eq!(report.verdict, Verdict::NoExpectation);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_run_discards_older_one() {
        let service = slow_service();
        let first = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.check(slow("first")).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = service.check(slow("second")).await;
        let first = first.await.unwrap();

        assert_eq!(first, CheckOutcome::Discarded);
        let CheckOutcome::Completed(report) = second else {
            panic!("latest run should complete");
        };
        assert_eq!(report.result.captured_output, "second");
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_live_run() {
        let service = slow_service();
        let pending = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.check(slow("abandoned")).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        service.cancel();
        assert_eq!(pending.await.unwrap(), CheckOutcome::Discarded);
    }
}

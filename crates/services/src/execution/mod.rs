//! Code execution backends and the per-language registry.

mod config;
mod native;
mod simulated;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use drill_core::model::{BackendKind, ExecutionRequest, ExecutionResult, LanguageId};

pub use config::SandboxConfig;
pub use native::NativeInterpreter;
pub use simulated::{SIMULATED_FALLBACK_OUTPUT, SimulatedBackend};

/// Something that can run a learner's source and report what it printed.
///
/// Backends never return `Err`: every failure is folded into
/// `ExecutionResult::error` so captured output survives alongside it.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn run(&self, request: &ExecutionRequest) -> ExecutionResult;
}

/// Maps languages to backends, with a fallback for everything unmapped.
#[derive(Clone)]
pub struct BackendRegistry {
    backends: HashMap<LanguageId, Arc<dyn ExecutionBackend>>,
    fallback: Arc<dyn ExecutionBackend>,
}

impl BackendRegistry {
    #[must_use]
    pub fn new(fallback: Arc<dyn ExecutionBackend>) -> Self {
        Self {
            backends: HashMap::new(),
            fallback,
        }
    }

    #[must_use]
    pub fn with_backend(mut self, language: LanguageId, backend: Arc<dyn ExecutionBackend>) -> Self {
        self.backends.insert(language, backend);
        self
    }

    /// Rhai runs natively under `config`; every other language is simulated.
    #[must_use]
    pub fn standard(config: SandboxConfig) -> Self {
        Self::new(Arc::new(SimulatedBackend))
            .with_backend(LanguageId::rhai(), Arc::new(NativeInterpreter::new(config)))
    }

    #[must_use]
    pub fn backend_for(&self, language: &LanguageId) -> Arc<dyn ExecutionBackend> {
        self.backends
            .get(language)
            .map_or_else(|| Arc::clone(&self.fallback), Arc::clone)
    }

    pub async fn run(&self, request: &ExecutionRequest) -> ExecutionResult {
        let backend = self.backend_for(&request.language);
        tracing::debug!(
            language = %request.language,
            backend = backend.kind().label(),
            "running submission"
        );
        backend.run(request).await
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::standard(SandboxConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rhai_goes_to_the_native_interpreter() {
        let registry = BackendRegistry::default();
        let backend = registry.backend_for(&LanguageId::rhai());
        assert_eq!(backend.kind(), BackendKind::NativeInterpreter);

        let request = ExecutionRequest::new(r#"print("hi");"#, LanguageId::rhai());
        let result = registry.run(&request).await;
        assert_eq!(result.backend, BackendKind::NativeInterpreter);
        assert_eq!(result.captured_output, "hi");
    }

    #[tokio::test]
    async fn unmapped_languages_are_simulated() {
        let registry = BackendRegistry::default();
        let language = LanguageId::new("python");
        assert_eq!(registry.backend_for(&language).kind(), BackendKind::Simulated);

        let request = ExecutionRequest::new("print('x')", language).with_expected_output("x");
        let result = registry.run(&request).await;
        assert_eq!(result.backend, BackendKind::Simulated);
        assert!(!result.backend.is_genuine());
        assert_eq!(result.captured_output, "x");
    }

    #[test]
    fn language_lookup_ignores_case() {
        let registry = BackendRegistry::default();
        let language: LanguageId = "  RHAI ".parse().unwrap();
        assert_eq!(registry.backend_for(&language).kind(), BackendKind::NativeInterpreter);
    }
}

use std::time::Duration;

use async_trait::async_trait;
use drill_core::model::{BackendKind, ExecutionRequest, ExecutionResult};

use super::ExecutionBackend;

/// Output reported by the simulated backend when a problem has no expectation.
pub const SIMULATED_FALLBACK_OUTPUT: &str = "Code executed successfully!";

/// Stand-in for languages without a real interpreter.
///
/// The learner's source is never executed. The result echoes the expected
/// output (or a fixed message) and is tagged `BackendKind::Simulated`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimulatedBackend;

#[async_trait]
impl ExecutionBackend for SimulatedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Simulated
    }

    async fn run(&self, request: &ExecutionRequest) -> ExecutionResult {
        let output = request
            .expected_output
            .clone()
            .unwrap_or_else(|| SIMULATED_FALLBACK_OUTPUT.to_string());
        ExecutionResult::completed(self.kind(), output, Duration::ZERO)
    }
}

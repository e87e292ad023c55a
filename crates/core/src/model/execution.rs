use std::fmt;
use std::time::Duration;

use crate::model::ids::LanguageId;

/// Which backend produced an execution result.
///
/// `Simulated` results never ran the learner's code; callers must not present
/// them as genuine execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    NativeInterpreter,
    Simulated,
}

impl BackendKind {
    #[must_use]
    pub fn is_genuine(self) -> bool {
        matches!(self, Self::NativeInterpreter)
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::NativeInterpreter => "native",
            Self::Simulated => "simulated",
        }
    }
}

/// One "try it" submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub source: String,
    pub language: LanguageId,
    pub expected_output: Option<String>,
}

impl ExecutionRequest {
    #[must_use]
    pub fn new(source: impl Into<String>, language: LanguageId) -> Self {
        Self {
            source: source.into(),
            language,
            expected_output: None,
        }
    }

    #[must_use]
    pub fn with_expected_output(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = Some(expected.into());
        self
    }
}

/// Why an execution attempt did not finish normally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionFailure {
    /// The learner's code raised; the message is shown verbatim.
    Runtime(String),
    /// The wall-clock ceiling was hit.
    TimedOut,
    /// The sandbox itself broke (worker panicked or was torn down).
    Internal(String),
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Runtime(message) => f.write_str(message),
            Self::TimedOut => f.write_str("execution timed out"),
            Self::Internal(message) => write!(f, "sandbox failure: {message}"),
        }
    }
}

/// Outcome of a single execution attempt.
///
/// On failure, `captured_output` holds whatever was emitted before the fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub backend: BackendKind,
    pub captured_output: String,
    pub error: Option<ExecutionFailure>,
    pub elapsed: Duration,
}

impl ExecutionResult {
    #[must_use]
    pub fn completed(backend: BackendKind, captured_output: String, elapsed: Duration) -> Self {
        Self {
            backend,
            captured_output,
            error: None,
            elapsed,
        }
    }

    #[must_use]
    pub fn failed(
        backend: BackendKind,
        captured_output: String,
        error: ExecutionFailure,
        elapsed: Duration,
    ) -> Self {
        Self {
            backend,
            captured_output,
            error: Some(error),
            elapsed,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The error as the learner sees it.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_is_stable() {
        assert_eq!(ExecutionFailure::TimedOut.to_string(), "execution timed out");
    }

    #[test]
    fn runtime_message_is_verbatim() {
        let result = ExecutionResult::failed(
            BackendKind::NativeInterpreter,
            "partial".into(),
            ExecutionFailure::Runtime("index out of bounds".into()),
            Duration::ZERO,
        );
        assert!(!result.is_success());
        assert_eq!(result.error_message().as_deref(), Some("index out of bounds"));
        assert_eq!(result.captured_output, "partial");
    }

    #[test]
    fn only_native_backend_is_genuine() {
        assert!(BackendKind::NativeInterpreter.is_genuine());
        assert!(!BackendKind::Simulated.is_genuine());
    }
}

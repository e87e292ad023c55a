use crate::model::execution::ExecutionResult;

/// Tri-state answer to "did the output match?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    NoExpectation,
    Pass,
    Fail,
}

/// Compare captured output against an expected value.
///
/// Only leading/trailing whitespace is ignored; internal whitespace and number
/// formatting must match exactly.
#[must_use]
pub fn compare(actual: &str, expected: Option<&str>) -> Verdict {
    let Some(expected) = expected else {
        return Verdict::NoExpectation;
    };
    if actual.trim() == expected.trim() {
        Verdict::Pass
    } else {
        Verdict::Fail
    }
}

/// Verdict for a whole attempt: an errored run never passes.
#[must_use]
pub fn judge(result: &ExecutionResult, expected: Option<&str>) -> Verdict {
    match (result.error.as_ref(), expected) {
        (_, None) => Verdict::NoExpectation,
        (Some(_), Some(_)) => Verdict::Fail,
        (None, Some(expected)) => compare(&result.captured_output, Some(expected)),
    }
}

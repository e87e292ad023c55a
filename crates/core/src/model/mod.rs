pub mod catalog;
mod completion;
mod execution;
mod ids;
mod timer;
mod verdict;

pub use catalog::{CatalogError, ProblemCatalog, ProblemEntry, StaticCatalog, Topic};
pub use ids::{LanguageId, ParseIdError, ProblemId, TopicId};

pub use completion::{progress_percent, CompletionSet};
pub use execution::{BackendKind, ExecutionFailure, ExecutionRequest, ExecutionResult};
pub use timer::{TargetDuration, TargetDurationError, TimerPhase, TimerState};
pub use verdict::{compare, judge, Verdict};

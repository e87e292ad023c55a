//! Shared error types for the services crate.

use thiserror::Error;

use drill_core::model::ProblemId;
use storage::sqlite::SqliteInitError;

/// Errors emitted while bootstrapping or driving app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error("unknown problem: {0}")]
    UnknownProblem(ProblemId),
}

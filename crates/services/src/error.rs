//! Shared error types for the services crate.

use thiserror::Error;

use course_core::ProgressError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ProgressService` and `StudySession`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error("study session ticker needs a running Tokio runtime")]
    NoRuntime,
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}

//! Shared error types for the services crate.

use thiserror::Error;

use exam_core::CatalogError;
use exam_core::SessionError;
use exam_core::model::{ExamId, UserError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted while starting or driving an exam runner.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunnerError {
    #[error("exam {0} is not in the catalog")]
    UnknownExam(ExamId),
    #[error("session task failed: {0}")]
    TaskFailed(String),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Errors emitted by `ResultSink` implementations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SinkError {
    #[error("result consumer is gone")]
    Closed,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `IdentityService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IdentityError {
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ResultHistoryService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HistoryError {
    #[error("exam {0} is not in the catalog")]
    UnknownExam(ExamId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

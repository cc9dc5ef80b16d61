use async_trait::async_trait;
use chrono::{DateTime, Utc};
use exam_core::model::{ExamId, ExamResult, NewUser, User, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A stored result with its row id and owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamResultRow {
    pub id: i64,
    pub user_id: Option<UserId>,
    pub result: ExamResult,
}

impl ExamResultRow {
    #[must_use]
    pub fn new(id: i64, user_id: Option<UserId>, result: ExamResult) -> Self {
        Self {
            id,
            user_id,
            result,
        }
    }
}

/// Repository contract for completed exam results.
#[async_trait]
pub trait ExamResultRepository: Send + Sync {
    /// Append a result and return its row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the result cannot be stored.
    async fn append_result(
        &self,
        user_id: Option<UserId>,
        result: &ExamResult,
    ) -> Result<i64, StorageError>;

    /// Fetch a result by row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_result(&self, id: i64) -> Result<ExamResultRow, StorageError>;

    /// Most recent results first, optionally narrowed to one user and/or exam.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_results(
        &self,
        user_id: Option<UserId>,
        exam_id: Option<ExamId>,
        limit: u32,
    ) -> Result<Vec<ExamResultRow>, StorageError>;
}

/// Repository contract for signed-in users.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert the user, or refresh email and name when the google id is known.
    /// `created_at` is only used on first insert.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the user cannot be stored.
    async fn upsert_user(
        &self,
        user: &NewUser,
        created_at: DateTime<Utc>,
    ) -> Result<User, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn find_user_by_google_id(&self, google_id: &str)
    -> Result<Option<User>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    results: Arc<Mutex<Vec<ExamResultRow>>>,
    users: Arc<Mutex<HashMap<String, User>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl ExamResultRepository for InMemoryRepository {
    async fn append_result(
        &self,
        user_id: Option<UserId>,
        result: &ExamResult,
    ) -> Result<i64, StorageError> {
        let mut guard = self.results.lock().map_err(poisoned)?;
        let id = i64::try_from(guard.len())
            .map_err(|_| StorageError::Serialization("result id overflow".into()))?
            + 1;
        guard.push(ExamResultRow::new(id, user_id, result.clone()));
        Ok(id)
    }

    async fn get_result(&self, id: i64) -> Result<ExamResultRow, StorageError> {
        let guard = self.results.lock().map_err(poisoned)?;
        guard
            .iter()
            .find(|row| row.id == id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_results(
        &self,
        user_id: Option<UserId>,
        exam_id: Option<ExamId>,
        limit: u32,
    ) -> Result<Vec<ExamResultRow>, StorageError> {
        let guard = self.results.lock().map_err(poisoned)?;
        let mut rows: Vec<ExamResultRow> = guard
            .iter()
            .filter(|row| user_id.is_none_or(|u| row.user_id == Some(u)))
            .filter(|row| exam_id.is_none_or(|e| row.result.exam_id() == e))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.result
                .completed_at()
                .cmp(&a.result.completed_at())
                .then(b.id.cmp(&a.id))
        });
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(rows)
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn upsert_user(
        &self,
        user: &NewUser,
        created_at: DateTime<Utc>,
    ) -> Result<User, StorageError> {
        let mut guard = self.users.lock().map_err(poisoned)?;
        let next_id = u64::try_from(guard.len())
            .map_err(|_| StorageError::Serialization("user id overflow".into()))?
            + 1;
        let stored = guard
            .entry(user.google_id().to_owned())
            .and_modify(|existing| {
                existing.email = user.email().to_owned();
                existing.name = user.name().to_owned();
            })
            .or_insert_with(|| user.clone().assign_id(UserId::new(next_id), created_at));
        Ok(stored.clone())
    }

    async fn find_user_by_google_id(
        &self,
        google_id: &str,
    ) -> Result<Option<User>, StorageError> {
        let guard = self.users.lock().map_err(poisoned)?;
        Ok(guard.get(google_id).cloned())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub results: Arc<dyn ExamResultRepository>,
    pub users: Arc<dyn UserRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let results: Arc<dyn ExamResultRepository> = Arc::new(repo.clone());
        let users: Arc<dyn UserRepository> = Arc::new(repo);
        Self { results, users }
    }
}

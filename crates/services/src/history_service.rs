use chrono::{DateTime, Utc};
use std::sync::Arc;

use exam_core::ExamCatalog;
use exam_core::model::{CompletionReason, ExamId, ExamResult, QuestionReview, UserId};
use exam_core::scoring;
use storage::repository::{ExamResultRepository, ExamResultRow};

use crate::error::HistoryError;

/// Storage identifier for a persisted exam result.
pub type ExamResultId = i64;

/// Presentation-agnostic history row.
///
/// The title is resolved from the catalog; results whose exam has since been
/// removed keep an empty title rather than disappearing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultListItem {
    pub id: ExamResultId,
    pub exam_id: ExamId,
    pub title: String,
    pub completed_at: DateTime<Utc>,
    pub score: u32,
    pub correct: u32,
    pub total: u32,
    pub elapsed_secs: u32,
    pub reason: CompletionReason,
}

impl ResultListItem {
    #[must_use]
    pub fn from_row(row: &ExamResultRow, title: &str) -> Self {
        let result = &row.result;
        Self {
            id: row.id,
            exam_id: result.exam_id(),
            title: title.to_owned(),
            completed_at: result.completed_at(),
            score: result.score(),
            correct: result.correct_answers(),
            total: result.total_questions(),
            elapsed_secs: result.elapsed_secs(),
            reason: result.reason(),
        }
    }
}

/// Read side for stored results.
#[derive(Clone)]
pub struct ResultHistoryService {
    catalog: Arc<ExamCatalog>,
    results: Arc<dyn ExamResultRepository>,
}

impl ResultHistoryService {
    #[must_use]
    pub fn new(catalog: Arc<ExamCatalog>, results: Arc<dyn ExamResultRepository>) -> Self {
        Self { catalog, results }
    }

    /// Newest first, for one user.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError` on storage failures.
    pub async fn list_recent(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<ResultListItem>, HistoryError> {
        let rows = self.results.list_results(Some(user_id), None, limit).await?;
        Ok(rows
            .iter()
            .map(|row| {
                let title = self
                    .catalog
                    .get(row.result.exam_id())
                    .map(|exam| exam.title().to_owned())
                    .unwrap_or_default();
                ResultListItem::from_row(row, &title)
            })
            .collect())
    }

    /// # Errors
    ///
    /// Returns `HistoryError::Storage` if the result is missing.
    pub async fn get(&self, id: ExamResultId) -> Result<ExamResult, HistoryError> {
        Ok(self.results.get_result(id).await?.result)
    }

    /// Rebuild the per-question review of a stored result.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::UnknownExam` if the exam is no longer in the
    /// catalog, or storage errors.
    pub async fn review(&self, id: ExamResultId) -> Result<Vec<QuestionReview>, HistoryError> {
        let result = self.get(id).await?;
        let exam = self
            .catalog
            .get(result.exam_id())
            .ok_or(HistoryError::UnknownExam(result.exam_id()))?;
        Ok(scoring::review(&exam, &result.answer_sheet()))
    }
}

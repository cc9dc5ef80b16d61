use std::sync::Arc;

use exam_core::model::{ExamDefinition, ExamId, ExamResult, Identity, QuestionReview, SessionSettings};
use exam_core::scoring;
use exam_core::{ExamCatalog, ExamSummary};
use storage::repository::ExamResultRepository;

use super::runner::ExamRunner;
use super::sink::{PersistingSink, ResultSink};
use crate::Clock;
use crate::error::RunnerError;

/// Orchestrates exam selection and session start.
#[derive(Clone)]
pub struct ExamSessionService {
    clock: Clock,
    settings: SessionSettings,
    catalog: Arc<ExamCatalog>,
    results: Arc<dyn ExamResultRepository>,
}

impl ExamSessionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        settings: SessionSettings,
        catalog: Arc<ExamCatalog>,
        results: Arc<dyn ExamResultRepository>,
    ) -> Self {
        Self {
            clock,
            settings,
            catalog,
            results,
        }
    }

    #[must_use]
    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    #[must_use]
    pub fn list_exams(&self) -> Vec<ExamSummary> {
        self.catalog.list()
    }

    #[must_use]
    pub fn search_exams(&self, query: &str) -> Vec<ExamSummary> {
        self.catalog.search(query)
    }

    /// # Errors
    ///
    /// Returns `RunnerError::UnknownExam` if the id is not in the catalog.
    pub fn exam(&self, exam_id: ExamId) -> Result<Arc<ExamDefinition>, RunnerError> {
        self.catalog
            .get(exam_id)
            .ok_or(RunnerError::UnknownExam(exam_id))
    }

    /// Start an attempt whose result is stored for `identity` when signed in.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::UnknownExam` for ids missing from the catalog.
    pub fn start_exam(
        &self,
        exam_id: ExamId,
        identity: &Identity,
    ) -> Result<ExamRunner, RunnerError> {
        let sink = PersistingSink::new(Arc::clone(&self.results), identity.clone());
        self.start_exam_with_sink(exam_id, Arc::new(sink))
    }

    /// Start an attempt that reports to a caller-provided sink.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::UnknownExam` for ids missing from the catalog.
    pub fn start_exam_with_sink(
        &self,
        exam_id: ExamId,
        sink: Arc<dyn ResultSink>,
    ) -> Result<ExamRunner, RunnerError> {
        let exam = self.exam(exam_id)?;
        Ok(ExamRunner::start(exam, self.settings, self.clock, sink)?)
    }

    /// Per-question review of a finished attempt.
    ///
    /// # Errors
    ///
    /// Returns `RunnerError::UnknownExam` if the result's exam is no longer in
    /// the catalog.
    pub fn review(&self, result: &ExamResult) -> Result<Vec<QuestionReview>, RunnerError> {
        let exam = self.exam(result.exam_id())?;
        Ok(scoring::review(&exam, &result.answer_sheet()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::sink::ChannelSink;
    use exam_core::model::{CompletionReason, Question, QuestionId, UserDraft};
    use exam_core::time::{fixed_clock, fixed_now};
    use storage::repository::{InMemoryRepository, UserRepository};

    fn catalog() -> Arc<ExamCatalog> {
        let questions = vec![
            Question::new(QuestionId::new(1), "2 + 2", vec!["3".into(), "4".into()], 1).unwrap(),
            Question::new(QuestionId::new(2), "3 + 3", vec!["6".into(), "7".into()], 0).unwrap(),
        ];
        let exam = ExamDefinition::new(ExamId::new(5), "Arithmetic", 1, questions).unwrap();
        Arc::new(ExamCatalog::new(vec![exam]).unwrap())
    }

    fn service(repo: &InMemoryRepository) -> ExamSessionService {
        ExamSessionService::new(
            fixed_clock(),
            SessionSettings::default(),
            catalog(),
            Arc::new(repo.clone()),
        )
    }

    #[test]
    fn unknown_exam_is_rejected() {
        let repo = InMemoryRepository::new();
        let err = service(&repo)
            .start_exam(ExamId::new(99), &Identity::anonymous())
            .unwrap_err();
        assert!(matches!(err, RunnerError::UnknownExam(id) if id == ExamId::new(99)));
    }

    #[tokio::test(start_paused = true)]
    async fn signed_in_attempt_is_persisted_and_reviewable() {
        let repo = InMemoryRepository::new();
        let user = repo
            .upsert_user(
                &UserDraft {
                    google_id: "g-1".into(),
                    email: "kim@example.com".into(),
                    name: "Kim".into(),
                }
                .validate()
                .unwrap(),
                fixed_now(),
            )
            .await
            .unwrap();
        let service = service(&repo);

        let mut runner = service
            .start_exam(ExamId::new(5), &Identity::signed_in(user.clone()))
            .unwrap();
        runner.select_current(1).await.unwrap();
        runner.next().await.unwrap();
        runner.select_current(1).await.unwrap();
        let result = runner.next().await.unwrap().into_result().unwrap();
        runner.wait().await.unwrap();

        assert_eq!(result.score(), 50);
        let stored = repo.list_results(Some(user.id), None, 5).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].result, result);

        let lines = service.review(&stored[0].result).unwrap();
        assert!(lines[0].is_correct);
        assert!(!lines[1].is_correct);
        assert_eq!(lines[1].selected_text.as_deref(), Some("7"));
    }

    #[tokio::test(start_paused = true)]
    async fn custom_sink_receives_timeout_result() {
        let repo = InMemoryRepository::new();
        let (sink, mut results) = ChannelSink::new();

        let mut runner = service(&repo)
            .start_exam_with_sink(ExamId::new(5), Arc::new(sink))
            .unwrap();
        runner.wait().await.unwrap();

        let result = results.recv().await.unwrap();
        assert_eq!(result.reason(), CompletionReason::TimedOut);
        assert!(repo.list_results(None, None, 5).await.unwrap().is_empty());
    }

    #[test]
    fn search_delegates_to_catalog() {
        let repo = InMemoryRepository::new();
        let service = service(&repo);
        assert_eq!(service.search_exams("arith").len(), 1);
        assert!(service.search_exams("physics").is_empty());
        assert_eq!(service.list_exams().len(), 1);
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::answer::{Answer, AnswerSheet};
use crate::model::ids::{ExamId, QuestionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExamResultError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("correct answers ({correct}) exceed total questions ({total})")]
    CountMismatch { correct: u32, total: u32 },

    #[error("score must be within 0..=100, got {0}")]
    InvalidScore(u32),

    #[error("unknown completion reason: {0}")]
    UnknownReason(String),
}

/// Which trigger ended the attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// The user finished from the last question or submitted explicitly.
    Finished,
    /// The countdown reached zero.
    TimedOut,
}

impl CompletionReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CompletionReason::Finished => "finished",
            CompletionReason::TimedOut => "timed_out",
        }
    }

    /// # Errors
    ///
    /// Returns `ExamResultError::UnknownReason` for unrecognised values.
    pub fn parse(value: &str) -> Result<Self, ExamResultError> {
        match value {
            "finished" => Ok(Self::Finished),
            "timed_out" => Ok(Self::TimedOut),
            other => Err(ExamResultError::UnknownReason(other.to_owned())),
        }
    }
}

impl fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scored snapshot of a finished attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExamResult {
    exam_id: ExamId,
    answers: Vec<Answer>,
    elapsed_secs: u32,
    total_questions: u32,
    correct_answers: u32,
    score: u32,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    reason: CompletionReason,
}

impl ExamResult {
    /// Rebuild a result from stored values, re-checking its internal consistency.
    ///
    /// # Errors
    ///
    /// Returns `ExamResultError` when timestamps are reversed, counts disagree,
    /// or the score is not a percentage.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        exam_id: ExamId,
        answers: Vec<Answer>,
        elapsed_secs: u32,
        total_questions: u32,
        correct_answers: u32,
        score: u32,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        reason: CompletionReason,
    ) -> Result<Self, ExamResultError> {
        if completed_at < started_at {
            return Err(ExamResultError::InvalidTimeRange);
        }
        if correct_answers > total_questions {
            return Err(ExamResultError::CountMismatch {
                correct: correct_answers,
                total: total_questions,
            });
        }
        if score > 100 {
            return Err(ExamResultError::InvalidScore(score));
        }

        Ok(Self {
            exam_id,
            answers,
            elapsed_secs,
            total_questions,
            correct_answers,
            score,
            started_at,
            completed_at,
            reason,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn scored(
        exam_id: ExamId,
        answers: Vec<Answer>,
        elapsed_secs: u32,
        total_questions: u32,
        correct_answers: u32,
        score: u32,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        reason: CompletionReason,
    ) -> Self {
        Self {
            exam_id,
            answers,
            elapsed_secs,
            total_questions,
            correct_answers,
            score,
            started_at,
            completed_at,
            reason,
        }
    }

    #[must_use]
    pub fn exam_id(&self) -> ExamId {
        self.exam_id
    }

    /// Final answers, ordered as the questions appear in the exam.
    #[must_use]
    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    /// The answers keyed by question, for re-deriving the review.
    #[must_use]
    pub fn answer_sheet(&self) -> AnswerSheet {
        self.answers.iter().copied().collect()
    }

    #[must_use]
    pub fn elapsed_secs(&self) -> u32 {
        self.elapsed_secs
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    /// Whole-number percentage, rounded half up.
    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn reason(&self) -> CompletionReason {
        self.reason
    }
}

/// Per-question correctness line for the review screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionReview {
    pub index: usize,
    pub question_id: QuestionId,
    pub prompt: String,
    pub selected_option: Option<usize>,
    pub selected_text: Option<String>,
    pub correct_option: usize,
    pub correct_text: String,
    pub is_correct: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    #[test]
    fn persisted_result_rejects_inconsistent_counts() {
        let now = fixed_now();
        let err = ExamResult::from_persisted(
            ExamId::new(1),
            Vec::new(),
            10,
            2,
            3,
            100,
            now,
            now,
            CompletionReason::Finished,
        )
        .unwrap_err();
        assert_eq!(err, ExamResultError::CountMismatch { correct: 3, total: 2 });
    }

    #[test]
    fn persisted_result_rejects_reversed_times() {
        let now = fixed_now();
        let err = ExamResult::from_persisted(
            ExamId::new(1),
            Vec::new(),
            10,
            2,
            1,
            50,
            now,
            now - Duration::seconds(1),
            CompletionReason::TimedOut,
        )
        .unwrap_err();
        assert_eq!(err, ExamResultError::InvalidTimeRange);
    }

    #[test]
    fn reason_round_trips_through_text() {
        for reason in [CompletionReason::Finished, CompletionReason::TimedOut] {
            assert_eq!(CompletionReason::parse(reason.as_str()).unwrap(), reason);
        }
        assert!(CompletionReason::parse("abandoned").is_err());
    }
}

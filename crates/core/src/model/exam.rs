use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{ExamId, QuestionId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExamError {
    #[error("exam title cannot be empty")]
    EmptyTitle,

    #[error("time limit must be > 0 minutes")]
    InvalidTimeLimit,

    #[error("exam must contain at least one question")]
    NoQuestions,

    #[error("duplicate question id {0}")]
    DuplicateQuestion(QuestionId),

    #[error("question {0} has an empty prompt")]
    EmptyPrompt(QuestionId),

    #[error("question {id} needs at least 2 options, got {len}")]
    TooFewOptions { id: QuestionId, len: usize },

    #[error("question {0} has an empty option")]
    EmptyOption(QuestionId),

    #[error("question {id}: correct option {index} is out of range for {len} options")]
    InvalidCorrectOption {
        id: QuestionId,
        index: usize,
        len: usize,
    },
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Unvalidated question as it appears in a catalog file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub id: QuestionId,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
}

impl QuestionDraft {
    /// # Errors
    ///
    /// Returns `ExamError` when the prompt or an option is blank, fewer than two
    /// options are given, or the correct index does not point at an option.
    pub fn validate(self) -> Result<Question, ExamError> {
        let id = self.id;
        let text = self.text.trim().to_owned();
        if text.is_empty() {
            return Err(ExamError::EmptyPrompt(id));
        }
        if self.options.len() < 2 {
            return Err(ExamError::TooFewOptions {
                id,
                len: self.options.len(),
            });
        }
        if self.options.iter().any(|opt| opt.trim().is_empty()) {
            return Err(ExamError::EmptyOption(id));
        }
        if self.correct_answer >= self.options.len() {
            return Err(ExamError::InvalidCorrectOption {
                id,
                index: self.correct_answer,
                len: self.options.len(),
            });
        }

        Ok(Question {
            id,
            text,
            options: self.options,
            correct_answer: self.correct_answer,
        })
    }
}

/// A single multiple-choice question with exactly one correct option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QuestionDraft", into = "QuestionDraft")]
pub struct Question {
    id: QuestionId,
    text: String,
    options: Vec<String>,
    correct_answer: usize,
}

impl Question {
    /// Convenience constructor over [`QuestionDraft::validate`].
    ///
    /// # Errors
    ///
    /// See [`QuestionDraft::validate`].
    pub fn new(
        id: QuestionId,
        text: impl Into<String>,
        options: Vec<String>,
        correct_answer: usize,
    ) -> Result<Self, ExamError> {
        QuestionDraft {
            id,
            text: text.into(),
            options,
            correct_answer,
        }
        .validate()
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    #[must_use]
    pub fn option_text(&self, index: usize) -> Option<&str> {
        self.options.get(index).map(String::as_str)
    }

    #[must_use]
    pub fn correct_answer(&self) -> usize {
        self.correct_answer
    }

    #[must_use]
    pub fn is_correct(&self, option: usize) -> bool {
        option == self.correct_answer
    }
}

impl TryFrom<QuestionDraft> for Question {
    type Error = ExamError;

    fn try_from(draft: QuestionDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}

impl From<Question> for QuestionDraft {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            text: q.text,
            options: q.options,
            correct_answer: q.correct_answer,
        }
    }
}

//
// ─── EXAM DEFINITION ───────────────────────────────────────────────────────────
//

/// Unvalidated exam as it appears in a catalog file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamDraft {
    pub id: ExamId,
    pub title: String,
    pub time_limit_minutes: u32,
    pub questions: Vec<QuestionDraft>,
}

impl ExamDraft {
    /// # Errors
    ///
    /// Returns the first `ExamError` found in the exam or any of its questions.
    pub fn validate(self) -> Result<ExamDefinition, ExamError> {
        let questions = self
            .questions
            .into_iter()
            .map(QuestionDraft::validate)
            .collect::<Result<Vec<_>, _>>()?;
        ExamDefinition::new(self.id, self.title, self.time_limit_minutes, questions)
    }
}

/// Immutable description of an exam: what is asked and how long the attempt may run.
///
/// Construction guarantees a non-blank title, a positive time limit, at least one
/// question, and question ids that are unique within the exam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ExamDraft", into = "ExamDraft")]
pub struct ExamDefinition {
    id: ExamId,
    title: String,
    time_limit_minutes: u32,
    questions: Vec<Question>,
}

impl ExamDefinition {
    /// # Errors
    ///
    /// Returns `ExamError` if the title is blank, the time limit is zero, there
    /// are no questions, or two questions share an id.
    pub fn new(
        id: ExamId,
        title: impl Into<String>,
        time_limit_minutes: u32,
        questions: Vec<Question>,
    ) -> Result<Self, ExamError> {
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(ExamError::EmptyTitle);
        }
        if time_limit_minutes == 0 {
            return Err(ExamError::InvalidTimeLimit);
        }
        if questions.is_empty() {
            return Err(ExamError::NoQuestions);
        }

        let mut seen = HashSet::with_capacity(questions.len());
        for q in &questions {
            if !seen.insert(q.id()) {
                return Err(ExamError::DuplicateQuestion(q.id()));
            }
        }

        Ok(Self {
            id,
            title,
            time_limit_minutes,
            questions,
        })
    }

    #[must_use]
    pub fn id(&self) -> ExamId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn time_limit_minutes(&self) -> u32 {
        self.time_limit_minutes
    }

    /// Countdown budget in seconds.
    #[must_use]
    pub fn time_limit_secs(&self) -> u32 {
        self.time_limit_minutes.saturating_mul(60)
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    /// Look up a question by id, returning its position as well.
    #[must_use]
    pub fn find_question(&self, id: QuestionId) -> Option<(usize, &Question)> {
        self.questions
            .iter()
            .enumerate()
            .find(|(_, q)| q.id() == id)
    }
}

impl TryFrom<ExamDraft> for ExamDefinition {
    type Error = ExamError;

    fn try_from(draft: ExamDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}

impl From<ExamDefinition> for ExamDraft {
    fn from(exam: ExamDefinition) -> Self {
        Self {
            id: exam.id,
            title: exam.title,
            time_limit_minutes: exam.time_limit_minutes,
            questions: exam.questions.into_iter().map(QuestionDraft::from).collect(),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

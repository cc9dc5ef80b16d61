use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::model::{
    Answer, AnswerSheet, CompletionReason, ExamDefinition, ExamId, ExamResult, Question,
    QuestionId,
};
use crate::scoring::{CompletionStamp, score_exam};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Precondition violations. Operations on a completed session are not errors;
/// they return [`Step::Ignored`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session has not started")]
    NotStarted,

    #[error("session already started")]
    AlreadyStarted,

    #[error("question {0} is not part of this exam")]
    UnknownQuestion(QuestionId),

    #[error("option {option} is out of range for question {question_id} ({len} options)")]
    InvalidOption {
        question_id: QuestionId,
        option: usize,
        len: usize,
    },

    #[error("question index {index} is out of range ({len} questions)")]
    OutOfRange { index: usize, len: usize },
}

//
// ─── EVENTS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    NotStarted,
    Active,
    Complete,
}

/// Everything that can happen to a session. Ticks and user actions go through
/// the same [`SessionState::apply`], which is what keeps completion single-shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SelectAnswer { question_id: QuestionId, option: usize },
    /// Select an option for the question currently shown.
    SelectCurrent { option: usize },
    Next,
    Previous,
    Tick,
    Finish,
}

/// Outcome of applying one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The session is still running.
    Continue,
    /// The session was already complete; nothing changed.
    Ignored,
    /// This event completed the session. Produced once per session.
    Completed(ExamResult),
}

impl Step {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Step::Completed(_))
    }

    #[must_use]
    pub fn into_result(self) -> Option<ExamResult> {
        match self {
            Step::Completed(result) => Some(result),
            Step::Continue | Step::Ignored => None,
        }
    }
}

/// Read-only progress signals for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub exam_id: ExamId,
    pub current_index: usize,
    pub total_questions: usize,
    pub progress_fraction: f64,
    pub remaining_secs: u32,
    pub selected_option: Option<usize>,
    pub phase: SessionPhase,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// State of one exam attempt.
///
/// Owns the question pointer, the answer sheet and the countdown. Completion is
/// write-once: the first of `Next` on the last question, `Finish`, or the tick
/// that drains the countdown produces the result; every later event is ignored.
pub struct SessionState {
    exam: Arc<ExamDefinition>,
    current: usize,
    answers: AnswerSheet,
    remaining_secs: u32,
    phase: SessionPhase,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    reason: Option<CompletionReason>,
}

impl SessionState {
    #[must_use]
    pub fn new(exam: Arc<ExamDefinition>) -> Self {
        let remaining_secs = exam.time_limit_secs();
        Self {
            exam,
            current: 0,
            answers: AnswerSheet::new(),
            remaining_secs,
            phase: SessionPhase::NotStarted,
            started_at: None,
            completed_at: None,
            reason: None,
        }
    }

    /// Begin the attempt with the full time budget.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyStarted` if called twice.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        if self.phase != SessionPhase::NotStarted {
            return Err(SessionError::AlreadyStarted);
        }
        self.remaining_secs = self.exam.time_limit_secs();
        self.started_at = Some(now);
        self.phase = SessionPhase::Active;
        Ok(())
    }

    /// Apply one event. `now` stamps the result if this event completes the session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotStarted` before [`start`](Self::start), and
    /// `UnknownQuestion` / `InvalidOption` for bad selections.
    pub fn apply(&mut self, event: SessionEvent, now: DateTime<Utc>) -> Result<Step, SessionError> {
        match event {
            SessionEvent::SelectAnswer {
                question_id,
                option,
            } => self.select_answer(question_id, option),
            SessionEvent::SelectCurrent { option } => self.select_current(option),
            SessionEvent::Next => self.go_next(now),
            SessionEvent::Previous => self.go_previous(),
            SessionEvent::Tick => self.tick(now),
            SessionEvent::Finish => self.finish(now),
        }
    }

    /// Record (or replace) the answer for `question_id`.
    ///
    /// # Errors
    ///
    /// See [`apply`](Self::apply).
    pub fn select_answer(
        &mut self,
        question_id: QuestionId,
        option: usize,
    ) -> Result<Step, SessionError> {
        if !self.is_active()? {
            return Ok(Step::Ignored);
        }
        let (_, question) = self
            .exam
            .find_question(question_id)
            .ok_or(SessionError::UnknownQuestion(question_id))?;
        if option >= question.option_count() {
            return Err(SessionError::InvalidOption {
                question_id,
                option,
                len: question.option_count(),
            });
        }
        self.answers.upsert(Answer::new(question_id, option));
        Ok(Step::Continue)
    }

    /// # Errors
    ///
    /// See [`apply`](Self::apply).
    pub fn select_current(&mut self, option: usize) -> Result<Step, SessionError> {
        if !self.is_active()? {
            return Ok(Step::Ignored);
        }
        let question_id = self.current_question()?.id();
        self.select_answer(question_id, option)
    }

    /// Advance, or finish when already on the last question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotStarted` before the session starts.
    pub fn go_next(&mut self, now: DateTime<Utc>) -> Result<Step, SessionError> {
        if !self.is_active()? {
            return Ok(Step::Ignored);
        }
        if self.current + 1 >= self.exam.question_count() {
            return Ok(self.complete(CompletionReason::Finished, now));
        }
        self.current += 1;
        Ok(Step::Continue)
    }

    /// # Errors
    ///
    /// Returns `SessionError::NotStarted` before the session starts.
    pub fn go_previous(&mut self) -> Result<Step, SessionError> {
        if !self.is_active()? {
            return Ok(Step::Ignored);
        }
        self.current = self.current.saturating_sub(1);
        Ok(Step::Continue)
    }

    /// One second of countdown. Draining the last second completes the session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotStarted` before the session starts.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<Step, SessionError> {
        if !self.is_active()? {
            return Ok(Step::Ignored);
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            return Ok(self.complete(CompletionReason::TimedOut, now));
        }
        Ok(Step::Continue)
    }

    /// Submit from any question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotStarted` before the session starts.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<Step, SessionError> {
        if !self.is_active()? {
            return Ok(Step::Ignored);
        }
        Ok(self.complete(CompletionReason::Finished, now))
    }

    fn is_active(&self) -> Result<bool, SessionError> {
        match self.phase {
            SessionPhase::NotStarted => Err(SessionError::NotStarted),
            SessionPhase::Active => Ok(true),
            SessionPhase::Complete => Ok(false),
        }
    }

    fn complete(&mut self, reason: CompletionReason, now: DateTime<Utc>) -> Step {
        if self.phase == SessionPhase::Complete {
            return Step::Ignored;
        }
        self.phase = SessionPhase::Complete;

        let started_at = self.started_at.unwrap_or(now);
        let completed_at = now.max(started_at);
        self.completed_at = Some(completed_at);
        self.reason = Some(reason);

        Step::Completed(score_exam(
            &self.exam,
            &self.answers,
            self.elapsed_secs(),
            CompletionStamp {
                started_at,
                completed_at,
                reason,
            },
        ))
    }

    //
    // ─── READS ─────────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn exam(&self) -> &ExamDefinition {
        &self.exam
    }

    /// # Errors
    ///
    /// Returns `SessionError::OutOfRange` only if the exam has no questions.
    pub fn current_question(&self) -> Result<&Question, SessionError> {
        self.exam
            .question(self.current)
            .ok_or(SessionError::OutOfRange {
                index: self.current,
                len: self.exam.question_count(),
            })
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.exam.question_count()
    }

    #[must_use]
    pub fn is_last_question(&self) -> bool {
        self.current + 1 >= self.exam.question_count()
    }

    /// `(pointer + 1) / question_count`, for display only.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress_fraction(&self) -> f64 {
        let total = self.exam.question_count();
        if total == 0 {
            return 0.0;
        }
        (self.current + 1) as f64 / total as f64
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerSheet {
        &self.answers
    }

    #[must_use]
    pub fn selected_option(&self, question_id: QuestionId) -> Option<usize> {
        self.answers.selected_option(question_id)
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    #[must_use]
    pub fn elapsed_secs(&self) -> u32 {
        self.exam
            .time_limit_secs()
            .saturating_sub(self.remaining_secs)
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == SessionPhase::Complete
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn completion_reason(&self) -> Option<CompletionReason> {
        self.reason
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let selected_option = self
            .current_question()
            .ok()
            .and_then(|q| self.answers.selected_option(q.id()));
        SessionSnapshot {
            exam_id: self.exam.id(),
            current_index: self.current,
            total_questions: self.exam.question_count(),
            progress_fraction: self.progress_fraction(),
            remaining_secs: self.remaining_secs,
            selected_option,
            phase: self.phase,
        }
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("exam_id", &self.exam.id())
            .field("current", &self.current)
            .field("answers_len", &self.answers.len())
            .field("remaining_secs", &self.remaining_secs)
            .field("phase", &self.phase)
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{fixed_clock, fixed_now};

    fn build_exam(questions: u64, minutes: u32) -> Arc<ExamDefinition> {
        let questions = (1..=questions)
            .map(|id| {
                Question::new(
                    QuestionId::new(id),
                    format!("Question {id}"),
                    vec!["A".into(), "B".into(), "C".into(), "D".into()],
                    0,
                )
                .unwrap()
            })
            .collect();
        Arc::new(ExamDefinition::new(ExamId::new(1), "Practice", minutes, questions).unwrap())
    }

    fn started(questions: u64, minutes: u32) -> SessionState {
        let mut session = SessionState::new(build_exam(questions, minutes));
        session.start(fixed_now()).unwrap();
        session
    }

    #[test]
    fn events_before_start_are_rejected() {
        let mut session = SessionState::new(build_exam(2, 5));
        assert_eq!(
            session.apply(SessionEvent::Next, fixed_now()).unwrap_err(),
            SessionError::NotStarted
        );
        assert_eq!(session.phase(), SessionPhase::NotStarted);
        assert_eq!(session.remaining_secs(), 300);
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut session = started(1, 5);
        assert_eq!(session.start(fixed_now()).unwrap_err(), SessionError::AlreadyStarted);
    }

    #[test]
    fn selecting_twice_replaces_answer() {
        let mut session = started(3, 5);
        session.select_answer(QuestionId::new(1), 0).unwrap();
        session.select_answer(QuestionId::new(1), 2).unwrap();

        assert_eq!(session.answers().len(), 1);
        assert_eq!(session.selected_option(QuestionId::new(1)), Some(2));
    }

    #[test]
    fn invalid_selection_is_rejected_without_side_effects() {
        let mut session = started(2, 5);

        let err = session.select_answer(QuestionId::new(1), 4).unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidOption {
                question_id: QuestionId::new(1),
                option: 4,
                len: 4
            }
        );
        let err = session.select_answer(QuestionId::new(42), 0).unwrap_err();
        assert_eq!(err, SessionError::UnknownQuestion(QuestionId::new(42)));
        assert!(session.answers().is_empty());
    }

    #[test]
    fn select_current_targets_shown_question() {
        let mut session = started(2, 5);
        session.go_next(fixed_now()).unwrap();
        session
            .apply(SessionEvent::SelectCurrent { option: 3 }, fixed_now())
            .unwrap();

        assert_eq!(session.selected_option(QuestionId::new(2)), Some(3));
        assert_eq!(session.snapshot().selected_option, Some(3));
    }

    #[test]
    fn previous_is_floored_at_first_question() {
        let mut session = started(3, 5);
        assert_eq!(session.go_previous().unwrap(), Step::Continue);
        assert_eq!(session.current_index(), 0);
    }

    #[test]
    fn next_on_last_question_completes_instead_of_advancing() {
        let mut session = started(2, 5);
        assert_eq!(session.go_next(fixed_now()).unwrap(), Step::Continue);
        assert_eq!(session.current_index(), 1);

        let step = session.go_next(fixed_now()).unwrap();
        assert!(step.is_completed());
        assert_eq!(session.current_index(), 1);
        assert!(session.is_complete());
        assert_eq!(session.completion_reason(), Some(CompletionReason::Finished));
    }

    #[test]
    fn progress_fraction_tracks_pointer() {
        let mut session = started(4, 5);
        assert!((session.progress_fraction() - 0.25).abs() < f64::EPSILON);
        session.go_next(fixed_now()).unwrap();
        assert!((session.progress_fraction() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn completed_session_is_inert() {
        let mut session = started(2, 5);
        session.select_answer(QuestionId::new(1), 0).unwrap();
        let result = session.finish(fixed_now()).unwrap().into_result().unwrap();
        assert_eq!(result.correct_answers(), 1);

        let before = session.snapshot();
        for event in [
            SessionEvent::SelectAnswer {
                question_id: QuestionId::new(2),
                option: 0,
            },
            SessionEvent::Next,
            SessionEvent::Previous,
            SessionEvent::Tick,
            SessionEvent::Finish,
        ] {
            assert_eq!(session.apply(event, fixed_now()).unwrap(), Step::Ignored);
        }

        assert_eq!(session.snapshot(), before);
        assert_eq!(session.answers().len(), 1);
    }

    #[test]
    fn timeout_completes_one_minute_exam_after_sixty_ticks() {
        let mut session = started(3, 1);
        let mut clock = fixed_clock();
        let mut completed = Vec::new();

        for _ in 0..60 {
            clock.advance_secs(1);
            if let Step::Completed(result) = session.tick(clock.now()).unwrap() {
                completed.push(result);
            }
        }

        assert_eq!(completed.len(), 1);
        let result = &completed[0];
        assert_eq!(result.elapsed_secs(), 60);
        assert_eq!(result.correct_answers(), 0);
        assert_eq!(result.score(), 0);
        assert_eq!(result.reason(), CompletionReason::TimedOut);
        assert_eq!(session.remaining_secs(), 0);
    }

    #[test]
    fn manual_finish_after_ten_ticks_reports_ten_seconds() {
        let mut session = started(1, 60);
        for _ in 0..10 {
            session.tick(fixed_now()).unwrap();
        }
        let result = session.go_next(fixed_now()).unwrap().into_result().unwrap();
        assert_eq!(result.elapsed_secs(), 10);
        assert_eq!(result.reason(), CompletionReason::Finished);
    }

    #[test]
    fn final_tick_and_finish_complete_exactly_once() {
        let mut session = started(1, 1);
        for _ in 0..59 {
            session.tick(fixed_now()).unwrap();
        }

        let steps = [
            session.apply(SessionEvent::Tick, fixed_now()).unwrap(),
            session.apply(SessionEvent::Next, fixed_now()).unwrap(),
            session.apply(SessionEvent::Finish, fixed_now()).unwrap(),
        ];
        let results = steps.iter().filter(|s| s.is_completed()).count();
        assert_eq!(results, 1);
        assert_eq!(session.completion_reason(), Some(CompletionReason::TimedOut));

        let mut session = started(1, 1);
        for _ in 0..59 {
            session.tick(fixed_now()).unwrap();
        }
        let first = session.apply(SessionEvent::Next, fixed_now()).unwrap();
        let second = session.apply(SessionEvent::Tick, fixed_now()).unwrap();
        assert!(first.is_completed());
        assert_eq!(second, Step::Ignored);
        assert_eq!(session.remaining_secs(), 1);
    }

    #[test]
    fn score_uses_answers_at_completion() {
        let mut session = started(3, 5);
        session.select_answer(QuestionId::new(1), 0).unwrap();
        session.select_answer(QuestionId::new(2), 1).unwrap();
        let result = session.finish(fixed_now()).unwrap().into_result().unwrap();

        session.select_answer(QuestionId::new(3), 0).unwrap();

        assert_eq!(result.correct_answers(), 1);
        assert_eq!(result.total_questions(), 3);
        assert_eq!(result.score(), 33);
        assert!(session.selected_option(QuestionId::new(3)).is_none());
    }

    #[test]
    fn result_carries_start_and_completion_timestamps() {
        let mut session = started(1, 5);
        let mut clock = fixed_clock();
        clock.advance_secs(30);
        let result = session.finish(clock.now()).unwrap().into_result().unwrap();
        assert_eq!(result.started_at(), fixed_now());
        assert_eq!(result.completed_at(), clock.now());
        assert_eq!(session.completed_at(), Some(clock.now()));
    }
}

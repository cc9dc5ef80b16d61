//! Pure scoring and review over an exam definition and an answer sheet.
//!
//! Nothing here keeps state: the review screen calls [`review`] with the same
//! inputs that produced the [`ExamResult`] and gets the same correctness.

use chrono::{DateTime, Utc};

use crate::model::{AnswerSheet, CompletionReason, ExamDefinition, ExamResult, QuestionReview};

/// When and why the attempt ended, as stamped on the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionStamp {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub reason: CompletionReason,
}

/// `correct / total * 100`, rounded half up. Zero when `total` is zero.
#[must_use]
pub fn score_percent(correct: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let correct = u64::from(correct.min(total));
    let total = u64::from(total);
    let rounded = (correct * 200 + total) / (total * 2);
    u32::try_from(rounded).unwrap_or(100)
}

/// Number of questions whose recorded answer matches the correct option.
/// Unanswered questions count as incorrect.
#[must_use]
pub fn count_correct(exam: &ExamDefinition, answers: &AnswerSheet) -> u32 {
    let correct = exam
        .questions()
        .iter()
        .filter(|q| {
            answers
                .selected_option(q.id())
                .is_some_and(|selected| q.is_correct(selected))
        })
        .count();
    u32::try_from(correct).unwrap_or(u32::MAX)
}

/// Build the result for an attempt.
#[must_use]
pub fn score_exam(
    exam: &ExamDefinition,
    answers: &AnswerSheet,
    elapsed_secs: u32,
    stamp: CompletionStamp,
) -> ExamResult {
    let total = u32::try_from(exam.question_count()).unwrap_or(u32::MAX);
    let correct = count_correct(exam, answers);

    ExamResult::scored(
        exam.id(),
        answers.in_exam_order(exam),
        elapsed_secs,
        total,
        correct,
        score_percent(correct, total),
        stamp.started_at,
        stamp.completed_at,
        stamp.reason,
    )
}

/// One review line per question, in exam order.
#[must_use]
pub fn review(exam: &ExamDefinition, answers: &AnswerSheet) -> Vec<QuestionReview> {
    exam.questions()
        .iter()
        .enumerate()
        .map(|(index, q)| {
            let selected = answers.selected_option(q.id());
            QuestionReview {
                index,
                question_id: q.id(),
                prompt: q.text().to_owned(),
                selected_option: selected,
                selected_text: selected.and_then(|s| q.option_text(s)).map(str::to_owned),
                correct_option: q.correct_answer(),
                correct_text: q
                    .option_text(q.correct_answer())
                    .unwrap_or_default()
                    .to_owned(),
                is_correct: selected.is_some_and(|s| q.is_correct(s)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Answer, ExamId, Question, QuestionId};
    use crate::time::fixed_now;

    fn three_question_exam() -> ExamDefinition {
        let questions = (1..=3)
            .map(|id| {
                Question::new(
                    QuestionId::new(id),
                    format!("Q{id}"),
                    vec!["a".into(), "b".into(), "c".into()],
                    0,
                )
                .unwrap()
            })
            .collect();
        ExamDefinition::new(ExamId::new(1), "Three", 5, questions).unwrap()
    }

    fn stamp() -> CompletionStamp {
        CompletionStamp {
            started_at: fixed_now(),
            completed_at: fixed_now(),
            reason: CompletionReason::Finished,
        }
    }

    #[test]
    fn rounds_half_up() {
        assert_eq!(score_percent(1, 3), 33);
        assert_eq!(score_percent(2, 3), 67);
        assert_eq!(score_percent(1, 8), 13);
        assert_eq!(score_percent(1, 200), 1);
        assert_eq!(score_percent(0, 5), 0);
        assert_eq!(score_percent(5, 5), 100);
        assert_eq!(score_percent(0, 0), 0);
    }

    #[test]
    fn one_right_one_wrong_one_blank_scores_33() {
        let exam = three_question_exam();
        let answers: AnswerSheet = [
            Answer::new(QuestionId::new(1), 0),
            Answer::new(QuestionId::new(2), 2),
        ]
        .into_iter()
        .collect();

        let result = score_exam(&exam, &answers, 42, stamp());

        assert_eq!(result.correct_answers(), 1);
        assert_eq!(result.total_questions(), 3);
        assert_eq!(result.score(), 33);
        assert_eq!(result.elapsed_secs(), 42);
        assert_eq!(result.answers().len(), 2);
    }

    #[test]
    fn answers_for_unknown_questions_are_ignored() {
        let exam = three_question_exam();
        let answers: AnswerSheet = [Answer::new(QuestionId::new(99), 0)].into_iter().collect();

        let result = score_exam(&exam, &answers, 0, stamp());

        assert_eq!(result.correct_answers(), 0);
        assert!(result.answers().is_empty());
    }

    #[test]
    fn review_matches_scoring_and_marks_blanks() {
        let exam = three_question_exam();
        let answers: AnswerSheet = [
            Answer::new(QuestionId::new(1), 0),
            Answer::new(QuestionId::new(2), 1),
        ]
        .into_iter()
        .collect();

        let lines = review(&exam, &answers);
        let result = score_exam(&exam, &answers, 0, stamp());

        assert_eq!(lines.len(), 3);
        assert!(lines[0].is_correct);
        assert_eq!(lines[1].selected_text.as_deref(), Some("b"));
        assert_eq!(lines[1].correct_text, "a");
        assert!(!lines[1].is_correct);
        assert_eq!(lines[2].selected_option, None);
        assert!(!lines[2].is_correct);

        let from_review = lines.iter().filter(|l| l.is_correct).count();
        assert_eq!(from_review as u32, result.correct_answers());
    }

    #[test]
    fn review_from_result_sheet_is_reproducible() {
        let exam = three_question_exam();
        let answers: AnswerSheet = [Answer::new(QuestionId::new(3), 0)].into_iter().collect();
        let result = score_exam(&exam, &answers, 0, stamp());

        assert_eq!(review(&exam, &result.answer_sheet()), review(&exam, &answers));
    }
}

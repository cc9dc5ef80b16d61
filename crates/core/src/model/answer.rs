use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::exam::ExamDefinition;
use crate::model::ids::QuestionId;

/// The option a user picked for one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: QuestionId,
    pub selected_option: usize,
}

impl Answer {
    #[must_use]
    pub fn new(question_id: QuestionId, selected_option: usize) -> Self {
        Self {
            question_id,
            selected_option,
        }
    }
}

/// Answers keyed by question id. Recording twice for the same question replaces
/// the earlier answer, so the sheet never holds more than one entry per question.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerSheet {
    answers: BTreeMap<QuestionId, Answer>,
}

impl AnswerSheet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; returns the answer that was replaced, if any.
    pub fn upsert(&mut self, answer: Answer) -> Option<Answer> {
        self.answers.insert(answer.question_id, answer)
    }

    #[must_use]
    pub fn get(&self, question_id: QuestionId) -> Option<&Answer> {
        self.answers.get(&question_id)
    }

    #[must_use]
    pub fn selected_option(&self, question_id: QuestionId) -> Option<usize> {
        self.get(question_id).map(|a| a.selected_option)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Answer> {
        self.answers.values()
    }

    /// Answers in the order their questions appear in `exam`.
    ///
    /// Entries for ids the exam does not contain are left out.
    #[must_use]
    pub fn in_exam_order(&self, exam: &ExamDefinition) -> Vec<Answer> {
        exam.questions()
            .iter()
            .filter_map(|q| self.get(q.id()).copied())
            .collect()
    }
}

impl FromIterator<Answer> for AnswerSheet {
    fn from_iter<I: IntoIterator<Item = Answer>>(iter: I) -> Self {
        let mut sheet = Self::new();
        for answer in iter {
            sheet.upsert(answer);
        }
        sheet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_replaces_previous_selection() {
        let mut sheet = AnswerSheet::new();
        assert!(sheet.upsert(Answer::new(QuestionId::new(1), 0)).is_none());
        let replaced = sheet.upsert(Answer::new(QuestionId::new(1), 2));

        assert_eq!(replaced, Some(Answer::new(QuestionId::new(1), 0)));
        assert_eq!(sheet.len(), 1);
        assert_eq!(sheet.selected_option(QuestionId::new(1)), Some(2));
    }

    #[test]
    fn collecting_keeps_last_answer_per_question() {
        let sheet: AnswerSheet = [
            Answer::new(QuestionId::new(2), 1),
            Answer::new(QuestionId::new(1), 0),
            Answer::new(QuestionId::new(2), 3),
        ]
        .into_iter()
        .collect();

        assert_eq!(sheet.len(), 2);
        assert_eq!(sheet.selected_option(QuestionId::new(2)), Some(3));
    }
}

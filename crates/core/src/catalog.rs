use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

use crate::model::{ExamDefinition, ExamId};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("invalid catalog file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate exam id {0}")]
    DuplicateExam(ExamId),
}

/// Listing row for the catalog screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExamSummary {
    pub id: ExamId,
    pub title: String,
    pub total_questions: usize,
    pub time_limit_minutes: u32,
}

impl ExamSummary {
    #[must_use]
    pub fn from_exam(exam: &ExamDefinition) -> Self {
        Self {
            id: exam.id(),
            title: exam.title().to_owned(),
            total_questions: exam.question_count(),
            time_limit_minutes: exam.time_limit_minutes(),
        }
    }
}

/// Static, validated list of exams available for practice.
#[derive(Debug, Clone, Default)]
pub struct ExamCatalog {
    exams: Vec<Arc<ExamDefinition>>,
}

impl ExamCatalog {
    /// # Errors
    ///
    /// Returns `CatalogError::DuplicateExam` if two exams share an id.
    pub fn new(exams: Vec<ExamDefinition>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::with_capacity(exams.len());
        for exam in &exams {
            if !seen.insert(exam.id()) {
                return Err(CatalogError::DuplicateExam(exam.id()));
            }
        }
        Ok(Self {
            exams: exams.into_iter().map(Arc::new).collect(),
        })
    }

    /// Parse a JSON array of exams. Each exam is validated while deserializing.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Parse` for malformed or invalid exams and
    /// `CatalogError::DuplicateExam` for repeated ids.
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let exams: Vec<ExamDefinition> = serde_json::from_str(raw)?;
        Self::new(exams)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.exams.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exams.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: ExamId) -> Option<Arc<ExamDefinition>> {
        self.exams.iter().find(|e| e.id() == id).cloned()
    }

    #[must_use]
    pub fn list(&self) -> Vec<ExamSummary> {
        self.exams.iter().map(|e| ExamSummary::from_exam(e)).collect()
    }

    /// Case-insensitive substring match on the title. A blank query lists everything.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<ExamSummary> {
        let needle = query.trim().to_lowercase();
        self.exams
            .iter()
            .filter(|e| needle.is_empty() || e.title().to_lowercase().contains(&needle))
            .map(|e| ExamSummary::from_exam(e))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"[
        {
            "id": 1,
            "title": "AWS Certified Cloud Practitioner",
            "time_limit_minutes": 90,
            "questions": [
                { "id": 1, "text": "What is S3?", "options": ["Storage", "Compute"], "correct_answer": 0 }
            ]
        },
        {
            "id": 2,
            "title": "Azure Fundamentals AZ-900",
            "time_limit_minutes": 85,
            "questions": [
                { "id": 1, "text": "What is a VM?", "options": ["Storage", "Compute"], "correct_answer": 1 }
            ]
        }
    ]"#;

    #[test]
    fn search_is_case_insensitive() {
        let catalog = ExamCatalog::from_json(CATALOG).unwrap();
        let hits = catalog.search("aZuRe");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, ExamId::new(2));
        assert_eq!(hits[0].time_limit_minutes, 85);
    }

    #[test]
    fn blank_search_lists_everything() {
        let catalog = ExamCatalog::from_json(CATALOG).unwrap();
        assert_eq!(catalog.search("   ").len(), 2);
        assert_eq!(catalog.list(), catalog.search(""));
    }

    #[test]
    fn get_returns_shared_definition() {
        let catalog = ExamCatalog::from_json(CATALOG).unwrap();
        let exam = catalog.get(ExamId::new(1)).unwrap();
        assert_eq!(exam.question_count(), 1);
        assert!(catalog.get(ExamId::new(9)).is_none());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let raw = CATALOG.replace("\"id\": 2,", "\"id\": 1,");
        let err = ExamCatalog::from_json(&raw).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateExam(id) if id == ExamId::new(1)));
    }

    #[test]
    fn rejects_invalid_exam() {
        let raw = CATALOG.replace("\"time_limit_minutes\": 85", "\"time_limit_minutes\": 0");
        assert!(matches!(
            ExamCatalog::from_json(&raw).unwrap_err(),
            CatalogError::Parse(_)
        ));
    }
}

use exam_core::model::{CompletionReason, ExamId, ExamResult, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    answers_from_json, answers_to_json, db, exam_id_from_i64, id_to_i64, ser, u32_from_i64,
    user_id_from_i64,
};
use crate::repository::{ExamResultRepository, ExamResultRow, StorageError};

fn map_result_row(row: &sqlx::sqlite::SqliteRow) -> Result<ExamResultRow, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    let user_id = row
        .try_get::<Option<i64>, _>("user_id")
        .map_err(ser)?
        .map(user_id_from_i64)
        .transpose()?;
    let exam_id = exam_id_from_i64(row.try_get::<i64, _>("exam_id").map_err(ser)?)?;
    let answers = answers_from_json(&row.try_get::<String, _>("answers").map_err(ser)?)?;
    let elapsed_secs = u32_from_i64(
        "elapsed_secs",
        row.try_get::<i64, _>("elapsed_secs").map_err(ser)?,
    )?;
    let total_questions = u32_from_i64(
        "total_questions",
        row.try_get::<i64, _>("total_questions").map_err(ser)?,
    )?;
    let correct_answers = u32_from_i64(
        "correct_answers",
        row.try_get::<i64, _>("correct_answers").map_err(ser)?,
    )?;
    let score = u32_from_i64("score", row.try_get::<i64, _>("score").map_err(ser)?)?;
    let started_at = row.try_get("started_at").map_err(ser)?;
    let completed_at = row.try_get("completed_at").map_err(ser)?;
    let reason =
        CompletionReason::parse(&row.try_get::<String, _>("reason").map_err(ser)?).map_err(ser)?;

    let result = ExamResult::from_persisted(
        exam_id,
        answers,
        elapsed_secs,
        total_questions,
        correct_answers,
        score,
        started_at,
        completed_at,
        reason,
    )
    .map_err(ser)?;

    Ok(ExamResultRow::new(id, user_id, result))
}

#[async_trait::async_trait]
impl ExamResultRepository for SqliteRepository {
    async fn append_result(
        &self,
        user_id: Option<UserId>,
        result: &ExamResult,
    ) -> Result<i64, StorageError> {
        let user_id = user_id
            .map(|u| id_to_i64("user_id", u.value()))
            .transpose()?;
        let exam_id = id_to_i64("exam_id", result.exam_id().value())?;

        let res = sqlx::query(
            r"
                INSERT INTO exam_results (
                    user_id, exam_id, answers, elapsed_secs, total_questions,
                    correct_answers, score, started_at, completed_at, reason
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
        )
        .bind(user_id)
        .bind(exam_id)
        .bind(answers_to_json(result.answers())?)
        .bind(i64::from(result.elapsed_secs()))
        .bind(i64::from(result.total_questions()))
        .bind(i64::from(result.correct_answers()))
        .bind(i64::from(result.score()))
        .bind(result.started_at())
        .bind(result.completed_at())
        .bind(result.reason().as_str())
        .execute(&self.pool)
        .await
        .map_err(db)?;

        Ok(res.last_insert_rowid())
    }

    async fn get_result(&self, id: i64) -> Result<ExamResultRow, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    id, user_id, exam_id, answers, elapsed_secs, total_questions,
                    correct_answers, score, started_at, completed_at, reason
                FROM exam_results
                WHERE id = ?1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?
        .ok_or(StorageError::NotFound)?;

        map_result_row(&row)
    }

    async fn list_results(
        &self,
        user_id: Option<UserId>,
        exam_id: Option<ExamId>,
        limit: u32,
    ) -> Result<Vec<ExamResultRow>, StorageError> {
        let user_id = user_id
            .map(|u| id_to_i64("user_id", u.value()))
            .transpose()?;
        let exam_id = exam_id
            .map(|e| id_to_i64("exam_id", e.value()))
            .transpose()?;

        let rows = sqlx::query(
            r"
                SELECT
                    id, user_id, exam_id, answers, elapsed_secs, total_questions,
                    correct_answers, score, started_at, completed_at, reason
                FROM exam_results
                WHERE (?1 IS NULL OR user_id = ?1)
                  AND (?2 IS NULL OR exam_id = ?2)
                ORDER BY completed_at DESC, id DESC
                LIMIT ?3
            ",
        )
        .bind(user_id)
        .bind(exam_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;

        rows.iter().map(map_result_row).collect()
    }
}

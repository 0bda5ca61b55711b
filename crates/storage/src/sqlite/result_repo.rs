use quiz_core::model::{TestResult, UserId};

use super::{
    SqliteRepository,
    mapping::{answers_to_json, map_result_row, map_result_row_with_id},
};
use crate::repository::{ResultRepository, StorageError, TestResultRow};

#[async_trait::async_trait]
impl ResultRepository for SqliteRepository {
    async fn append_result(&self, result: &TestResult) -> Result<i64, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO test_results (
                test_id, user_id, score, total_questions, correct_count,
                time_taken_seconds, answers, completed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(result.test_id().to_string())
        .bind(result.user_id().to_string())
        .bind(i64::from(result.score()))
        .bind(i64::from(result.total_questions()))
        .bind(i64::from(result.correct_count()))
        .bind(i64::from(result.time_taken_seconds()))
        .bind(answers_to_json(result.answers())?)
        .bind(result.completed_at())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(res.last_insert_rowid())
    }

    async fn get_result(&self, id: i64) -> Result<TestResult, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                id, test_id, user_id, score, total_questions, correct_count,
                time_taken_seconds, answers, completed_at
            FROM test_results
            WHERE id = ?1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        map_result_row(&row)
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<TestResultRow>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                id, test_id, user_id, score, total_questions, correct_count,
                time_taken_seconds, answers, completed_at
            FROM test_results
            WHERE user_id = ?1
            ORDER BY completed_at DESC, id DESC
            LIMIT ?2
            ",
        )
        .bind(user_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_result_row_with_id(&row)?);
        }
        Ok(out)
    }
}

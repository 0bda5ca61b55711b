use quiz_core::model::{Test, TestId};

use super::{SqliteRepository, mapping::map_test_row};
use crate::repository::{StorageError, TestRepository};

#[async_trait::async_trait]
impl TestRepository for SqliteRepository {
    async fn upsert_test(&self, test: &Test) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO tests (
                id, subject_id, title, description, difficulty,
                time_limit_minutes, question_count, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                -- keep created_at from the original insert; only update mutable fields
                subject_id = excluded.subject_id,
                title = excluded.title,
                description = excluded.description,
                difficulty = excluded.difficulty,
                time_limit_minutes = excluded.time_limit_minutes,
                question_count = excluded.question_count
            ",
        )
        .bind(test.id().to_string())
        .bind(test.subject_id().to_string())
        .bind(test.title())
        .bind(test.description())
        .bind(test.difficulty().as_str())
        .bind(i64::from(test.time_limit_minutes()))
        .bind(i64::from(test.question_count()))
        .bind(test.created_at())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn get_test(&self, id: TestId) -> Result<Test, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                id, subject_id, title, description, difficulty,
                time_limit_minutes, question_count, created_at
            FROM tests
            WHERE id = ?1
            ",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        map_test_row(&row)
    }
}

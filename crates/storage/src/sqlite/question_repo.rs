use quiz_core::model::{Question, TestId};

use super::{
    SqliteRepository,
    mapping::{map_question_row, options_to_json, ser},
};
use crate::repository::{QuestionRepository, StorageError};

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let correct = i64::try_from(question.correct_option()).map_err(ser)?;

        sqlx::query(
            r"
            INSERT INTO questions (
                id, test_id, prompt, options, correct_option, explanation, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                test_id = excluded.test_id,
                prompt = excluded.prompt,
                options = excluded.options,
                correct_option = excluded.correct_option,
                explanation = excluded.explanation
            ",
        )
        .bind(question.id().to_string())
        .bind(question.test_id().to_string())
        .bind(question.prompt())
        .bind(options_to_json(question.options())?)
        .bind(correct)
        .bind(question.explanation())
        .bind(question.created_at())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn list_for_test(&self, test_id: TestId) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                id, test_id, prompt, options, correct_option, explanation, created_at
            FROM questions
            WHERE test_id = ?1
            ORDER BY created_at ASC, id ASC
            ",
        )
        .bind(test_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut questions = Vec::with_capacity(rows.len());
        for row in rows {
            questions.push(map_question_row(&row)?);
        }
        Ok(questions)
    }
}

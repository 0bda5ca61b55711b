use quiz_core::model::{ProfileStats, UserId};
use sqlx::Row;

use super::{SqliteRepository, mapping::ser};
use crate::repository::{ProfileRepository, StorageError};

#[async_trait::async_trait]
impl ProfileRepository for SqliteRepository {
    async fn get_stats(&self, user_id: UserId) -> Result<ProfileStats, StorageError> {
        let row = sqlx::query(
            r"
            SELECT total_score, tests_taken
            FROM profiles
            WHERE user_id = ?1
            ",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        Ok(ProfileStats::new(
            user_id,
            row.try_get("total_score").map_err(ser)?,
            row.try_get("tests_taken").map_err(ser)?,
        ))
    }

    async fn increment_stats(
        &self,
        user_id: UserId,
        score_delta: u8,
    ) -> Result<ProfileStats, StorageError> {
        // One statement upsert-and-increment keeps the read-modify-write atomic.
        let row = sqlx::query(
            r"
            INSERT INTO profiles (user_id, total_score, tests_taken)
            VALUES (?1, ?2, 1)
            ON CONFLICT(user_id) DO UPDATE SET
                total_score = total_score + excluded.total_score,
                tests_taken = tests_taken + 1
            RETURNING total_score, tests_taken
            ",
        )
        .bind(user_id.to_string())
        .bind(i64::from(score_delta))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(ProfileStats::new(
            user_id,
            row.try_get("total_score").map_err(ser)?,
            row.try_get("tests_taken").map_err(ser)?,
        ))
    }
}

use std::collections::HashMap;

use quiz_core::model::{Difficulty, Question, QuestionId, Test, TestId, TestResult, UserId};
use sqlx::Row;

use crate::repository::{StorageError, TestResultRow};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn test_id_from_str(s: &str) -> Result<TestId, StorageError> {
    s.parse().map_err(ser)
}

pub(crate) fn question_id_from_str(s: &str) -> Result<QuestionId, StorageError> {
    s.parse().map_err(ser)
}

pub(crate) fn user_id_from_str(s: &str) -> Result<UserId, StorageError> {
    s.parse().map_err(ser)
}

pub(crate) fn usize_from_i64(field: &'static str, v: i64) -> Result<usize, StorageError> {
    usize::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

/// JSON codec for the ordered option list column.
pub(crate) fn options_to_json(options: &[String]) -> Result<String, StorageError> {
    serde_json::to_string(options).map_err(ser)
}

pub(crate) fn options_from_json(raw: &str) -> Result<Vec<String>, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

/// JSON codec for the answer-map column (question UUID -> chosen option).
pub(crate) fn answers_to_json(answers: &HashMap<QuestionId, usize>) -> Result<String, StorageError> {
    serde_json::to_string(answers).map_err(ser)
}

pub(crate) fn answers_from_json(raw: &str) -> Result<HashMap<QuestionId, usize>, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn parse_difficulty(s: &str) -> Result<Difficulty, StorageError> {
    Difficulty::parse(s)
        .ok_or_else(|| StorageError::Serialization(format!("invalid difficulty: {s}")))
}

pub(crate) fn map_test_row(row: &sqlx::sqlite::SqliteRow) -> Result<Test, StorageError> {
    let difficulty_str: String = row.try_get("difficulty").map_err(ser)?;

    Test::new(
        test_id_from_str(row.try_get::<String, _>("id").map_err(ser)?.as_str())?,
        row.try_get::<String, _>("subject_id")
            .map_err(ser)?
            .parse()
            .map_err(ser)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get::<Option<String>, _>("description").map_err(ser)?,
        parse_difficulty(difficulty_str.as_str())?,
        u32_from_i64(
            "time_limit_minutes",
            row.try_get::<i64, _>("time_limit_minutes").map_err(ser)?,
        )?,
        u32_from_i64(
            "question_count",
            row.try_get::<i64, _>("question_count").map_err(ser)?,
        )?,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, StorageError> {
    let options_raw: String = row.try_get("options").map_err(ser)?;

    Question::from_persisted(
        question_id_from_str(row.try_get::<String, _>("id").map_err(ser)?.as_str())?,
        test_id_from_str(row.try_get::<String, _>("test_id").map_err(ser)?.as_str())?,
        row.try_get::<String, _>("prompt").map_err(ser)?,
        options_from_json(options_raw.as_str())?,
        usize_from_i64(
            "correct_option",
            row.try_get::<i64, _>("correct_option").map_err(ser)?,
        )?,
        row.try_get::<Option<String>, _>("explanation").map_err(ser)?,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_result_row(row: &sqlx::sqlite::SqliteRow) -> Result<TestResult, StorageError> {
    let answers_raw: String = row.try_get("answers").map_err(ser)?;
    let score_i64: i64 = row.try_get("score").map_err(ser)?;
    let score = u16::try_from(score_i64)
        .map_err(|_| StorageError::Serialization(format!("invalid score: {score_i64}")))?;

    TestResult::from_persisted(
        test_id_from_str(row.try_get::<String, _>("test_id").map_err(ser)?.as_str())?,
        user_id_from_str(row.try_get::<String, _>("user_id").map_err(ser)?.as_str())?,
        score,
        u32_from_i64(
            "total_questions",
            row.try_get::<i64, _>("total_questions").map_err(ser)?,
        )?,
        u32_from_i64(
            "correct_count",
            row.try_get::<i64, _>("correct_count").map_err(ser)?,
        )?,
        u32_from_i64(
            "time_taken_seconds",
            row.try_get::<i64, _>("time_taken_seconds").map_err(ser)?,
        )?,
        answers_from_json(answers_raw.as_str())?,
        row.try_get("completed_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_result_row_with_id(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<TestResultRow, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    let result = map_result_row(row)?;
    Ok(TestResultRow::new(id, result))
}

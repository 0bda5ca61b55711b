use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use quiz_core::model::{ProfileStats, Question, QuestionId, Test, TestId, TestResult, UserId};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A persisted result together with its storage-assigned row id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResultRow {
    pub id: i64,
    pub result: TestResult,
}

impl TestResultRow {
    #[must_use]
    pub fn new(id: i64, result: TestResult) -> Self {
        Self { id, result }
    }
}

/// Repository contract for tests (the quiz definitions, not their content
/// management surface — create/edit screens live outside this system).
#[async_trait]
pub trait TestRepository: Send + Sync {
    /// Persist or update a test.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the test cannot be stored.
    async fn upsert_test(&self, test: &Test) -> Result<(), StorageError>;

    /// Fetch a test by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_test(&self, id: TestId) -> Result<Test, StorageError>;
}

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Persist or update a question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError>;

    /// Fetch all questions of a test in a stable order.
    ///
    /// The order is `(created_at, id)` ascending and is authoritative for
    /// session navigation: the sequence fetched at session open must not
    /// change for the session's lifetime, so callers fetch exactly once.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on query failures. An empty list is not an
    /// error here; the session layer decides what an empty set means.
    async fn list_for_test(&self, test_id: TestId) -> Result<Vec<Question>, StorageError>;
}

#[async_trait]
pub trait ResultRepository: Send + Sync {
    /// Append one finished result and return its storage-assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the result cannot be stored.
    async fn append_result(&self, result: &TestResult) -> Result<i64, StorageError>;

    /// Fetch a result by its storage id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_result(&self, id: i64) -> Result<TestResult, StorageError>;

    /// A user's results, newest first, capped by `limit`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on query failures.
    async fn list_for_user(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<TestResultRow>, StorageError>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Fetch a user's ranking aggregate.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user has no profile row yet.
    async fn get_stats(&self, user_id: UserId) -> Result<ProfileStats, StorageError>;

    /// Atomically add `score_delta` to the total score and bump tests-taken
    /// by one, creating the row if absent. Returns the updated aggregate.
    ///
    /// The read-modify-write happens inside the store, so two finalizing
    /// sessions can never lose an increment to each other.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the update cannot be applied.
    async fn increment_stats(
        &self,
        user_id: UserId,
        score_delta: u8,
    ) -> Result<ProfileStats, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    tests: Arc<Mutex<HashMap<TestId, Test>>>,
    questions: Arc<Mutex<HashMap<QuestionId, Question>>>,
    results: Arc<Mutex<Vec<TestResult>>>,
    profiles: Arc<Mutex<HashMap<UserId, ProfileStats>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl TestRepository for InMemoryRepository {
    async fn upsert_test(&self, test: &Test) -> Result<(), StorageError> {
        let mut guard = self.tests.lock().map_err(poisoned)?;
        guard.insert(test.id(), test.clone());
        Ok(())
    }

    async fn get_test(&self, id: TestId) -> Result<Test, StorageError> {
        let guard = self.tests.lock().map_err(poisoned)?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let mut guard = self.questions.lock().map_err(poisoned)?;
        guard.insert(question.id(), question.clone());
        Ok(())
    }

    async fn list_for_test(&self, test_id: TestId) -> Result<Vec<Question>, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        let mut questions: Vec<Question> = guard
            .values()
            .filter(|q| q.test_id() == test_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| (q.created_at(), q.id()));
        Ok(questions)
    }
}

#[async_trait]
impl ResultRepository for InMemoryRepository {
    async fn append_result(&self, result: &TestResult) -> Result<i64, StorageError> {
        let mut guard = self.results.lock().map_err(poisoned)?;
        guard.push(result.clone());
        i64::try_from(guard.len())
            .map_err(|_| StorageError::Serialization("result id overflow".into()))
    }

    async fn get_result(&self, id: i64) -> Result<TestResult, StorageError> {
        let guard = self.results.lock().map_err(poisoned)?;
        let index = usize::try_from(id.checked_sub(1).ok_or(StorageError::NotFound)?)
            .map_err(|_| StorageError::NotFound)?;
        guard.get(index).cloned().ok_or(StorageError::NotFound)
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<TestResultRow>, StorageError> {
        let guard = self.results.lock().map_err(poisoned)?;
        let mut rows: Vec<TestResultRow> = guard
            .iter()
            .enumerate()
            .filter(|(_, r)| r.user_id() == user_id)
            .map(|(i, r)| TestResultRow::new(i as i64 + 1, r.clone()))
            .collect();
        rows.sort_by_key(|row| std::cmp::Reverse((row.result.completed_at(), row.id)));
        rows.truncate(limit as usize);
        Ok(rows)
    }
}

#[async_trait]
impl ProfileRepository for InMemoryRepository {
    async fn get_stats(&self, user_id: UserId) -> Result<ProfileStats, StorageError> {
        let guard = self.profiles.lock().map_err(poisoned)?;
        guard.get(&user_id).cloned().ok_or(StorageError::NotFound)
    }

    async fn increment_stats(
        &self,
        user_id: UserId,
        score_delta: u8,
    ) -> Result<ProfileStats, StorageError> {
        let mut guard = self.profiles.lock().map_err(poisoned)?;
        let current = guard
            .entry(user_id)
            .or_insert_with(|| ProfileStats::empty(user_id));
        *current = ProfileStats::new(
            user_id,
            current.total_score() + i64::from(score_delta),
            current.tests_taken() + 1,
        );
        Ok(current.clone())
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub tests: Arc<dyn TestRepository>,
    pub questions: Arc<dyn QuestionRepository>,
    pub results: Arc<dyn ResultRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            tests: Arc::new(repo.clone()),
            questions: Arc::new(repo.clone()),
            results: Arc::new(repo.clone()),
            profiles: Arc::new(repo),
        }
    }
}

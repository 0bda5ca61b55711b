use chrono::{DateTime, Utc};

use quiz_core::model::{Test, TestId, UserId};
use storage::repository::{QuestionRepository, TestRepository};

use super::service::SessionService;
use crate::error::SessionError;

/// Storage-backed session construction.
pub struct SessionQueries;

impl SessionQueries {
    /// Load a test and its ordered questions, then open a session over them.
    ///
    /// The question sequence is fetched exactly once here; a concurrent
    /// content edit must not reorder a session already in flight.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` for fetch failures and
    /// `SessionError::EmptyQuestionSet` for a test without questions.
    pub async fn start_from_storage(
        test_id: TestId,
        user_id: UserId,
        tests: &dyn TestRepository,
        questions: &dyn QuestionRepository,
        now: DateTime<Utc>,
    ) -> Result<(Test, SessionService), SessionError> {
        let test = tests.get_test(test_id).await?;
        let question_list = questions.list_for_test(test_id).await?;
        let session = SessionService::new(test.clone(), user_id, question_list, now)?;
        Ok((test, session))
    }
}

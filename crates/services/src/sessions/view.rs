use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use quiz_core::model::{Question, QuestionId, TestId, TestResult, UserId};
use storage::repository::ResultRepository;

use crate::error::SessionError;

/// Storage identifier for a persisted test result.
///
/// NOTE: This is currently `i64` to match `SQLite` row IDs.
pub type TestResultId = i64;

/// Per-question line of the post-finish review breakdown.
///
/// Pure derived data: recomputable any number of times from the immutable
/// answer map once the session is finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionReview {
    pub question_id: QuestionId,
    pub prompt: String,
    pub options: Vec<String>,
    /// Chosen option index; `None` means the question went unanswered.
    pub chosen: Option<usize>,
    pub correct_option: usize,
    pub is_correct: bool,
    pub explanation: Option<String>,
}

impl QuestionReview {
    #[must_use]
    pub fn from_question(question: &Question, chosen: Option<usize>) -> Self {
        Self {
            question_id: question.id(),
            prompt: question.prompt().to_owned(),
            options: question.options().to_vec(),
            chosen,
            correct_option: question.correct_option(),
            is_correct: chosen.is_some_and(|c| question.is_correct(c)),
            explanation: question.explanation().map(str::to_owned),
        }
    }

    /// The text of the chosen option, if one was chosen in bounds.
    #[must_use]
    pub fn chosen_text(&self) -> Option<&str> {
        self.chosen.and_then(|c| self.options.get(c)).map(String::as_str)
    }
}

/// Builds the review breakdown in session question order.
#[must_use]
pub fn review_breakdown(
    questions: &[Question],
    answers: &HashMap<QuestionId, usize>,
) -> Vec<QuestionReview> {
    questions
        .iter()
        .map(|q| QuestionReview::from_question(q, answers.get(&q.id()).copied()))
        .collect()
}

/// Presentation-agnostic list item for a past result.
///
/// This is intentionally **not** a UI view-model:
/// - no pre-formatted strings
/// - no localization assumptions
///
/// The UI may format timestamps and the time-taken value as needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultListItem {
    pub id: TestResultId,
    pub test_id: TestId,
    pub score: u8,
    pub total_questions: u32,
    pub correct_count: u32,
    pub time_taken_seconds: u32,
    pub completed_at: DateTime<Utc>,
}

impl ResultListItem {
    #[must_use]
    pub fn from_result(id: TestResultId, result: &TestResult) -> Self {
        Self {
            id,
            test_id: result.test_id(),
            score: result.score(),
            total_questions: result.total_questions(),
            correct_count: result.correct_count(),
            time_taken_seconds: result.time_taken_seconds(),
            completed_at: result.completed_at(),
        }
    }
}

/// Read-side facade over persisted results, hiding the repository from the UI.
#[derive(Clone)]
pub struct ResultHistoryService {
    results: Arc<dyn ResultRepository>,
}

impl ResultHistoryService {
    #[must_use]
    pub fn new(results: Arc<dyn ResultRepository>) -> Self {
        Self { results }
    }

    /// A user's results, newest first.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on query failures.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<ResultListItem>, SessionError> {
        let rows = self.results.list_for_user(user_id, limit).await?;
        Ok(rows
            .iter()
            .map(|row| ResultListItem::from_result(row.id, &row.result))
            .collect())
    }

    /// Fetch a single persisted result.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` (`NotFound`) if the id is unknown.
    pub async fn get(&self, id: TestResultId) -> Result<TestResult, SessionError> {
        Ok(self.results.get_result(id).await?)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::time::fixed_now;

    fn build_question(correct: usize, explanation: Option<&str>) -> Question {
        Question::new(
            QuestionId::generate(),
            TestId::generate(),
            "Prompt",
            vec!["a".into(), "b".into(), "c".into()],
            correct,
            explanation.map(str::to_owned),
            fixed_now(),
        )
        .unwrap()
    }

    #[test]
    fn breakdown_marks_correct_wrong_and_unanswered() {
        let questions = vec![
            build_question(0, Some("why")),
            build_question(1, None),
            build_question(2, None),
        ];
        let mut answers = HashMap::new();
        answers.insert(questions[0].id(), 0); // correct
        answers.insert(questions[1].id(), 2); // wrong

        let breakdown = review_breakdown(&questions, &answers);
        assert_eq!(breakdown.len(), 3);

        assert!(breakdown[0].is_correct);
        assert_eq!(breakdown[0].chosen_text(), Some("a"));
        assert_eq!(breakdown[0].explanation.as_deref(), Some("why"));

        assert!(!breakdown[1].is_correct);
        assert_eq!(breakdown[1].chosen, Some(2));

        assert!(!breakdown[2].is_correct);
        assert_eq!(breakdown[2].chosen, None);
        assert_eq!(breakdown[2].chosen_text(), None);
    }

    #[test]
    fn breakdown_preserves_question_order() {
        let questions: Vec<_> = (0..4).map(|_| build_question(0, None)).collect();
        let breakdown = review_breakdown(&questions, &HashMap::new());
        let ids: Vec<_> = breakdown.iter().map(|r| r.question_id).collect();
        let expected: Vec<_> = questions.iter().map(Question::id).collect();
        assert_eq!(ids, expected);
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::model::{Question, QuestionId, Test, TestId, UserId};
use crate::scoring;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResultError {
    #[error("cannot build a result from an empty question set")]
    EmptyQuestionSet,

    #[error("too many questions for a single result: {len}")]
    TooManyQuestions { len: usize },

    #[error("correct count ({correct}) exceeds total questions ({total})")]
    CountMismatch { correct: u32, total: u32 },

    #[error("score {score} is outside 0..=100")]
    ScoreOutOfRange { score: u16 },
}

/// The persisted outcome of one finished session.
///
/// Built exactly once per session via [`TestResult::from_answers`]; the
/// answer map is copied in so the review breakdown can be recomputed any
/// number of times after finish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    test_id: TestId,
    user_id: UserId,
    score: u8,
    total_questions: u32,
    correct_count: u32,
    time_taken_seconds: u32,
    answers: HashMap<QuestionId, usize>,
    completed_at: DateTime<Utc>,
}

impl TestResult {
    /// Score a finished session's answer map against its question sequence.
    ///
    /// `remaining_at_finish` is the countdown value when the session ended;
    /// elapsed time is clamped into `[0, limit]` (a timer-triggered finish
    /// with zero remaining yields the full limit).
    ///
    /// # Errors
    ///
    /// Returns `ResultError::EmptyQuestionSet` if `questions` is empty. The
    /// session constructor already refuses empty sets, so hitting this
    /// indicates a caller bug rather than user input.
    pub fn from_answers(
        test: &Test,
        user_id: UserId,
        questions: &[Question],
        answers: HashMap<QuestionId, usize>,
        remaining_at_finish: u32,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, ResultError> {
        if questions.is_empty() {
            return Err(ResultError::EmptyQuestionSet);
        }
        let total_questions = u32::try_from(questions.len())
            .map_err(|_| ResultError::TooManyQuestions { len: questions.len() })?;

        let correct_count = scoring::count_correct(questions, &answers);
        let score = scoring::score_percent(correct_count, total_questions);
        let time_taken_seconds =
            scoring::elapsed_seconds(test.time_limit_seconds(), remaining_at_finish);

        Ok(Self {
            test_id: test.id(),
            user_id,
            score,
            total_questions,
            correct_count,
            time_taken_seconds,
            answers,
            completed_at,
        })
    }

    /// Rehydrate a result from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ResultError` if the stored counts or score are inconsistent.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        test_id: TestId,
        user_id: UserId,
        score: u16,
        total_questions: u32,
        correct_count: u32,
        time_taken_seconds: u32,
        answers: HashMap<QuestionId, usize>,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, ResultError> {
        if correct_count > total_questions {
            return Err(ResultError::CountMismatch {
                correct: correct_count,
                total: total_questions,
            });
        }
        let score = u8::try_from(score)
            .ok()
            .filter(|s| *s <= 100)
            .ok_or(ResultError::ScoreOutOfRange { score })?;

        Ok(Self {
            test_id,
            user_id,
            score,
            total_questions,
            correct_count,
            time_taken_seconds,
            answers,
            completed_at,
        })
    }

    #[must_use]
    pub fn test_id(&self) -> TestId {
        self.test_id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Percentage score in `0..=100`.
    #[must_use]
    pub fn score(&self) -> u8 {
        self.score
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn incorrect_count(&self) -> u32 {
        self.total_questions - self.correct_count
    }

    #[must_use]
    pub fn time_taken_seconds(&self) -> u32 {
        self.time_taken_seconds
    }

    /// The chosen option for a question, if it was answered.
    #[must_use]
    pub fn answer_for(&self, question_id: QuestionId) -> Option<usize> {
        self.answers.get(&question_id).copied()
    }

    #[must_use]
    pub fn answers(&self) -> &HashMap<QuestionId, usize> {
        &self.answers
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, SubjectId};
    use crate::time::fixed_now;

    fn build_test() -> Test {
        Test::new(
            TestId::generate(),
            SubjectId::generate(),
            "Test",
            None,
            Difficulty::Easy,
            10,
            4,
            fixed_now(),
        )
        .unwrap()
    }

    fn question(test_id: TestId, correct_option: usize) -> Question {
        Question::new(
            QuestionId::generate(),
            test_id,
            "Q",
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_option,
            None,
            fixed_now(),
        )
        .unwrap()
    }

    #[test]
    fn scores_partial_answer_map() {
        // Scenario A: 4 questions, 2 correct, 1 wrong, 1 unanswered.
        let test = build_test();
        let questions: Vec<_> = (0..4).map(|i| question(test.id(), i % 4)).collect();
        let mut answers = HashMap::new();
        answers.insert(questions[0].id(), 0); // correct
        answers.insert(questions[1].id(), 3); // wrong
        answers.insert(questions[2].id(), 2); // correct

        let result = TestResult::from_answers(
            &test,
            UserId::generate(),
            &questions,
            answers,
            540,
            fixed_now(),
        )
        .unwrap();

        assert_eq!(result.score(), 50);
        assert_eq!(result.total_questions(), 4);
        assert_eq!(result.correct_count(), 2);
        assert_eq!(result.incorrect_count(), 2);
        assert_eq!(result.time_taken_seconds(), 60);
    }

    #[test]
    fn zero_remaining_means_full_limit_elapsed() {
        let test = build_test();
        let questions = vec![question(test.id(), 0)];
        let result = TestResult::from_answers(
            &test,
            UserId::generate(),
            &questions,
            HashMap::new(),
            0,
            fixed_now(),
        )
        .unwrap();

        assert_eq!(result.time_taken_seconds(), test.time_limit_seconds());
        assert_eq!(result.score(), 0);
    }

    #[test]
    fn empty_question_set_is_rejected() {
        let test = build_test();
        let err = TestResult::from_answers(
            &test,
            UserId::generate(),
            &[],
            HashMap::new(),
            600,
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, ResultError::EmptyQuestionSet);
    }

    #[test]
    fn persisted_counts_must_align() {
        let err = TestResult::from_persisted(
            TestId::generate(),
            UserId::generate(),
            50,
            2,
            3,
            10,
            HashMap::new(),
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, ResultError::CountMismatch { correct: 3, total: 2 });
    }

    #[test]
    fn persisted_score_must_fit_percentage() {
        let err = TestResult::from_persisted(
            TestId::generate(),
            UserId::generate(),
            120,
            4,
            2,
            10,
            HashMap::new(),
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, ResultError::ScoreOutOfRange { score: 120 });
    }
}

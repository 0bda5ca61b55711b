use serde::{Deserialize, Serialize};

use crate::model::{TestResult, UserId};

/// A user's running ranking aggregate: total score and tests taken.
///
/// Owned by the identity side of the system; the session engine's only
/// contract with it is "add one result's score, increment tests taken" —
/// exactly once per result. The storage layer applies that increment
/// atomically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStats {
    user_id: UserId,
    total_score: i64,
    tests_taken: i64,
}

impl ProfileStats {
    #[must_use]
    pub fn new(user_id: UserId, total_score: i64, tests_taken: i64) -> Self {
        Self {
            user_id,
            total_score,
            tests_taken,
        }
    }

    /// Fresh aggregate for a user with no results yet.
    #[must_use]
    pub fn empty(user_id: UserId) -> Self {
        Self::new(user_id, 0, 0)
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn total_score(&self) -> i64 {
        self.total_score
    }

    #[must_use]
    pub fn tests_taken(&self) -> i64 {
        self.tests_taken
    }

    /// The aggregate after absorbing one result.
    #[must_use]
    pub fn apply_result(&self, result: &TestResult) -> Self {
        Self {
            user_id: self.user_id,
            total_score: self.total_score + i64::from(result.score()),
            tests_taken: self.tests_taken + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, Question, QuestionId, SubjectId, Test, TestId};
    use crate::time::fixed_now;
    use std::collections::HashMap;

    #[test]
    fn apply_result_adds_score_and_count() {
        let test = Test::new(
            TestId::generate(),
            SubjectId::generate(),
            "T",
            None,
            Difficulty::Easy,
            5,
            1,
            fixed_now(),
        )
        .unwrap();
        let question = Question::new(
            QuestionId::generate(),
            test.id(),
            "Q",
            vec!["a".into(), "b".into()],
            0,
            None,
            fixed_now(),
        )
        .unwrap();
        let user = UserId::generate();
        let mut answers = HashMap::new();
        answers.insert(question.id(), 0);
        let result = TestResult::from_answers(
            &test,
            user,
            std::slice::from_ref(&question),
            answers,
            200,
            fixed_now(),
        )
        .unwrap();

        let stats = ProfileStats::new(user, 140, 3).apply_result(&result);
        assert_eq!(stats.total_score(), 240);
        assert_eq!(stats.tests_taken(), 4);
    }
}

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

use quiz_core::model::{Question, QuestionId, Test, TestResult, UserId};

use super::progress::SessionProgress;
use crate::error::SessionError;

/// Outcome of one countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still counting down; carries the remaining seconds after the tick.
    Running(u32),
    /// This tick brought the countdown to zero: the deadline is reached and
    /// the caller must trigger finalize.
    Expired,
    /// The session is already finished; the tick changed nothing.
    Stopped,
}

/// One user's in-progress attempt at a test.
///
/// Owns the current-question index, the answer map and the countdown, and
/// enforces the one-way Active -> Finished transition. The question sequence
/// is fixed at construction: whatever order the storage layer returned at
/// open is authoritative for navigation indices until the session ends.
pub struct SessionService {
    test: Test,
    user_id: UserId,
    questions: Vec<Question>,
    current: usize,
    answers: HashMap<QuestionId, usize>,
    remaining_seconds: u32,
    started_at: DateTime<Utc>,
    finished: bool,
    // retained finalize state, written once by the workflow
    result: Option<TestResult>,
    result_id: Option<i64>,
    profile_applied: bool,
}

impl SessionService {
    /// Open a session over a fetched question sequence.
    ///
    /// The countdown starts at the test's full time limit.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyQuestionSet` if `questions` is empty.
    /// That is a terminal no-content state, not a failure to escalate: the
    /// caller must not start a timer for it.
    pub fn new(
        test: Test,
        user_id: UserId,
        questions: Vec<Question>,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::EmptyQuestionSet);
        }

        let remaining_seconds = test.time_limit_seconds();
        Ok(Self {
            test,
            user_id,
            questions,
            current: 0,
            answers: HashMap::new(),
            remaining_seconds,
            started_at,
            finished: false,
            result: None,
            result_id: None,
            profile_applied: false,
        })
    }

    #[must_use]
    pub fn test(&self) -> &Test {
        &self.test
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Total number of questions in this session.
    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> &Question {
        // current is clamped to [0, len) and len > 0 by construction
        &self.questions[self.current]
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    #[must_use]
    pub fn time_limit_seconds(&self) -> u32 {
        self.test.time_limit_seconds()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[must_use]
    pub fn answers(&self) -> &HashMap<QuestionId, usize> {
        &self.answers
    }

    /// The chosen option for a question, if any.
    #[must_use]
    pub fn answer_for(&self, question_id: QuestionId) -> Option<usize> {
        self.answers.get(&question_id).copied()
    }

    #[must_use]
    pub fn is_answered(&self, question_id: QuestionId) -> bool {
        self.answers.contains_key(&question_id)
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    /// Record (or overwrite) the answer for a question.
    ///
    /// Re-answering is always allowed before finish; only the last choice
    /// counts. The option index is bounds-checked against that question's
    /// option list and an out-of-bounds choice leaves the map untouched.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyFinished`, `UnknownQuestion` or `InvalidOptionIndex`;
    /// none of them change session state.
    pub fn select_answer(
        &mut self,
        question_id: QuestionId,
        option_index: usize,
    ) -> Result<(), SessionError> {
        if self.finished {
            return Err(SessionError::AlreadyFinished);
        }
        let question = self
            .questions
            .iter()
            .find(|q| q.id() == question_id)
            .ok_or(SessionError::UnknownQuestion)?;
        if option_index >= question.option_count() {
            return Err(SessionError::InvalidOptionIndex {
                chosen: option_index,
                options: question.option_count(),
            });
        }

        self.answers.insert(question_id, option_index);
        Ok(())
    }

    /// Move to the next question; no-op at the last question or after finish.
    pub fn go_next(&mut self) {
        if !self.finished && self.current + 1 < self.questions.len() {
            self.current += 1;
        }
    }

    /// Move to the previous question; no-op at the first question or after finish.
    pub fn go_previous(&mut self) {
        if !self.finished && self.current > 0 {
            self.current -= 1;
        }
    }

    /// Returns a summary of the current session progress.
    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            total: self.total_questions(),
            position: self.current + 1,
            answered: self.answered_count(),
            is_finished: self.finished,
        }
    }

    /// Apply one whole-second countdown tick.
    ///
    /// Remaining seconds decrease by exactly 1 down to a floor of 0; the
    /// tick that reaches 0 reports `Expired` so the caller triggers the
    /// finalize path. Ticks arriving after finish report `Stopped` and
    /// mutate nothing.
    pub fn tick(&mut self) -> TickOutcome {
        if self.finished {
            return TickOutcome::Stopped;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            TickOutcome::Expired
        } else {
            TickOutcome::Running(self.remaining_seconds)
        }
    }

    /// Atomically check-and-flip the Active -> Finished transition.
    ///
    /// Whichever trigger (explicit finish or timer expiry) calls this first
    /// wins and receives the countdown value at finish; the loser observes
    /// `AlreadyFinished` and must not re-score. No transition ever leaves
    /// Finished.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyFinished` on a duplicate trigger.
    pub fn begin_finish(&mut self) -> Result<u32, SessionError> {
        if self.finished {
            return Err(SessionError::AlreadyFinished);
        }
        self.finished = true;
        Ok(self.remaining_seconds)
    }

    /// The result computed at finish, retained for replay and manual retry.
    #[must_use]
    pub fn result(&self) -> Option<&TestResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn result_id(&self) -> Option<i64> {
        self.result_id
    }

    #[must_use]
    pub fn profile_applied(&self) -> bool {
        self.profile_applied
    }

    pub(crate) fn set_result(&mut self, result: TestResult) {
        self.result = Some(result);
    }

    pub(crate) fn set_result_id(&mut self, id: i64) {
        self.result_id = Some(id);
    }

    pub(crate) fn set_profile_applied(&mut self) {
        self.profile_applied = true;
    }
}

impl fmt::Debug for SessionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionService")
            .field("test_id", &self.test.id())
            .field("user_id", &self.user_id)
            .field("questions_len", &self.questions.len())
            .field("current", &self.current)
            .field("answered", &self.answers.len())
            .field("remaining_seconds", &self.remaining_seconds)
            .field("finished", &self.finished)
            .field("result_id", &self.result_id)
            .finish_non_exhaustive()
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

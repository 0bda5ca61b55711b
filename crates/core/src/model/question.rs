use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{QuestionId, TestId};

/// Allowed option counts for a multiple-choice question.
pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 6;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question prompt must not be empty")]
    EmptyPrompt,

    #[error("question must have between {MIN_OPTIONS} and {MAX_OPTIONS} options, got {len}")]
    InvalidOptionCount { len: usize },

    #[error("option {index} must not be empty")]
    EmptyOption { index: usize },

    #[error("correct option {correct} is out of bounds for {len} options")]
    CorrectOptionOutOfBounds { correct: usize, len: usize },
}

/// A single multiple-choice question belonging to a test.
///
/// Immutable once constructed; the correct-option index is guaranteed to be
/// a valid index into `options`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    id: QuestionId,
    test_id: TestId,
    prompt: String,
    options: Vec<String>,
    correct_option: usize,
    explanation: Option<String>,
    created_at: DateTime<Utc>,
}

impl Question {
    /// Create a validated question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when the prompt or an option is empty, the
    /// option count falls outside `MIN_OPTIONS..=MAX_OPTIONS`, or the
    /// correct-option index does not point into `options`.
    pub fn new(
        id: QuestionId,
        test_id: TestId,
        prompt: impl Into<String>,
        options: Vec<String>,
        correct_option: usize,
        explanation: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, QuestionError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if options.len() < MIN_OPTIONS || options.len() > MAX_OPTIONS {
            return Err(QuestionError::InvalidOptionCount { len: options.len() });
        }
        if let Some(index) = options.iter().position(|o| o.trim().is_empty()) {
            return Err(QuestionError::EmptyOption { index });
        }
        if correct_option >= options.len() {
            return Err(QuestionError::CorrectOptionOutOfBounds {
                correct: correct_option,
                len: options.len(),
            });
        }

        let explanation = explanation.filter(|e| !e.trim().is_empty());

        Ok(Self {
            id,
            test_id,
            prompt,
            options,
            correct_option,
            explanation,
            created_at,
        })
    }

    /// Rehydrate a question from persisted storage.
    ///
    /// Applies the same invariant checks as [`Question::new`].
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when the stored row violates an invariant.
    pub fn from_persisted(
        id: QuestionId,
        test_id: TestId,
        prompt: String,
        options: Vec<String>,
        correct_option: usize,
        explanation: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, QuestionError> {
        Self::new(
            id,
            test_id,
            prompt,
            options,
            correct_option,
            explanation,
            created_at,
        )
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn test_id(&self) -> TestId {
        self.test_id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Number of answer options.
    #[must_use]
    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    #[must_use]
    pub fn correct_option(&self) -> usize {
        self.correct_option
    }

    /// Returns true when the chosen option index matches the correct one.
    #[must_use]
    pub fn is_correct(&self, chosen: usize) -> bool {
        chosen == self.correct_option
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

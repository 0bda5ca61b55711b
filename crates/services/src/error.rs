//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::ResultError;
use storage::repository::StorageError;

/// Errors emitted by session services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    /// A test with zero questions. Terminal "no content" state: the caller
    /// renders it as such and never starts a timer.
    #[error("no questions available for session")]
    EmptyQuestionSet,

    /// The session already transitioned to Finished; the mutation is refused
    /// with no state change.
    #[error("session already finished")]
    AlreadyFinished,

    /// Finalize bookkeeping requested on a session that is still active.
    #[error("session not finished yet")]
    NotFinished,

    /// Option index outside the question's option list. Rejected locally,
    /// never forwarded to collaborators.
    #[error("option {chosen} is out of bounds for {options} options")]
    InvalidOptionIndex { chosen: usize, options: usize },

    /// Answer targeted a question that is not part of this session.
    #[error("question is not part of this session")]
    UnknownQuestion,

    #[error(transparent)]
    Result(#[from] ResultError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

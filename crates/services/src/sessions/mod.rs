mod progress;
mod queries;
mod service;
mod timer;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use progress::SessionProgress;
pub use service::{SessionService, TickOutcome};
pub use timer::{DeadlineTimer, DeadlineTimerHandle, TimerTick};
pub use view::{QuestionReview, ResultHistoryService, ResultListItem, TestResultId};
pub use workflow::{FinalizeOutcome, SaveStatus, SessionLoopService};

mod ids;
mod profile;
mod question;
mod result;

pub use ids::{ParseIdError, QuestionId, SubjectId, TestId, UserId};
pub use profile::ProfileStats;
pub use question::{Question, QuestionError};
pub use result::{ResultError, TestResult};
pub use test::{Difficulty, Test, TestError};

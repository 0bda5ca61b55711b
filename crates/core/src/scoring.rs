//! Pure scoring arithmetic for finished sessions.
//!
//! A question is correct iff the chosen option index equals the question's
//! correct-option index; an unanswered question is never correct but stays
//! in the denominator. The percentage uses round-half-up, computed with
//! integer arithmetic so results are deterministic across platforms.

use std::collections::HashMap;

use crate::model::{Question, QuestionId};

/// Counts questions whose recorded answer matches the correct option.
#[must_use]
pub fn count_correct(questions: &[Question], answers: &HashMap<QuestionId, usize>) -> u32 {
    let correct = questions
        .iter()
        .filter(|q| answers.get(&q.id()).is_some_and(|&chosen| q.is_correct(chosen)))
        .count();
    u32::try_from(correct).unwrap_or(u32::MAX)
}

/// Percentage score in `0..=100` with round-half-up.
///
/// `total` of zero yields zero; callers guard against empty question sets
/// before a session ever starts, so this is purely defensive arithmetic.
#[must_use]
pub fn score_percent(correct: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let correct = u64::from(correct.min(total));
    let total = u64::from(total);
    // round-half-up of correct / total * 100 without going through floats
    let percent = (correct * 200 + total) / (total * 2);
    u8::try_from(percent.min(100)).unwrap_or(100)
}

/// Elapsed seconds at finish, clamped into `[0, limit]`.
///
/// Handles the boundary race where the final tick and an explicit finish
/// land on the same second: elapsed time never goes negative and never
/// exceeds the original limit.
#[must_use]
pub fn elapsed_seconds(limit_seconds: u32, remaining_at_finish: u32) -> u32 {
    limit_seconds.saturating_sub(remaining_at_finish)
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

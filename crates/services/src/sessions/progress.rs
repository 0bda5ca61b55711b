/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    /// Total questions in the session; never zero.
    pub total: usize,
    /// 1-based position of the current question.
    pub position: usize,
    /// Questions with a recorded answer.
    pub answered: usize,
    pub is_finished: bool,
}

impl SessionProgress {
    /// Display fraction `position / total` in `(0, 1]`.
    ///
    /// Purely informational: users may navigate freely without answering,
    /// so this never gates anything.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.position as f64 / self.total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_spans_first_to_last() {
        let first = SessionProgress {
            total: 4,
            position: 1,
            answered: 0,
            is_finished: false,
        };
        let last = SessionProgress {
            total: 4,
            position: 4,
            answered: 2,
            is_finished: false,
        };
        assert!((first.fraction() - 0.25).abs() < f64::EPSILON);
        assert!((last.fraction() - 1.0).abs() < f64::EPSILON);
    }
}

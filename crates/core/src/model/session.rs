use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{AssessmentId, OptionLabel};

/// Ephemeral, local-only state for one in-progress attempt.
///
/// Created when a session begins, mutated by the recorder and the countdown,
/// destroyed when the arbiter finalizes. The start timestamp is captured once
/// (epoch milliseconds) and never re-derived from the wall clock afterwards,
/// so a reload cannot reset elapsed time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    assessment_id: AssessmentId,
    started_at_ms: i64,
    answers: BTreeMap<usize, OptionLabel>,
    remaining_seconds: Option<u32>,
}

impl SessionState {
    #[must_use]
    pub fn new(
        assessment_id: AssessmentId,
        started_at_ms: i64,
        answers: BTreeMap<usize, OptionLabel>,
        remaining_seconds: Option<u32>,
    ) -> Self {
        Self {
            assessment_id,
            started_at_ms,
            answers,
            remaining_seconds,
        }
    }

    #[must_use]
    pub fn assessment_id(&self) -> AssessmentId {
        self.assessment_id
    }

    #[must_use]
    pub fn started_at_ms(&self) -> i64 {
        self.started_at_ms
    }

    #[must_use]
    pub fn answers(&self) -> &BTreeMap<usize, OptionLabel> {
        &self.answers
    }

    #[must_use]
    pub fn answer(&self, index: usize) -> Option<&OptionLabel> {
        self.answers.get(&index)
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> Option<u32> {
        self.remaining_seconds
    }

    /// Record a selection, overwriting any prior choice for that index.
    pub fn record_answer(&mut self, index: usize, label: OptionLabel) {
        self.answers.insert(index, label);
    }

    pub fn set_remaining_seconds(&mut self, remaining: u32) {
        self.remaining_seconds = Some(remaining);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_answer_overwrites_prior_selection() {
        let mut state =
            SessionState::new(AssessmentId::new(1), 1_000, BTreeMap::new(), None);
        state.record_answer(2, OptionLabel::new("A"));
        state.record_answer(2, OptionLabel::new("C"));

        assert_eq!(state.answered_count(), 1);
        assert_eq!(state.answer(2), Some(&OptionLabel::new("C")));
    }
}

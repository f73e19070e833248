//! Deterministic grading shared by the submission arbiter and the result
//! reconstructor. Both must produce identical outcomes for the same inputs,
//! so the comparison rule lives here and nowhere else.

use std::collections::BTreeMap;

use crate::model::{CanonicalQuestion, OptionLabel};

/// Per-question grading outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionOutcome {
    pub index: usize,
    pub submitted: Option<OptionLabel>,
    pub correct_label: OptionLabel,
    pub is_correct: bool,
}

/// Full grading output for one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeSheet {
    correct: usize,
    total: usize,
    percentage: u8,
    outcomes: Vec<QuestionOutcome>,
}

impl GradeSheet {
    #[must_use]
    pub fn correct(&self) -> usize {
        self.correct
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    #[must_use]
    pub fn percentage(&self) -> u8 {
        self.percentage
    }

    #[must_use]
    pub fn outcomes(&self) -> &[QuestionOutcome] {
        &self.outcomes
    }

    /// Human-readable "correct / total" line for the result record.
    #[must_use]
    pub fn correct_line(&self) -> String {
        format!("{} / {}", self.correct, self.total)
    }
}

/// Grade submitted answers against the canonical question list.
///
/// Comparison is case-insensitive (`OptionLabel::matches`). Unanswered
/// questions count as incorrect and stay in the denominator. Submitted
/// indexes past the canonical list are ignored.
#[must_use]
pub fn grade(
    questions: &[CanonicalQuestion],
    answers: &BTreeMap<usize, OptionLabel>,
) -> GradeSheet {
    let total = questions.len();
    let mut correct = 0_usize;
    let mut outcomes = Vec::with_capacity(total);

    for (index, question) in questions.iter().enumerate() {
        let submitted = answers.get(&index).cloned();
        let is_correct = submitted
            .as_ref()
            .is_some_and(|label| label.matches(question.correct()));
        if is_correct {
            correct += 1;
        }
        outcomes.push(QuestionOutcome {
            index,
            submitted,
            correct_label: question.correct().clone(),
            is_correct,
        });
    }

    GradeSheet {
        correct,
        total,
        percentage: percentage(correct, total),
        outcomes,
    }
}

/// `round(correct / total * 100)`, with an empty paper scoring zero.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn percentage(correct: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((correct as f64 / total as f64) * 100.0).round() as u8
}

/// End timestamp for a finalized session: `max(now, started_at + 1)`.
///
/// Guarantees the end is strictly after the start even when both are captured
/// within the same millisecond.
#[must_use]
pub fn end_timestamp_ms(now_ms: i64, started_at_ms: i64) -> i64 {
    now_ms.max(started_at_ms + 1)
}

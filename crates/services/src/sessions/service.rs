use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use assess_core::model::{Assessment, AssessmentId, OptionLabel, Question, SessionState, StudentId};

use super::countdown::{CountdownClock, Tick};
use super::progress::SessionProgress;
use crate::error::SessionError;

//
// ─── ACTIVE SESSION ────────────────────────────────────────────────────────────
//

/// One in-progress attempt: the session context object.
///
/// Owns everything a session needs across its lifetime: the sanitized
/// assessment, the recorder state, the countdown, the question cursor, and
/// the finalize reentrancy guard. Nothing session-scoped lives outside this
/// struct, so two assessments open at once cannot leak state into each other.
pub struct ActiveSession {
    assessment: Assessment,
    student: StudentId,
    state: SessionState,
    current: usize,
    countdown: Option<CountdownClock>,
    finalize_guard: AtomicBool,
}

impl ActiveSession {
    pub(crate) fn new(
        assessment: Assessment,
        student: StudentId,
        state: SessionState,
        countdown: Option<CountdownClock>,
    ) -> Self {
        Self {
            assessment,
            student,
            state,
            current: 0,
            countdown,
            finalize_guard: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn assessment(&self) -> &Assessment {
        &self.assessment
    }

    #[must_use]
    pub fn assessment_id(&self) -> AssessmentId {
        self.assessment.id()
    }

    #[must_use]
    pub fn student(&self) -> StudentId {
        self.student
    }

    #[must_use]
    pub fn started_at_ms(&self) -> i64 {
        self.state.started_at_ms()
    }

    #[must_use]
    pub fn answers(&self) -> &BTreeMap<usize, OptionLabel> {
        self.state.answers()
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> Option<u32> {
        self.countdown.as_ref().map(CountdownClock::remaining)
    }

    #[must_use]
    pub fn is_timed(&self) -> bool {
        self.countdown.is_some()
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalize_guard.load(Ordering::SeqCst)
    }

    //
    // ─── NAVIGATION ────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.assessment.question(self.current)
    }

    /// "Next" is only enabled once the current question has a recorded answer.
    #[must_use]
    pub fn can_advance(&self) -> bool {
        !self.is_last_question() && self.state.answer(self.current).is_some()
    }

    /// The final question swaps its "next" control for "submit".
    #[must_use]
    pub fn is_last_question(&self) -> bool {
        self.current + 1 >= self.assessment.total_questions()
    }

    /// Move to the next question. Returns false when gated or already at the end.
    pub fn advance(&mut self) -> bool {
        if self.can_advance() {
            self.current += 1;
            true
        } else {
            false
        }
    }

    /// Move to the previous question. Backwards movement is unconstrained.
    pub fn retreat(&mut self) -> bool {
        if self.current > 0 {
            self.current -= 1;
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let total = self.assessment.total_questions();
        let answered = self.state.answered_count().min(total);
        SessionProgress {
            total,
            answered,
            remaining: total - answered,
            is_complete: answered == total,
        }
    }

    /// Confirmation text for the host's best-effort leave-page prompt, while
    /// the attempt is still live. Browsers may ignore the custom message.
    #[must_use]
    pub fn unload_prompt(&self) -> Option<&'static str> {
        if self.is_finalized() {
            None
        } else {
            Some("Your assessment is still in progress. Leave anyway?")
        }
    }

    //
    // ─── RECORDER ──────────────────────────────────────────────────────────────
    //

    /// Record a selection, overwriting any prior choice for that question.
    ///
    /// Validates only against the sanitized option list; the canonical key is
    /// a grading-time concern and never reaches this path.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Finalized` after finalize has begun,
    /// `SessionError::QuestionOutOfRange` or `SessionError::UnknownOption`
    /// for invalid selections.
    pub(crate) fn record_answer(
        &mut self,
        index: usize,
        label: OptionLabel,
    ) -> Result<(), SessionError> {
        if self.is_finalized() {
            return Err(SessionError::Finalized);
        }
        let total = self.assessment.total_questions();
        let Some(question) = self.assessment.question(index) else {
            return Err(SessionError::QuestionOutOfRange { index, total });
        };
        if !question.offers(&label) {
            return Err(SessionError::UnknownOption {
                index,
                label: label.as_str().to_owned(),
            });
        }
        self.state.record_answer(index, label);
        Ok(())
    }

    //
    // ─── COUNTDOWN / FINALIZE HOOKS ────────────────────────────────────────────
    //

    pub(crate) fn countdown_tick(&mut self) -> Option<Tick> {
        let tick = self.countdown.as_mut()?.tick()?;
        self.state.set_remaining_seconds(tick.remaining);
        Some(tick)
    }

    pub(crate) fn cancel_countdown(&mut self) {
        if let Some(clock) = self.countdown.as_mut() {
            clock.cancel();
        }
    }

    /// Acquire the finalize reentrancy guard.
    ///
    /// The first caller wins; everyone after gets false, whether finalize is
    /// still in flight or long finished. The guard is never released: a
    /// session context finalizes at most once in its lifetime.
    pub(crate) fn begin_finalize(&self) -> bool {
        !self.finalize_guard.swap(true, Ordering::SeqCst)
    }
}

impl fmt::Debug for ActiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveSession")
            .field("assessment_id", &self.assessment.id())
            .field("student", &self.student)
            .field("current", &self.current)
            .field("answered", &self.state.answered_count())
            .field("remaining_seconds", &self.remaining_seconds())
            .field("finalized", &self.is_finalized())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use assess_core::model::{CanonicalAssessment, CanonicalQuestion};

    fn build_session(question_count: usize) -> ActiveSession {
        let questions = (0..question_count)
            .map(|i| {
                CanonicalQuestion::new(
                    i,
                    Some(format!("Q{i}")),
                    None,
                    vec![OptionLabel::new("A"), OptionLabel::new("B")],
                    OptionLabel::new("A"),
                )
                .unwrap()
            })
            .collect();
        let assessment =
            CanonicalAssessment::new(AssessmentId::new(1), None, None, questions).unwrap();
        let sanitized = assessment.sanitize();
        let state = SessionState::new(AssessmentId::new(1), 1_000, BTreeMap::new(), None);
        ActiveSession::new(sanitized, StudentId::new(5), state, None)
    }

    #[test]
    fn next_is_gated_on_an_answer() {
        let mut session = build_session(3);
        assert!(!session.can_advance());
        assert!(!session.advance());

        session.record_answer(0, OptionLabel::new("B")).unwrap();
        assert!(session.can_advance());
        assert!(session.advance());
        assert_eq!(session.current_index(), 1);
    }

    #[test]
    fn retreat_is_unconstrained_but_bounded() {
        let mut session = build_session(3);
        assert!(!session.retreat());
        session.record_answer(0, OptionLabel::new("A")).unwrap();
        session.advance();
        assert!(session.retreat());
        assert_eq!(session.current_index(), 0);
    }

    #[test]
    fn last_question_swaps_next_for_submit() {
        let mut session = build_session(2);
        session.record_answer(0, OptionLabel::new("A")).unwrap();
        session.advance();
        assert!(session.is_last_question());
        session.record_answer(1, OptionLabel::new("A")).unwrap();
        // At the last question there is no "next", however answered.
        assert!(!session.can_advance());
        assert!(!session.advance());
    }

    #[test]
    fn recorder_rejects_unknown_options_and_bad_indexes() {
        let mut session = build_session(2);
        let err = session.record_answer(0, OptionLabel::new("Z")).unwrap_err();
        assert!(matches!(err, SessionError::UnknownOption { index: 0, .. }));

        let err = session.record_answer(9, OptionLabel::new("A")).unwrap_err();
        assert!(matches!(
            err,
            SessionError::QuestionOutOfRange { index: 9, total: 2 }
        ));
    }

    #[test]
    fn finalize_guard_admits_exactly_one_caller() {
        let session = build_session(1);
        assert!(session.begin_finalize());
        assert!(!session.begin_finalize());
        assert!(!session.begin_finalize());
        assert!(session.is_finalized());
    }

    #[test]
    fn recorder_is_closed_after_finalize_begins() {
        let mut session = build_session(1);
        assert!(session.begin_finalize());
        let err = session.record_answer(0, OptionLabel::new("A")).unwrap_err();
        assert!(matches!(err, SessionError::Finalized));
    }

    #[test]
    fn unload_prompt_only_while_live() {
        let session = build_session(1);
        assert!(session.unload_prompt().is_some());
        session.begin_finalize();
        assert!(session.unload_prompt().is_none());
    }

    #[test]
    fn progress_counts_answers_not_cursor() {
        let mut session = build_session(3);
        session.record_answer(2, OptionLabel::new("B")).unwrap();
        let progress = session.progress();
        assert_eq!(progress.total, 3);
        assert_eq!(progress.answered, 1);
        assert_eq!(progress.remaining, 2);
        assert!(!progress.is_complete);
    }
}

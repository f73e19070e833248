use std::sync::Arc;

use tracing::warn;

use assess_core::Clock;
use assess_core::grading;
use assess_core::model::{AssessmentId, OptionLabel, ResultRecord, SessionState, StudentId};
use storage::repository::{AssessmentRepository, ResultRepository, SessionStore, Storage};

use super::countdown::{CountdownClock, Tick};
use super::redirect::Redirect;
use super::service::ActiveSession;
use crate::error::SessionError;

/// Which path asked for finalize. Both funnel into the same guard; the
/// distinction only matters for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeTrigger {
    Manual,
    Expiry,
}

/// What a completed finalize produced.
///
/// `record` is `None` when the canonical fetch failed and nothing could be
/// graded; `degraded` marks any finalize that swallowed a grading-fetch or
/// result-write failure on its way to navigation.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizeOutcome {
    pub redirect: Redirect,
    pub record: Option<ResultRecord>,
    pub degraded: bool,
}

/// Outcome of a finalize attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum FinalizeStatus {
    Completed(FinalizeOutcome),
    /// A finalize already won the guard; this trigger is a no-op.
    AlreadyInFlight,
}

/// Outcome of driving the countdown by one second.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub tick: Tick,
    /// Present when this tick expired the countdown and auto-finalized.
    pub finalize: Option<FinalizeStatus>,
}

/// Orchestrates session launch, answer recording, countdown ticks, and the
/// exactly-once finalize.
#[derive(Clone)]
pub struct SessionEngine {
    clock: Clock,
    assessments: Arc<dyn AssessmentRepository>,
    results: Arc<dyn ResultRepository>,
    sessions: Arc<dyn SessionStore>,
}

impl SessionEngine {
    #[must_use]
    pub fn new(
        clock: Clock,
        assessments: Arc<dyn AssessmentRepository>,
        results: Arc<dyn ResultRepository>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            clock,
            assessments,
            results,
            sessions,
        }
    }

    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self::new(
            clock,
            Arc::clone(&storage.assessments),
            Arc::clone(&storage.results),
            Arc::clone(&storage.sessions),
        )
    }

    /// Start (or re-enter after a reload) a session for the given student.
    ///
    /// The start timestamp is captured exactly once: a value found in the
    /// session store is reused, so elapsed time is never reset by a reload.
    /// Restored remaining time is clamped to the configured limit, never
    /// extended.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyCompleted` if a result already exists
    /// (no session state is created), `SessionError::NotFound` for a missing
    /// assessment, and `SessionError::Storage` for other collaborator
    /// failures.
    pub async fn start_session(
        &self,
        student: StudentId,
        assessment_id: AssessmentId,
    ) -> Result<ActiveSession, SessionError> {
        if self
            .results
            .has_existing_result(student, assessment_id)
            .await?
        {
            return Err(SessionError::AlreadyCompleted);
        }

        let assessment = self
            .assessments
            .fetch_student_assessment(assessment_id)
            .await?;
        let snapshot = self.sessions.load(assessment_id).await?;

        let started_at_ms = match snapshot.started_at_ms {
            Some(ms) => ms,
            None => {
                let now = self.clock.now_ms();
                self.sessions.save_started_at(assessment_id, now).await?;
                now
            }
        };

        let answers = snapshot.answers.unwrap_or_default();

        let countdown = assessment.time_limit_seconds().map(|full| {
            let remaining = snapshot.remaining_seconds.map_or(full, |r| r.min(full));
            let mut clock = CountdownClock::new(remaining);
            clock.start();
            clock
        });

        let remaining = countdown.as_ref().map(CountdownClock::remaining);
        let state = SessionState::new(assessment_id, started_at_ms, answers, remaining);
        Ok(ActiveSession::new(assessment, student, state, countdown))
    }

    /// Record a selection and persist the full answers map.
    ///
    /// # Errors
    ///
    /// Returns recorder validation errors from the session, or
    /// `SessionError::Storage` if persisting the map fails.
    pub async fn select_answer(
        &self,
        session: &mut ActiveSession,
        index: usize,
        label: OptionLabel,
    ) -> Result<(), SessionError> {
        session.record_answer(index, label)?;
        self.sessions
            .save_answers(session.assessment_id(), session.answers())
            .await?;
        Ok(())
    }

    /// Advance the countdown by one second.
    ///
    /// The host's event loop calls this once per second for timed sessions.
    /// Invokes finalize when this tick reached zero, otherwise persists the
    /// new remaining value. Returns `None` for untimed, already finalized, or
    /// stopped sessions.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if persisting the remaining time
    /// fails on a non-expiring tick.
    pub async fn tick(
        &self,
        session: &mut ActiveSession,
    ) -> Result<Option<TickReport>, SessionError> {
        if session.is_finalized() {
            return Ok(None);
        }
        let Some(tick) = session.countdown_tick() else {
            return Ok(None);
        };

        // The expiring tick is the clock's only shot at the arbiter, so it
        // must not be lost to a failed remaining-time write; finalize clears
        // the store anyway.
        if tick.expired {
            let status = self.finalize(session, FinalizeTrigger::Expiry).await?;
            return Ok(Some(TickReport {
                tick,
                finalize: Some(status),
            }));
        }

        self.sessions
            .save_remaining(session.assessment_id(), tick.remaining)
            .await?;

        Ok(Some(TickReport {
            tick,
            finalize: None,
        }))
    }

    /// Grade, persist, and close the session. Exactly once per session.
    ///
    /// The first trigger to win the reentrancy guard runs the whole path;
    /// every later trigger gets `FinalizeStatus::AlreadyInFlight`, whether
    /// the winner is still in flight or long done. Grading always uses a
    /// canonical assessment fetched fresh here; the session's sanitized copy
    /// is never trusted for correctness.
    ///
    /// Grading-fetch and result-write failures are deliberately swallowed:
    /// the outcome is flagged `degraded`, a warning is logged, and navigation
    /// proceeds. The local session state is cleared unconditionally either
    /// way, so re-opening this assessment can never resurrect the attempt.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Result` if the record itself cannot be
    /// constructed.
    pub async fn finalize(
        &self,
        session: &mut ActiveSession,
        trigger: FinalizeTrigger,
    ) -> Result<FinalizeStatus, SessionError> {
        if !session.begin_finalize() {
            return Ok(FinalizeStatus::AlreadyInFlight);
        }
        session.cancel_countdown();

        let assessment_id = session.assessment_id();
        let student = session.student();
        let redirect = Redirect::ResultView {
            student,
            assessment: assessment_id,
        };

        let canonical = match self
            .assessments
            .fetch_canonical_assessment(assessment_id)
            .await
        {
            Ok(canonical) => canonical,
            Err(err) => {
                warn!(
                    %assessment_id,
                    %student,
                    ?trigger,
                    error = %err,
                    "grading fetch failed; navigating without a result"
                );
                self.clear_session_state(assessment_id).await;
                return Ok(FinalizeStatus::Completed(FinalizeOutcome {
                    redirect,
                    record: None,
                    degraded: true,
                }));
            }
        };

        let sheet = grading::grade(canonical.questions(), session.answers());
        let ended_at_ms =
            grading::end_timestamp_ms(self.clock.now_ms(), session.started_at_ms());
        let record = ResultRecord::new(
            student,
            assessment_id,
            canonical.week().map(ToOwned::to_owned),
            sheet.percentage(),
            sheet.correct_line(),
            session.answers().clone(),
            session.started_at_ms(),
            ended_at_ms,
            self.clock.now(),
        )?;

        let degraded = match self.results.write_result(&record).await {
            Ok(()) => false,
            Err(err) => {
                warn!(
                    %assessment_id,
                    %student,
                    ?trigger,
                    error = %err,
                    "result write failed; navigating anyway"
                );
                true
            }
        };

        self.clear_session_state(assessment_id).await;

        Ok(FinalizeStatus::Completed(FinalizeOutcome {
            redirect,
            record: Some(record),
            degraded,
        }))
    }

    async fn clear_session_state(&self, assessment_id: AssessmentId) {
        if let Err(err) = self.sessions.clear(assessment_id).await {
            warn!(%assessment_id, error = %err, "failed to clear local session state");
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

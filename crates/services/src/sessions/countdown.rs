//! Cooperative countdown for timed assessments.
//!
//! The clock owns no timer thread. The host's event loop calls [`CountdownClock::tick`]
//! once per second; ticks, button clicks, and navigation all run on the same
//! loop, so no locking is needed around the session state.

/// Remaining seconds under which the one-shot low-time warning fires.
pub const LOW_TIME_THRESHOLD_SECS: u32 = 60;

/// One-shot low-time warning raised when the countdown drops under a minute.
///
/// The host shows it and dismisses it automatically; it never re-fires for
/// the same session, even if the displayed time transiently reads >= 60s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LowTimeWarning {
    pub remaining_seconds: u32,
}

impl LowTimeWarning {
    /// How long the host keeps the warning visible before auto-dismissing.
    pub const DISMISS_AFTER_SECS: u64 = 6;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownState {
    Idle,
    Running,
    Expired,
    Cancelled,
}

/// Outcome of a single one-second tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub remaining: u32,
    pub warning: Option<LowTimeWarning>,
    pub expired: bool,
}

/// `Idle → Running → {Expired, Cancelled}` state machine.
///
/// Expiry is reported exactly once; everything after a terminal state is a
/// no-op. Cancellation is idempotent.
#[derive(Debug, Clone)]
pub struct CountdownClock {
    remaining: u32,
    state: CountdownState,
    warned: bool,
}

impl CountdownClock {
    /// A clock holding `remaining` seconds, not yet ticking.
    #[must_use]
    pub fn new(remaining: u32) -> Self {
        Self {
            remaining,
            // A session restored with the warning threshold already crossed
            // still deserves one warning, so the latch starts unarmed.
            state: CountdownState::Idle,
            warned: false,
        }
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub fn state(&self) -> CountdownState {
        self.state
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == CountdownState::Running
    }

    /// Begin ticking. Starting an already started or terminal clock is a no-op.
    pub fn start(&mut self) {
        if self.state == CountdownState::Idle {
            self.state = CountdownState::Running;
        }
    }

    /// Advance the countdown by one second.
    ///
    /// Returns `None` unless the clock is running. On reaching zero the clock
    /// transitions to `Expired` and the returned tick has `expired` set; the
    /// caller is responsible for invoking finalize exactly once off that
    /// signal.
    pub fn tick(&mut self) -> Option<Tick> {
        if self.state != CountdownState::Running {
            return None;
        }

        self.remaining = self.remaining.saturating_sub(1);

        let warning = if !self.warned && self.remaining < LOW_TIME_THRESHOLD_SECS {
            self.warned = true;
            Some(LowTimeWarning {
                remaining_seconds: self.remaining,
            })
        } else {
            None
        };

        let expired = self.remaining == 0;
        if expired {
            self.state = CountdownState::Expired;
        }

        Some(Tick {
            remaining: self.remaining,
            warning,
            expired,
        })
    }

    /// Stop ticking because the arbiter finalized via the manual path first.
    ///
    /// Idempotent, and a no-op on an already expired clock.
    pub fn cancel(&mut self) {
        match self.state {
            CountdownState::Idle | CountdownState::Running => {
                self.state = CountdownState::Cancelled;
            }
            CountdownState::Expired | CountdownState::Cancelled => {}
        }
    }
}

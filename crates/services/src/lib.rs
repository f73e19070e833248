#![forbid(unsafe_code)]

pub mod error;
pub mod sessions;

pub use assess_core::Clock;

pub use error::SessionError;

pub use sessions::{
    ActiveSession, CountdownClock, CountdownState, FinalizeOutcome, FinalizeStatus,
    FinalizeTrigger, LowTimeWarning, Redirect, ResolvedImage, ResultReview, ReviewService,
    SessionEngine, SessionProgress, Tick, TickReport,
};

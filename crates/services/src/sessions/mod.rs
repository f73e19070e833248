mod countdown;
mod images;
mod progress;
mod redirect;
mod service;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use countdown::{CountdownClock, CountdownState, LOW_TIME_THRESHOLD_SECS, LowTimeWarning, Tick};
pub use images::{ResolvedImage, resolve_prompt_image};
pub use progress::SessionProgress;
pub use redirect::Redirect;
pub use service::ActiveSession;
pub use view::{QuestionReview, ResultReview, ReviewService};
pub use workflow::{FinalizeOutcome, FinalizeStatus, FinalizeTrigger, SessionEngine, TickReport};

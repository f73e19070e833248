use serde::Serialize;

use assess_core::model::{AssessmentId, StudentId};

/// Navigation modeled as data: the engine decides where the user goes next,
/// the host UI performs the actual transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Redirect {
    /// Back to the assessment list, optionally with a user-facing message.
    AssessmentList { message: Option<String> },
    /// The read-only result view for a finalized attempt.
    ResultView {
        student: StudentId,
        assessment: AssessmentId,
    },
}

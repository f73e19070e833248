mod assessment;
mod ids;
mod result;
mod session;

pub use ids::{AssessmentId, StudentId};

pub use assessment::{
    Assessment, AssessmentError, CanonicalAssessment, CanonicalQuestion, ImageRef, OptionLabel,
    Question, QuestionPrompt,
};
pub use result::{ResultError, ResultId, ResultRecord};
pub use session::SessionState;

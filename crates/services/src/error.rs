//! Shared error types for the services crate.

use thiserror::Error;

use assess_core::model::ResultError;
use storage::repository::StorageError;

use crate::sessions::Redirect;

/// Errors emitted by the session engine and review services.
///
/// None of these are used for control flow; each is terminal to the operation
/// that raised it.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    /// The student already has a result for this assessment. The session must
    /// never be constructed.
    #[error("assessment already answered by this student")]
    AlreadyCompleted,

    /// Assessment or result missing.
    #[error("assessment or result not found")]
    NotFound,

    /// The session has already been finalized; mutations are rejected.
    #[error("session already finalized")]
    Finalized,

    #[error("question index {index} out of range ({total} questions)")]
    QuestionOutOfRange { index: usize, total: usize },

    #[error("question {index} does not offer option {label}")]
    UnknownOption { index: usize, label: String },

    #[error(transparent)]
    Result(#[from] ResultError),

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for SessionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => SessionError::NotFound,
            other => SessionError::Storage(other),
        }
    }
}

impl SessionError {
    /// Where the host should send the user when this error ends an operation.
    ///
    /// Mutating-call rejections (`Finalized`, recorder validation) return
    /// `None`: the session stays on screen.
    #[must_use]
    pub fn redirect(&self) -> Option<Redirect> {
        match self {
            SessionError::AlreadyCompleted => Some(Redirect::AssessmentList {
                message: Some("You have already answered this assessment.".to_owned()),
            }),
            SessionError::NotFound => Some(Redirect::AssessmentList { message: None }),
            SessionError::Storage(_) | SessionError::Result(_) => {
                Some(Redirect::AssessmentList {
                    message: Some("Something went wrong. Please try again.".to_owned()),
                })
            }
            _ => None,
        }
    }
}

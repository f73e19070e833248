use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::AssessmentId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AssessmentError {
    #[error("assessment has no questions")]
    NoQuestions,

    #[error("question {index} has neither prompt text nor an image")]
    EmptyPrompt { index: usize },

    #[error("question {index} offers no answer options")]
    NoOptions { index: usize },

    #[error("question {index}: correct label {label} is not among the options")]
    CorrectNotOffered { index: usize, label: String },

    #[error("time limit must be greater than zero minutes")]
    ZeroTimeLimit,
}

/// Opaque reference to a question image.
///
/// Resolution to a displayable URL is a collaborator concern; the engine only
/// carries the reference around.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef(String);

impl ImageRef {
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Display label for an answer option ("A", "B", ...).
///
/// Labels are display identifiers, not answer text. Equality for grading is
/// case-insensitive and goes through [`OptionLabel::matches`] so that the
/// arbiter and the reconstructor always agree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OptionLabel(String);

impl OptionLabel {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison used for grading.
    #[must_use]
    pub fn matches(&self, other: &OptionLabel) -> bool {
        self.0.to_lowercase() == other.0.to_lowercase()
    }
}

impl fmt::Display for OptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the student is asked: text, an image, or both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionPrompt {
    text: Option<String>,
    image: Option<ImageRef>,
}

impl QuestionPrompt {
    fn validated(
        index: usize,
        text: Option<String>,
        image: Option<ImageRef>,
    ) -> Result<Self, AssessmentError> {
        let text = text.filter(|t| !t.trim().is_empty());
        if text.is_none() && image.is_none() {
            return Err(AssessmentError::EmptyPrompt { index });
        }
        Ok(Self { text, image })
    }

    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    #[must_use]
    pub fn image(&self) -> Option<&ImageRef> {
        self.image.as_ref()
    }
}

/// Student-facing question: prompt plus ordered option labels, never the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    prompt: QuestionPrompt,
    options: Vec<OptionLabel>,
}

impl Question {
    #[must_use]
    pub fn prompt(&self) -> &QuestionPrompt {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[OptionLabel] {
        &self.options
    }

    /// Returns true if `label` is one of this question's options
    /// (case-insensitive).
    #[must_use]
    pub fn offers(&self, label: &OptionLabel) -> bool {
        self.options.iter().any(|o| o.matches(label))
    }
}

/// Grading-side question: the sanitized question plus its correct label.
///
/// This variant must never reach the student-facing path; [`Self::sanitize`]
/// strips the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalQuestion {
    question: Question,
    correct: OptionLabel,
}

impl CanonicalQuestion {
    /// Build a canonical question, validating prompt, options, and key.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError` if the prompt is empty, no options are
    /// offered, or the correct label is not among the options.
    pub fn new(
        index: usize,
        text: Option<String>,
        image: Option<ImageRef>,
        options: Vec<OptionLabel>,
        correct: OptionLabel,
    ) -> Result<Self, AssessmentError> {
        let prompt = QuestionPrompt::validated(index, text, image)?;
        if options.is_empty() {
            return Err(AssessmentError::NoOptions { index });
        }
        let question = Question { prompt, options };
        if !question.offers(&correct) {
            return Err(AssessmentError::CorrectNotOffered {
                index,
                label: correct.as_str().to_owned(),
            });
        }
        Ok(Self { question, correct })
    }

    #[must_use]
    pub fn question(&self) -> &Question {
        &self.question
    }

    #[must_use]
    pub fn prompt(&self) -> &QuestionPrompt {
        self.question.prompt()
    }

    #[must_use]
    pub fn options(&self) -> &[OptionLabel] {
        self.question.options()
    }

    #[must_use]
    pub fn correct(&self) -> &OptionLabel {
        &self.correct
    }

    /// Strip the correct label, producing the student-facing question.
    #[must_use]
    pub fn sanitize(&self) -> Question {
        self.question.clone()
    }
}

/// Student-facing assessment: the canonical variant with every key stripped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    id: AssessmentId,
    week: Option<String>,
    time_limit_minutes: Option<u32>,
    questions: Vec<Question>,
}

impl Assessment {
    #[must_use]
    pub fn id(&self) -> AssessmentId {
        self.id
    }

    #[must_use]
    pub fn week(&self) -> Option<&str> {
        self.week.as_deref()
    }

    #[must_use]
    pub fn time_limit_minutes(&self) -> Option<u32> {
        self.time_limit_minutes
    }

    /// Total countdown length, when a time limit is configured.
    ///
    /// Saturates at `u32::MAX` seconds; an absurdly large configured limit
    /// behaves as "effectively untimed" rather than wrapping.
    #[must_use]
    pub fn time_limit_seconds(&self) -> Option<u32> {
        self.time_limit_minutes.map(|m| m.saturating_mul(60))
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }
}

/// Grading-side assessment, immutable during a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalAssessment {
    id: AssessmentId,
    week: Option<String>,
    time_limit_minutes: Option<u32>,
    questions: Vec<CanonicalQuestion>,
}

impl CanonicalAssessment {
    /// Build a canonical assessment.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::NoQuestions` for an empty question list and
    /// `AssessmentError::ZeroTimeLimit` for a configured zero-minute limit.
    pub fn new(
        id: AssessmentId,
        week: Option<String>,
        time_limit_minutes: Option<u32>,
        questions: Vec<CanonicalQuestion>,
    ) -> Result<Self, AssessmentError> {
        if questions.is_empty() {
            return Err(AssessmentError::NoQuestions);
        }
        if time_limit_minutes == Some(0) {
            return Err(AssessmentError::ZeroTimeLimit);
        }
        Ok(Self {
            id,
            week,
            time_limit_minutes,
            questions,
        })
    }

    #[must_use]
    pub fn id(&self) -> AssessmentId {
        self.id
    }

    #[must_use]
    pub fn week(&self) -> Option<&str> {
        self.week.as_deref()
    }

    #[must_use]
    pub fn time_limit_minutes(&self) -> Option<u32> {
        self.time_limit_minutes
    }

    #[must_use]
    pub fn questions(&self) -> &[CanonicalQuestion] {
        &self.questions
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    /// Produce the student-facing variant with correct labels stripped.
    #[must_use]
    pub fn sanitize(&self) -> Assessment {
        Assessment {
            id: self.id,
            week: self.week.clone(),
            time_limit_minutes: self.time_limit_minutes,
            questions: self.questions.iter().map(CanonicalQuestion::sanitize).collect(),
        }
    }
}

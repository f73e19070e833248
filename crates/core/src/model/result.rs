use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use super::{AssessmentId, OptionLabel, StudentId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResultError {
    #[error("ended_at is not strictly after started_at")]
    InvalidTimeRange,

    #[error("percentage {0} is out of range")]
    PercentageOutOfRange(u8),

    #[error("unparseable timestamp: {0}")]
    UnparseableTimestamp(String),
}

/// Unique identifier for a persisted result.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultId(Uuid);

impl ResultId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Debug for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResultId({})", self.0)
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable, authoritative record of a completed attempt.
///
/// At most one record exists per (student, assessment); the result store
/// enforces that, this type only carries the data. Start and end timestamps
/// are persisted as formatted RFC 3339 strings; elapsed time is always
/// re-derived from those strings, never from the wall clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    id: ResultId,
    student_id: StudentId,
    assessment_id: AssessmentId,
    week: Option<String>,
    percentage: u8,
    correct_line: String,
    answers: BTreeMap<usize, OptionLabel>,
    started_at_display: String,
    ended_at_display: String,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl ResultRecord {
    /// Build a fresh record from grading output, generating a new id.
    ///
    /// # Errors
    ///
    /// Returns `ResultError::InvalidTimeRange` if `ended_at_ms` is not
    /// strictly after `started_at_ms`, or `ResultError::UnparseableTimestamp`
    /// if either millisecond value cannot be represented.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        student_id: StudentId,
        assessment_id: AssessmentId,
        week: Option<String>,
        percentage: u8,
        correct_line: String,
        answers: BTreeMap<usize, OptionLabel>,
        started_at_ms: i64,
        ended_at_ms: i64,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ResultError> {
        let started_at = datetime_from_ms(started_at_ms)?;
        let ended_at = datetime_from_ms(ended_at_ms)?;
        Self::from_persisted(
            ResultId::generate(),
            student_id,
            assessment_id,
            week,
            percentage,
            correct_line,
            answers,
            started_at.to_rfc3339(),
            ended_at.to_rfc3339(),
            created_at,
        )
    }

    /// Rehydrate a record from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ResultError::UnparseableTimestamp` if a display string is not
    /// RFC 3339, `ResultError::InvalidTimeRange` unless `ended_at` is strictly
    /// after `started_at`, and `ResultError::PercentageOutOfRange` for values
    /// above 100.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: ResultId,
        student_id: StudentId,
        assessment_id: AssessmentId,
        week: Option<String>,
        percentage: u8,
        correct_line: String,
        answers: BTreeMap<usize, OptionLabel>,
        started_at_display: String,
        ended_at_display: String,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ResultError> {
        let started_at = parse_display(&started_at_display)?;
        let ended_at = parse_display(&ended_at_display)?;
        if ended_at <= started_at {
            return Err(ResultError::InvalidTimeRange);
        }
        if percentage > 100 {
            return Err(ResultError::PercentageOutOfRange(percentage));
        }

        Ok(Self {
            id,
            student_id,
            assessment_id,
            week,
            percentage,
            correct_line,
            answers,
            started_at_display,
            ended_at_display,
            started_at,
            ended_at,
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> ResultId {
        self.id
    }

    #[must_use]
    pub fn student_id(&self) -> StudentId {
        self.student_id
    }

    #[must_use]
    pub fn assessment_id(&self) -> AssessmentId {
        self.assessment_id
    }

    #[must_use]
    pub fn week(&self) -> Option<&str> {
        self.week.as_deref()
    }

    #[must_use]
    pub fn percentage(&self) -> u8 {
        self.percentage
    }

    /// Human-readable "correct / total" line.
    #[must_use]
    pub fn correct_line(&self) -> &str {
        &self.correct_line
    }

    #[must_use]
    pub fn answers(&self) -> &BTreeMap<usize, OptionLabel> {
        &self.answers
    }

    #[must_use]
    pub fn started_at_display(&self) -> &str {
        &self.started_at_display
    }

    #[must_use]
    pub fn ended_at_display(&self) -> &str {
        &self.ended_at_display
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn ended_at(&self) -> DateTime<Utc> {
        self.ended_at
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Elapsed seconds between the formatted start and end timestamps.
    ///
    /// Strictly positive is not guaranteed at second granularity: the end
    /// timestamp is only guaranteed one millisecond past the start.
    #[must_use]
    pub fn elapsed_seconds(&self) -> u64 {
        u64::try_from((self.ended_at - self.started_at).num_seconds()).unwrap_or(0)
    }
}

fn datetime_from_ms(ms: i64) -> Result<DateTime<Utc>, ResultError> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| ResultError::UnparseableTimestamp(ms.to_string()))
}

fn parse_display(display: &str) -> Result<DateTime<Utc>, ResultError> {
    DateTime::parse_from_rfc3339(display)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ResultError::UnparseableTimestamp(display.to_owned()))
}

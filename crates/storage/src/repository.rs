use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use assess_core::model::{
    Assessment, AssessmentId, CanonicalAssessment, ImageRef, OptionLabel, ResultRecord, StudentId,
};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Repository contract for assessment definitions.
///
/// The canonical variant (with correct labels) is fetched only at grading
/// time; the sanitized variant is the only one that reaches a student.
#[async_trait]
pub trait AssessmentRepository: Send + Sync {
    /// Fetch the student-facing assessment, correct labels stripped.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn fetch_student_assessment(
        &self,
        id: AssessmentId,
    ) -> Result<Assessment, StorageError>;

    /// Fetch the grading variant, including correct labels.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn fetch_canonical_assessment(
        &self,
        id: AssessmentId,
    ) -> Result<CanonicalAssessment, StorageError>;
}

/// Repository contract for finalized results.
#[async_trait]
pub trait ResultRepository: Send + Sync {
    /// Whether the student already has a result for this assessment.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on lookup failure.
    async fn has_existing_result(
        &self,
        student: StudentId,
        assessment: AssessmentId,
    ) -> Result<bool, StorageError>;

    /// Persist a finalized result.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` when a result for the same
    /// (student, assessment) pair already exists, upholding the at-most-one
    /// invariant.
    async fn write_result(&self, record: &ResultRecord) -> Result<(), StorageError>;

    /// Fetch the result for review.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_result(
        &self,
        student: StudentId,
        assessment: AssessmentId,
    ) -> Result<ResultRecord, StorageError>;
}

/// Resolves opaque question-image references to displayable URLs.
#[async_trait]
pub trait ImageRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for unknown references. Callers treat
    /// this as non-fatal.
    async fn resolve_image(&self, image: &ImageRef) -> Result<String, StorageError>;
}

/// Everything the session store knows about one in-flight attempt.
///
/// Fields are written independently by their owning components, so any subset
/// may be present after a reload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub started_at_ms: Option<i64>,
    pub remaining_seconds: Option<u32>,
    pub answers: Option<BTreeMap<usize, OptionLabel>>,
}

impl SessionSnapshot {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.started_at_ms.is_none() && self.remaining_seconds.is_none() && self.answers.is_none()
    }
}

/// Tab-scoped key/value store that survives an involuntary reload.
///
/// This is a different lifetime than the result store: session state is
/// ephemeral and is cleared unconditionally when the arbiter finalizes, so a
/// later re-open of the same assessment never resurrects a finished attempt.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Read whatever survived for this assessment; an empty snapshot if nothing did.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failure.
    async fn load(&self, assessment: AssessmentId) -> Result<SessionSnapshot, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on write failure.
    async fn save_started_at(
        &self,
        assessment: AssessmentId,
        started_at_ms: i64,
    ) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on write failure.
    async fn save_remaining(
        &self,
        assessment: AssessmentId,
        remaining_seconds: u32,
    ) -> Result<(), StorageError>;

    /// Persist the full answers map (the recorder always writes the whole map).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on write failure.
    async fn save_answers(
        &self,
        assessment: AssessmentId,
        answers: &BTreeMap<usize, OptionLabel>,
    ) -> Result<(), StorageError>;

    /// Drop every field for this assessment. Clearing an absent entry is fine.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on write failure.
    async fn clear(&self, assessment: AssessmentId) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    assessments: Arc<Mutex<HashMap<AssessmentId, CanonicalAssessment>>>,
    results: Arc<Mutex<HashMap<(StudentId, AssessmentId), ResultRecord>>>,
    images: Arc<Mutex<HashMap<String, String>>>,
    sessions: Arc<Mutex<HashMap<AssessmentId, SessionSnapshot>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace a canonical assessment definition.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the backing lock is poisoned.
    pub fn upsert_assessment(
        &self,
        assessment: &CanonicalAssessment,
    ) -> Result<(), StorageError> {
        let mut guard = lock(&self.assessments)?;
        guard.insert(assessment.id(), assessment.clone());
        Ok(())
    }

    /// Seed an image reference resolution.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the backing lock is poisoned.
    pub fn put_image(
        &self,
        reference: impl Into<String>,
        url: impl Into<String>,
    ) -> Result<(), StorageError> {
        let mut guard = lock(&self.images)?;
        guard.insert(reference.into(), url.into());
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>, StorageError> {
    m.lock().map_err(|e| StorageError::Connection(e.to_string()))
}

#[async_trait]
impl AssessmentRepository for InMemoryRepository {
    async fn fetch_student_assessment(
        &self,
        id: AssessmentId,
    ) -> Result<Assessment, StorageError> {
        let guard = lock(&self.assessments)?;
        guard
            .get(&id)
            .map(CanonicalAssessment::sanitize)
            .ok_or(StorageError::NotFound)
    }

    async fn fetch_canonical_assessment(
        &self,
        id: AssessmentId,
    ) -> Result<CanonicalAssessment, StorageError> {
        let guard = lock(&self.assessments)?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl ResultRepository for InMemoryRepository {
    async fn has_existing_result(
        &self,
        student: StudentId,
        assessment: AssessmentId,
    ) -> Result<bool, StorageError> {
        let guard = lock(&self.results)?;
        Ok(guard.contains_key(&(student, assessment)))
    }

    async fn write_result(&self, record: &ResultRecord) -> Result<(), StorageError> {
        let mut guard = lock(&self.results)?;
        let key = (record.student_id(), record.assessment_id());
        if guard.contains_key(&key) {
            return Err(StorageError::Conflict);
        }
        guard.insert(key, record.clone());
        Ok(())
    }

    async fn get_result(
        &self,
        student: StudentId,
        assessment: AssessmentId,
    ) -> Result<ResultRecord, StorageError> {
        let guard = lock(&self.results)?;
        guard
            .get(&(student, assessment))
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl ImageRepository for InMemoryRepository {
    async fn resolve_image(&self, image: &ImageRef) -> Result<String, StorageError> {
        let guard = lock(&self.images)?;
        guard.get(image.as_str()).cloned().ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl SessionStore for InMemoryRepository {
    async fn load(&self, assessment: AssessmentId) -> Result<SessionSnapshot, StorageError> {
        let guard = lock(&self.sessions)?;
        Ok(guard.get(&assessment).cloned().unwrap_or_default())
    }

    async fn save_started_at(
        &self,
        assessment: AssessmentId,
        started_at_ms: i64,
    ) -> Result<(), StorageError> {
        let mut guard = lock(&self.sessions)?;
        guard.entry(assessment).or_default().started_at_ms = Some(started_at_ms);
        Ok(())
    }

    async fn save_remaining(
        &self,
        assessment: AssessmentId,
        remaining_seconds: u32,
    ) -> Result<(), StorageError> {
        let mut guard = lock(&self.sessions)?;
        guard.entry(assessment).or_default().remaining_seconds = Some(remaining_seconds);
        Ok(())
    }

    async fn save_answers(
        &self,
        assessment: AssessmentId,
        answers: &BTreeMap<usize, OptionLabel>,
    ) -> Result<(), StorageError> {
        let mut guard = lock(&self.sessions)?;
        guard.entry(assessment).or_default().answers = Some(answers.clone());
        Ok(())
    }

    async fn clear(&self, assessment: AssessmentId) -> Result<(), StorageError> {
        let mut guard = lock(&self.sessions)?;
        guard.remove(&assessment);
        Ok(())
    }
}

/// Aggregates the collaborator repositories behind trait objects for easy
/// backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub assessments: Arc<dyn AssessmentRepository>,
    pub results: Arc<dyn ResultRepository>,
    pub images: Arc<dyn ImageRepository>,
    pub sessions: Arc<dyn SessionStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let assessments: Arc<dyn AssessmentRepository> = Arc::new(repo.clone());
        let results: Arc<dyn ResultRepository> = Arc::new(repo.clone());
        let images: Arc<dyn ImageRepository> = Arc::new(repo.clone());
        let sessions: Arc<dyn SessionStore> = Arc::new(repo);
        Self {
            assessments,
            results,
            images,
            sessions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assess_core::model::CanonicalQuestion;
    use chrono::Utc;

    fn build_assessment(id: u64) -> CanonicalAssessment {
        let questions = vec![
            CanonicalQuestion::new(
                0,
                Some("Q1".to_owned()),
                None,
                vec![OptionLabel::new("A"), OptionLabel::new("B")],
                OptionLabel::new("A"),
            )
            .unwrap(),
        ];
        CanonicalAssessment::new(AssessmentId::new(id), None, Some(5), questions).unwrap()
    }

    fn build_result(student: u64, assessment: u64) -> ResultRecord {
        ResultRecord::new(
            StudentId::new(student),
            AssessmentId::new(assessment),
            None,
            100,
            "1 / 1".to_owned(),
            BTreeMap::from([(0, OptionLabel::new("A"))]),
            1_000,
            61_000,
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn student_fetch_never_carries_the_key() {
        let repo = InMemoryRepository::new();
        repo.upsert_assessment(&build_assessment(1)).unwrap();

        let sanitized = repo
            .fetch_student_assessment(AssessmentId::new(1))
            .await
            .unwrap();
        let canonical = repo
            .fetch_canonical_assessment(AssessmentId::new(1))
            .await
            .unwrap();

        assert_eq!(sanitized, canonical.sanitize());
        assert_eq!(canonical.questions()[0].correct(), &OptionLabel::new("A"));
    }

    #[tokio::test]
    async fn duplicate_result_is_a_conflict() {
        let repo = InMemoryRepository::new();
        let record = build_result(1, 2);
        repo.write_result(&record).await.unwrap();

        assert!(repo
            .has_existing_result(StudentId::new(1), AssessmentId::new(2))
            .await
            .unwrap());
        let err = repo.write_result(&record).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn session_fields_write_independently_and_clear_together() {
        let repo = InMemoryRepository::new();
        let id = AssessmentId::new(9);

        repo.save_started_at(id, 42_000).await.unwrap();
        let snapshot = repo.load(id).await.unwrap();
        assert_eq!(snapshot.started_at_ms, Some(42_000));
        assert_eq!(snapshot.answers, None);

        let answers = BTreeMap::from([(0, OptionLabel::new("B"))]);
        repo.save_answers(id, &answers).await.unwrap();
        repo.save_remaining(id, 55).await.unwrap();

        let snapshot = repo.load(id).await.unwrap();
        assert_eq!(snapshot.answers.as_ref(), Some(&answers));
        assert_eq!(snapshot.remaining_seconds, Some(55));

        repo.clear(id).await.unwrap();
        assert!(repo.load(id).await.unwrap().is_empty());
        // Clearing twice is harmless.
        repo.clear(id).await.unwrap();
    }
}

use assess_core::model::{
    Assessment, AssessmentId, CanonicalAssessment, CanonicalQuestion, OptionLabel,
};
use sqlx::Row;

use super::{SqliteRepository, mapping::{id_i64, ser}};
use crate::repository::{AssessmentRepository, StorageError};

/// Question payload as stored in the `questions` JSON column.
#[derive(serde::Serialize, serde::Deserialize)]
struct QuestionPayload {
    text: Option<String>,
    image: Option<String>,
    options: Vec<String>,
    correct: String,
}

fn payload_to_questions(json: &str) -> Result<Vec<CanonicalQuestion>, StorageError> {
    let payloads: Vec<QuestionPayload> = serde_json::from_str(json).map_err(ser)?;
    let mut questions = Vec::with_capacity(payloads.len());
    for (index, p) in payloads.into_iter().enumerate() {
        let question = CanonicalQuestion::new(
            index,
            p.text,
            p.image.map(assess_core::model::ImageRef::new),
            p.options.into_iter().map(OptionLabel::new).collect(),
            OptionLabel::new(p.correct),
        )
        .map_err(ser)?;
        questions.push(question);
    }
    Ok(questions)
}

fn questions_to_payload(questions: &[CanonicalQuestion]) -> Result<String, StorageError> {
    let payloads: Vec<QuestionPayload> = questions
        .iter()
        .map(|q| QuestionPayload {
            text: q.prompt().text().map(ToOwned::to_owned),
            image: q.prompt().image().map(|i| i.as_str().to_owned()),
            options: q.options().iter().map(|o| o.as_str().to_owned()).collect(),
            correct: q.correct().as_str().to_owned(),
        })
        .collect();
    serde_json::to_string(&payloads).map_err(ser)
}

impl SqliteRepository {
    /// Persist or replace a canonical assessment definition.
    ///
    /// Authoring happens upstream; this exists so deployments and tests can
    /// seed the grading source of truth.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if serialization or the write fails.
    pub async fn upsert_assessment(
        &self,
        assessment: &CanonicalAssessment,
    ) -> Result<(), StorageError> {
        let id = id_i64("assessment_id", assessment.id().value())?;
        let questions = questions_to_payload(assessment.questions())?;

        sqlx::query(
            r"
                INSERT INTO assessments (id, week, time_limit_minutes, questions)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(id) DO UPDATE SET
                    week = excluded.week,
                    time_limit_minutes = excluded.time_limit_minutes,
                    questions = excluded.questions
            ",
        )
        .bind(id)
        .bind(assessment.week())
        .bind(assessment.time_limit_minutes().map(i64::from))
        .bind(questions)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn fetch_canonical(
        &self,
        id: AssessmentId,
    ) -> Result<CanonicalAssessment, StorageError> {
        let row = sqlx::query(
            "SELECT id, week, time_limit_minutes, questions FROM assessments WHERE id = ?1",
        )
        .bind(id_i64("assessment_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        let week: Option<String> = row.try_get("week").map_err(ser)?;
        let time_limit: Option<i64> = row.try_get("time_limit_minutes").map_err(ser)?;
        let time_limit = time_limit
            .map(|v| u32::try_from(v).map_err(|_| ser(format!("invalid time limit: {v}"))))
            .transpose()?;
        let questions_json: String = row.try_get("questions").map_err(ser)?;
        let questions = payload_to_questions(&questions_json)?;

        CanonicalAssessment::new(id, week, time_limit, questions).map_err(ser)
    }
}

#[async_trait::async_trait]
impl AssessmentRepository for SqliteRepository {
    async fn fetch_student_assessment(
        &self,
        id: AssessmentId,
    ) -> Result<Assessment, StorageError> {
        Ok(self.fetch_canonical(id).await?.sanitize())
    }

    async fn fetch_canonical_assessment(
        &self,
        id: AssessmentId,
    ) -> Result<CanonicalAssessment, StorageError> {
        self.fetch_canonical(id).await
    }
}

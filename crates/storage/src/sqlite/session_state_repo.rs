use std::collections::BTreeMap;

use assess_core::model::{AssessmentId, OptionLabel};
use sqlx::Row;

use super::{
    SqliteRepository,
    mapping::{answers_from_json, answers_to_json, id_i64, ser},
};
use crate::repository::{SessionSnapshot, SessionStore, StorageError};

// Each field is upserted independently: the store is not transactional and
// the owning component writes its own field whenever it mutates it.

#[async_trait::async_trait]
impl SessionStore for SqliteRepository {
    async fn load(&self, assessment: AssessmentId) -> Result<SessionSnapshot, StorageError> {
        let row = sqlx::query(
            r"
                SELECT started_at_ms, remaining_seconds, answers
                FROM session_state
                WHERE assessment_id = ?1
            ",
        )
        .bind(id_i64("assessment_id", assessment.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let Some(row) = row else {
            return Ok(SessionSnapshot::default());
        };

        let started_at_ms: Option<i64> = row.try_get("started_at_ms").map_err(ser)?;
        let remaining: Option<i64> = row.try_get("remaining_seconds").map_err(ser)?;
        let remaining_seconds = remaining
            .map(|v| u32::try_from(v).map_err(|_| ser(format!("invalid remaining: {v}"))))
            .transpose()?;
        let answers_json: Option<String> = row.try_get("answers").map_err(ser)?;
        let answers = answers_json
            .as_deref()
            .map(answers_from_json)
            .transpose()?;

        Ok(SessionSnapshot {
            started_at_ms,
            remaining_seconds,
            answers,
        })
    }

    async fn save_started_at(
        &self,
        assessment: AssessmentId,
        started_at_ms: i64,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO session_state (assessment_id, started_at_ms)
                VALUES (?1, ?2)
                ON CONFLICT(assessment_id) DO UPDATE SET started_at_ms = excluded.started_at_ms
            ",
        )
        .bind(id_i64("assessment_id", assessment.value())?)
        .bind(started_at_ms)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn save_remaining(
        &self,
        assessment: AssessmentId,
        remaining_seconds: u32,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO session_state (assessment_id, remaining_seconds)
                VALUES (?1, ?2)
                ON CONFLICT(assessment_id) DO UPDATE SET
                    remaining_seconds = excluded.remaining_seconds
            ",
        )
        .bind(id_i64("assessment_id", assessment.value())?)
        .bind(i64::from(remaining_seconds))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn save_answers(
        &self,
        assessment: AssessmentId,
        answers: &BTreeMap<usize, OptionLabel>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO session_state (assessment_id, answers)
                VALUES (?1, ?2)
                ON CONFLICT(assessment_id) DO UPDATE SET answers = excluded.answers
            ",
        )
        .bind(id_i64("assessment_id", assessment.value())?)
        .bind(answers_to_json(answers)?)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn clear(&self, assessment: AssessmentId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM session_state WHERE assessment_id = ?1")
            .bind(id_i64("assessment_id", assessment.value())?)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }
}

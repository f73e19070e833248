use assess_core::model::{AssessmentId, ResultId, ResultRecord, StudentId};
use sqlx::Row;
use uuid::Uuid;

use super::{
    SqliteRepository,
    mapping::{answers_from_json, answers_to_json, assessment_id_from_i64, id_i64, ser, student_id_from_i64},
};
use crate::repository::{ResultRepository, StorageError};

fn map_result_row(row: &sqlx::sqlite::SqliteRow) -> Result<ResultRecord, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    let id = ResultId::from_uuid(Uuid::parse_str(&id).map_err(ser)?);
    let student_id = student_id_from_i64(row.try_get::<i64, _>("student_id").map_err(ser)?)?;
    let assessment_id =
        assessment_id_from_i64(row.try_get::<i64, _>("assessment_id").map_err(ser)?)?;
    let week: Option<String> = row.try_get("week").map_err(ser)?;
    let percentage: i64 = row.try_get("percentage").map_err(ser)?;
    let percentage = u8::try_from(percentage)
        .map_err(|_| StorageError::Serialization(format!("invalid percentage: {percentage}")))?;
    let correct_line: String = row.try_get("correct_line").map_err(ser)?;
    let answers_json: String = row.try_get("answers").map_err(ser)?;
    let started_at_display: String = row.try_get("started_at_display").map_err(ser)?;
    let ended_at_display: String = row.try_get("ended_at_display").map_err(ser)?;
    let created_at = row.try_get("created_at").map_err(ser)?;

    ResultRecord::from_persisted(
        id,
        student_id,
        assessment_id,
        week,
        percentage,
        correct_line,
        answers_from_json(&answers_json)?,
        started_at_display,
        ended_at_display,
        created_at,
    )
    .map_err(ser)
}

#[async_trait::async_trait]
impl ResultRepository for SqliteRepository {
    async fn has_existing_result(
        &self,
        student: StudentId,
        assessment: AssessmentId,
    ) -> Result<bool, StorageError> {
        let row = sqlx::query(
            "SELECT 1 FROM results WHERE student_id = ?1 AND assessment_id = ?2",
        )
        .bind(id_i64("student_id", student.value())?)
        .bind(id_i64("assessment_id", assessment.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(row.is_some())
    }

    async fn write_result(&self, record: &ResultRecord) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO results (
                    id, student_id, assessment_id, week, percentage, correct_line,
                    answers, started_at_display, ended_at_display, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
        )
        .bind(record.id().as_uuid().to_string())
        .bind(id_i64("student_id", record.student_id().value())?)
        .bind(id_i64("assessment_id", record.assessment_id().value())?)
        .bind(record.week())
        .bind(i64::from(record.percentage()))
        .bind(record.correct_line())
        .bind(answers_to_json(record.answers())?)
        .bind(record.started_at_display())
        .bind(record.ended_at_display())
        .bind(record.created_at())
        .execute(&self.pool)
        .await;

        match res {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StorageError::Conflict)
            }
            Err(e) => Err(StorageError::Connection(e.to_string())),
        }
    }

    async fn get_result(
        &self,
        student: StudentId,
        assessment: AssessmentId,
    ) -> Result<ResultRecord, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, student_id, assessment_id, week, percentage, correct_line,
                       answers, started_at_display, ended_at_display, created_at
                FROM results
                WHERE student_id = ?1 AND assessment_id = ?2
            ",
        )
        .bind(id_i64("student_id", student.value())?)
        .bind(id_i64("assessment_id", assessment.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        map_result_row(&row)
    }
}

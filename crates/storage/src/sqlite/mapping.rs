use std::collections::BTreeMap;

use assess_core::model::{AssessmentId, OptionLabel, StudentId};

use crate::repository::StorageError;

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn assessment_id_from_i64(v: i64) -> Result<AssessmentId, StorageError> {
    u64::try_from(v)
        .map(AssessmentId::new)
        .map_err(|_| StorageError::Serialization(format!("invalid assessment_id: {v}")))
}

pub(crate) fn student_id_from_i64(v: i64) -> Result<StudentId, StorageError> {
    u64::try_from(v)
        .map(StudentId::new)
        .map_err(|_| StorageError::Serialization(format!("invalid student_id: {v}")))
}

pub(crate) fn answers_to_json(
    answers: &BTreeMap<usize, OptionLabel>,
) -> Result<String, StorageError> {
    serde_json::to_string(answers).map_err(ser)
}

pub(crate) fn answers_from_json(json: &str) -> Result<BTreeMap<usize, OptionLabel>, StorageError> {
    serde_json::from_str(json).map_err(ser)
}

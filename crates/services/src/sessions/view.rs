use serde::Serialize;
use std::sync::Arc;

use assess_core::grading;
use assess_core::model::{AssessmentId, OptionLabel, QuestionPrompt, StudentId};
use storage::repository::{AssessmentRepository, ResultRepository};

use crate::error::SessionError;

/// Per-question line of the review breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionReview {
    pub index: usize,
    pub prompt: QuestionPrompt,
    pub options: Vec<OptionLabel>,
    pub submitted: Option<OptionLabel>,
    pub correct_label: OptionLabel,
    pub is_correct: bool,
}

/// Everything the read-only result view needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultReview {
    pub correct: usize,
    pub total: usize,
    pub percentage: u8,
    pub correct_line: String,
    pub week: Option<String>,
    /// Derived from the record's formatted start/end timestamps.
    pub elapsed_seconds: u64,
    pub questions: Vec<QuestionReview>,
}

/// Rebuilds per-question correctness for a finalized attempt.
///
/// The result record stores raw answers only, so correctness is recomputed
/// here against the canonical assessment, through the same grading routine
/// the arbiter used. The two can therefore never disagree.
#[derive(Clone)]
pub struct ReviewService {
    assessments: Arc<dyn AssessmentRepository>,
    results: Arc<dyn ResultRepository>,
}

impl ReviewService {
    #[must_use]
    pub fn new(
        assessments: Arc<dyn AssessmentRepository>,
        results: Arc<dyn ResultRepository>,
    ) -> Self {
        Self {
            assessments,
            results,
        }
    }

    /// Reconstruct the review breakdown for a finalized attempt.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFound` when either the result or the
    /// canonical assessment is missing; the host redirects away from the
    /// view. Other storage failures propagate as `SessionError::Storage`.
    pub async fn reconstruct(
        &self,
        student: StudentId,
        assessment_id: AssessmentId,
    ) -> Result<ResultReview, SessionError> {
        let record = self.results.get_result(student, assessment_id).await?;
        let canonical = self
            .assessments
            .fetch_canonical_assessment(assessment_id)
            .await?;

        let sheet = grading::grade(canonical.questions(), record.answers());
        let questions = canonical
            .questions()
            .iter()
            .zip(sheet.outcomes())
            .map(|(question, outcome)| QuestionReview {
                index: outcome.index,
                prompt: question.prompt().clone(),
                options: question.options().to_vec(),
                submitted: outcome.submitted.clone(),
                correct_label: outcome.correct_label.clone(),
                is_correct: outcome.is_correct,
            })
            .collect();

        Ok(ResultReview {
            correct: sheet.correct(),
            total: sheet.total(),
            percentage: sheet.percentage(),
            correct_line: sheet.correct_line(),
            week: record.week().map(ToOwned::to_owned),
            elapsed_seconds: record.elapsed_seconds(),
            questions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assess_core::model::{
        CanonicalAssessment, CanonicalQuestion, ResultRecord,
    };
    use chrono::Utc;
    use std::collections::BTreeMap;
    use storage::repository::InMemoryRepository;

    fn seed(repo: &InMemoryRepository) {
        let questions = ["A", "B", "D"]
            .iter()
            .enumerate()
            .map(|(i, c)| {
                CanonicalQuestion::new(
                    i,
                    Some(format!("Q{i}")),
                    None,
                    vec![
                        OptionLabel::new("A"),
                        OptionLabel::new("B"),
                        OptionLabel::new("C"),
                        OptionLabel::new("D"),
                    ],
                    OptionLabel::new(*c),
                )
                .unwrap()
            })
            .collect();
        let assessment = CanonicalAssessment::new(
            AssessmentId::new(1),
            Some("Week 4".to_owned()),
            None,
            questions,
        )
        .unwrap();
        repo.upsert_assessment(&assessment).unwrap();
    }

    fn service(repo: &InMemoryRepository) -> ReviewService {
        ReviewService::new(Arc::new(repo.clone()), Arc::new(repo.clone()))
    }

    #[tokio::test]
    async fn breakdown_matches_the_original_grading() {
        let repo = InMemoryRepository::new();
        seed(&repo);

        // Submitted [a, B] with the third question unanswered; the record
        // stores raw answers and the arbiter's totals.
        let answers = BTreeMap::from([
            (0, OptionLabel::new("a")),
            (1, OptionLabel::new("B")),
        ]);
        let record = ResultRecord::new(
            StudentId::new(6),
            AssessmentId::new(1),
            Some("Week 4".to_owned()),
            67,
            "2 / 3".to_owned(),
            answers,
            1_700_000_000_000,
            1_700_000_185_000,
            Utc::now(),
        )
        .unwrap();
        repo.write_result(&record).await.unwrap();

        let review = service(&repo)
            .reconstruct(StudentId::new(6), AssessmentId::new(1))
            .await
            .unwrap();

        assert_eq!(review.correct, 2);
        assert_eq!(review.total, 3);
        assert_eq!(review.percentage, 67);
        assert_eq!(review.correct_line, "2 / 3");
        assert_eq!(review.week.as_deref(), Some("Week 4"));
        assert_eq!(review.elapsed_seconds, 185);

        assert_eq!(review.questions.len(), 3);
        assert!(review.questions[0].is_correct); // "a" matches "A"
        assert!(review.questions[1].is_correct);
        assert!(!review.questions[2].is_correct);
        assert_eq!(review.questions[2].submitted, None);
        assert_eq!(review.questions[2].correct_label, OptionLabel::new("D"));
    }

    #[tokio::test]
    async fn missing_result_is_fatal_to_the_view() {
        let repo = InMemoryRepository::new();
        seed(&repo);

        let err = service(&repo)
            .reconstruct(StudentId::new(99), AssessmentId::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotFound));
        assert!(err.redirect().is_some());
    }
}

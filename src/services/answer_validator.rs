use std::sync::Arc;

use thiserror::Error;

use crate::core::metrics;
use crate::schemas::{Attempt, Exercise, UserAnswer, ValidationResult};
use crate::services::exercise_api::{ApiError, ExerciseApi};

const LOAD_FALLBACK: &str = "Failed to load the exercise";
const VALIDATE_FALLBACK: &str = "Failed to validate the answer";
const SUBMIT_FALLBACK: &str = "Failed to submit the answer";
const STATUS_FALLBACK: &str = "Failed to check the attempt status";

/// Typed outcomes of the boundary calls. Messages are ready to show to the learner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExerciseError {
    #[error("{0}")]
    NotGenerated(String),
    #[error("{0}")]
    ValidationFailed(String),
    #[error("{0}")]
    SubmitFailed(String),
    #[error("{0}")]
    StatusFailed(String),
    #[error("exercise data is inconsistent: {0}")]
    Integrity(String),
}

fn user_message(err: &ApiError, fallback: &str) -> String {
    err.server_message().map(ToString::to_string).unwrap_or_else(|| fallback.to_string())
}

/// Stateless bridge between the learner's answer and the exercise service.
#[derive(Clone)]
pub struct AnswerValidator {
    api: Arc<dyn ExerciseApi>,
}

impl AnswerValidator {
    pub fn new(api: Arc<dyn ExerciseApi>) -> Self {
        Self { api }
    }

    pub fn api(&self) -> Arc<dyn ExerciseApi> {
        Arc::clone(&self.api)
    }

    pub async fn generate_exercise(&self, lesson_id: &str) -> Result<Exercise, ExerciseError> {
        let mut exercise = self.api.fetch_exercise(lesson_id).await.map_err(|err| {
            tracing::warn!(lesson_id, error = %err, "exercise load failed");
            ExerciseError::NotGenerated(user_message(&err, LOAD_FALLBACK))
        })?;

        if exercise.lesson_id.is_empty() {
            exercise.lesson_id = lesson_id.to_string();
        }
        exercise.check_integrity().map_err(|detail| {
            tracing::warn!(lesson_id, detail = %detail, "exercise failed integrity checks");
            ExerciseError::Integrity(detail)
        })?;

        tracing::debug!(
            lesson_id,
            content_type = exercise.content.type_name(),
            max_points = exercise.max_points,
            "exercise loaded"
        );
        Ok(exercise)
    }

    pub async fn validate_answer(
        &self,
        lesson_id: &str,
        answer: &UserAnswer,
    ) -> Result<ValidationResult, ExerciseError> {
        let raw = self.api.validate_answer(lesson_id, answer).await.map_err(|err| {
            tracing::warn!(lesson_id, error = %err, "answer validation failed");
            ExerciseError::ValidationFailed(user_message(&err, VALIDATE_FALLBACK))
        })?;

        let result = ValidationResult::try_from(raw).map_err(|err| {
            tracing::warn!(lesson_id, error = %err, "validation result rejected");
            ExerciseError::ValidationFailed(VALIDATE_FALLBACK.to_string())
        })?;

        metrics::record_validation(result.status.as_str());
        tracing::info!(
            lesson_id,
            status = result.status.as_str(),
            score = result.score,
            correct = result.is_correct(),
            "answer validated"
        );
        Ok(result)
    }

    pub async fn submit_final(&self, lesson_id: &str, answer: &UserAnswer) -> Result<Attempt, ExerciseError> {
        let attempt = self.api.submit_answer(lesson_id, answer).await.map_err(|err| {
            tracing::warn!(lesson_id, error = %err, "final submission failed");
            ExerciseError::SubmitFailed(user_message(&err, SUBMIT_FALLBACK))
        })?;

        tracing::info!(lesson_id, attempt_id = %attempt.id, status = attempt.status.as_str(), "answer submitted");
        Ok(attempt)
    }

    pub async fn attempt_status(&self, lesson_id: &str) -> Result<Option<Attempt>, ExerciseError> {
        self.api.attempt_status(lesson_id).await.map_err(|err| {
            tracing::warn!(lesson_id, error = %err, "attempt status check failed");
            ExerciseError::StatusFailed(user_message(&err, STATUS_FALLBACK))
        })
    }
}

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::schemas::{Attempt, AttemptStatus, Exercise, RawValidationResult, UserAnswer};
use crate::services::exercise_api::{ApiError, ExerciseApi};

#[derive(Debug, Default)]
pub(crate) struct CallCounts {
    pub(crate) fetch: AtomicUsize,
    pub(crate) validate: AtomicUsize,
    pub(crate) submit: AtomicUsize,
    pub(crate) status: AtomicUsize,
}

impl CallCounts {
    pub(crate) fn total(&self) -> usize {
        self.fetch.load(Ordering::SeqCst)
            + self.validate.load(Ordering::SeqCst)
            + self.submit.load(Ordering::SeqCst)
            + self.status.load(Ordering::SeqCst)
    }
}

/// Scripted in-memory exercise service. Queued responses are consumed in order; once a
/// status queue is empty the fallback attempt (or `None`) is returned.
#[derive(Default)]
pub(crate) struct FakeExerciseApi {
    pub(crate) calls: CallCounts,
    exercise: Mutex<Option<Exercise>>,
    validations: Mutex<VecDeque<Result<RawValidationResult, ApiError>>>,
    submits: Mutex<VecDeque<Result<Attempt, ApiError>>>,
    statuses: Mutex<VecDeque<Result<Option<Attempt>, ApiError>>>,
    status_fallback: Mutex<Option<Attempt>>,
    status_failure: Mutex<Option<String>>,
    submitted: Mutex<Vec<Value>>,
}

impl FakeExerciseApi {
    pub(crate) fn set_exercise(&self, exercise: Exercise) {
        *self.exercise.lock().expect("lock") = Some(exercise);
    }

    pub(crate) fn push_validation(&self, result: Result<RawValidationResult, ApiError>) {
        self.validations.lock().expect("lock").push_back(result);
    }

    pub(crate) fn push_submit(&self, result: Result<Attempt, ApiError>) {
        self.submits.lock().expect("lock").push_back(result);
    }

    pub(crate) fn push_status(&self, result: Result<Option<Attempt>, ApiError>) {
        self.statuses.lock().expect("lock").push_back(result);
    }

    pub(crate) fn set_status_fallback(&self, attempt: Option<Attempt>) {
        *self.status_fallback.lock().expect("lock") = attempt;
    }

    pub(crate) fn fail_status(&self, message: &str) {
        *self.status_failure.lock().expect("lock") = Some(message.to_string());
    }

    /// Wire answers seen by validate and submit, in call order.
    pub(crate) fn submitted_answers(&self) -> Vec<Value> {
        self.submitted.lock().expect("lock").clone()
    }
}

#[async_trait]
impl ExerciseApi for FakeExerciseApi {
    async fn fetch_exercise(&self, _lesson_id: &str) -> Result<Exercise, ApiError> {
        self.calls.fetch.fetch_add(1, Ordering::SeqCst);
        self.exercise
            .lock()
            .expect("lock")
            .clone()
            .ok_or(ApiError::MissingData { endpoint: "exercise" })
    }

    async fn validate_answer(
        &self,
        _lesson_id: &str,
        answer: &UserAnswer,
    ) -> Result<RawValidationResult, ApiError> {
        self.calls.validate.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().expect("lock").push(answer.to_wire());
        self.validations
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or(Err(ApiError::MissingData { endpoint: "validate" }))
    }

    async fn submit_answer(&self, _lesson_id: &str, answer: &UserAnswer) -> Result<Attempt, ApiError> {
        self.calls.submit.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().expect("lock").push(answer.to_wire());
        self.submits
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or(Err(ApiError::MissingData { endpoint: "submit" }))
    }

    async fn attempt_status(&self, _lesson_id: &str) -> Result<Option<Attempt>, ApiError> {
        self.calls.status.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.status_failure.lock().expect("lock").clone() {
            return Err(ApiError::Rejected { endpoint: "attempt_status", message });
        }
        if let Some(next) = self.statuses.lock().expect("lock").pop_front() {
            return next;
        }
        Ok(self.status_fallback.lock().expect("lock").clone())
    }
}

/// Exercise for lesson `L1` around the given `{type, data}` content.
pub(crate) fn sample_exercise(content: Value) -> Exercise {
    serde_json::from_value(json!({
        "id": "ex-1",
        "lessonId": "L1",
        "type": content["type"].clone(),
        "instructions": "Answer the question below",
        "content": content,
        "maxPoints": 10,
        "generatedAt": "2025-03-01T12:00:00Z"
    }))
    .expect("sample exercise")
}

pub(crate) fn true_false_exercise() -> Exercise {
    sample_exercise(json!({
        "type": "true_false",
        "data": {"statement": "Rust moves values by default", "correctAnswer": true}
    }))
}

pub(crate) fn multiple_choice_exercise() -> Exercise {
    sample_exercise(json!({
        "type": "multiple_choice",
        "data": {
            "question": "Which keyword declares an immutable binding?",
            "options": [
                {"id": "opt-a", "text": "let"},
                {"id": "opt-b", "text": "mut"},
                {"id": "opt-c", "text": "static"}
            ],
            "correctOptionId": "opt-a"
        }
    }))
}

pub(crate) fn fill_blank_exercise() -> Exercise {
    sample_exercise(json!({
        "type": "fill_blank",
        "data": {"text": "fn ___() -> ___ {}", "blanks": [{"id": 0}, {"id": 1}]}
    }))
}

pub(crate) fn attempt(id: &str, status: AttemptStatus, score: Option<u32>) -> Attempt {
    Attempt {
        id: id.to_string(),
        user_id: "user-1".to_string(),
        lesson_id: "L1".to_string(),
        answer: Value::Null,
        status,
        feedback: (status != AttemptStatus::Pending).then(|| "Graded".to_string()),
        score,
        created_at: None,
        evaluated_at: None,
    }
}

pub(crate) fn pending_attempt(id: &str) -> Attempt {
    attempt(id, AttemptStatus::Pending, None)
}

pub(crate) fn raw_validation(status: &str, score: f64) -> RawValidationResult {
    RawValidationResult {
        score,
        feedback: format!("{status} feedback"),
        suggestions: None,
        status: status.to_string(),
    }
}

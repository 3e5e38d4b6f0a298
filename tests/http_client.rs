use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use reqwest::{Client, Url};
use serde_json::{json, Value};

use lesson_exercises::core::auth::StaticToken;
use lesson_exercises::schemas::{AttemptStatus, ExerciseType, UserAnswer};
use lesson_exercises::services::ApiError;
use lesson_exercises::{
    AnswerValidator, ExerciseApi, ExerciseError, ExerciseViewController, HttpExerciseApi, Phase,
    PollConfig, PollOutcome,
};

#[derive(Clone, Default)]
struct Mock {
    submitted: Arc<AtomicBool>,
    status_calls: Arc<AtomicUsize>,
    headers: Arc<Mutex<Vec<HeaderMap>>>,
    bodies: Arc<Mutex<Vec<Value>>>,
}

fn exercise_body(lesson_id: &str) -> Value {
    json!({
        "lessonId": lesson_id,
        "type": "true_false",
        "instructions": "Decide whether the statement holds",
        "content": {"type": "true_false", "data": {"statement": "Borrowing moves the value", "correctAnswer": false}},
        "maxPoints": 10,
        "generatedAt": "2025-03-01T12:00:00Z"
    })
}

fn attempt_body(status: &str, score: Option<u32>) -> Value {
    json!({"id": "att-1", "userId": "u-1", "lessonId": "L-flow", "answer": false, "status": status, "score": score})
}

async fn exercise(State(mock): State<Mock>, headers: HeaderMap, Path(lesson_id): Path<String>) -> Response {
    mock.headers.lock().expect("lock").push(headers);
    match lesson_id.as_str() {
        "bare" | "L-flow" => Json(exercise_body(&lesson_id)).into_response(),
        "wrapped" => Json(json!({"success": true, "data": exercise_body(&lesson_id), "message": "ok"})).into_response(),
        "not-ready" => Json(json!({"success": false, "message": "Exercise is still being generated"})).into_response(),
        "empty" => Json(json!({"success": true, "data": null})).into_response(),
        "broken" => (StatusCode::OK, "<html>oops</html>").into_response(),
        _ => (StatusCode::NOT_FOUND, Json(json!({"detail": "Lesson not found"}))).into_response(),
    }
}

async fn validate(State(mock): State<Mock>, Path(lesson_id): Path<String>, Json(body): Json<Value>) -> Response {
    mock.bodies.lock().expect("lock").push(body);
    match lesson_id.as_str() {
        "down" => (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": "Grader is overloaded"}))).into_response(),
        "silent" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        _ => Json(json!({
            "success": true,
            "data": {
                "isCorrect": false,
                "score": 95,
                "feedback": "Exactly right",
                "status": "approved_excellent"
            }
        }))
        .into_response(),
    }
}

async fn submit(State(mock): State<Mock>, Json(body): Json<Value>) -> Response {
    mock.bodies.lock().expect("lock").push(body);
    mock.submitted.store(true, Ordering::SeqCst);
    Json(attempt_body("pending", None)).into_response()
}

async fn attempt_status(State(mock): State<Mock>, Path(lesson_id): Path<String>) -> Response {
    match lesson_id.as_str() {
        "null-data" => Json(json!({"success": true, "data": null})).into_response(),
        "L-flow" if mock.submitted.load(Ordering::SeqCst) => {
            let call = mock.status_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call < 3 {
                Json(json!({"success": true, "data": attempt_body("pending", None)})).into_response()
            } else {
                Json(attempt_body("correct", Some(9))).into_response()
            }
        }
        _ => (StatusCode::NOT_FOUND, Json(json!({"detail": "No attempt"}))).into_response(),
    }
}

async fn spawn_server(mock: Mock) -> Url {
    let router = Router::new()
        .route("/api/lessons/:lesson_id/exercise", get(exercise))
        .route("/api/lessons/:lesson_id/exercise/validate", post(validate))
        .route("/api/lessons/:lesson_id/exercise/submit", post(submit))
        .route("/api/lessons/:lesson_id/exercise/attempt-status", get(attempt_status))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("mock server");
    });

    Url::parse(&format!("http://{addr}/api")).expect("base url")
}

async fn client(mock: &Mock, token: Option<&str>) -> HttpExerciseApi {
    let base = spawn_server(mock.clone()).await;
    HttpExerciseApi::with_client(
        Client::new(),
        base,
        Arc::new(StaticToken::new(token.map(ToString::to_string))),
    )
}

#[tokio::test]
async fn bare_and_wrapped_exercises_decode_identically() {
    let mock = Mock::default();
    let api = client(&mock, None).await;

    let bare = api.fetch_exercise("bare").await.expect("bare exercise");
    let wrapped = api.fetch_exercise("wrapped").await.expect("wrapped exercise");

    assert_eq!(bare.content, wrapped.content);
    assert_eq!(wrapped.content.kind(), Some(ExerciseType::TrueFalse));
    assert_eq!(wrapped.max_points, 10);
}

#[tokio::test]
async fn success_false_is_treated_as_a_failure_with_server_message() {
    let mock = Mock::default();
    let api = client(&mock, None).await;

    let err = api.fetch_exercise("not-ready").await.expect_err("rejected");
    assert!(matches!(err, ApiError::Rejected { .. }));
    assert_eq!(err.server_message(), Some("Exercise is still being generated"));

    let validator = AnswerValidator::new(Arc::new(api));
    assert_eq!(
        validator.generate_exercise("not-ready").await,
        Err(ExerciseError::NotGenerated("Exercise is still being generated".to_string()))
    );
    assert_eq!(
        validator.generate_exercise("empty").await,
        Err(ExerciseError::NotGenerated("Failed to load the exercise".to_string()))
    );
    assert!(matches!(
        validator.generate_exercise("missing").await,
        Err(ExerciseError::NotGenerated(message)) if message == "Lesson not found"
    ));
}

#[tokio::test]
async fn non_json_success_body_is_a_decode_error() {
    let mock = Mock::default();
    let api = client(&mock, None).await;

    let err = api.fetch_exercise("broken").await.expect_err("decode");
    assert!(matches!(err, ApiError::Decode { endpoint: "exercise", .. }));
}

#[tokio::test]
async fn attempt_status_404_and_null_data_mean_no_attempt() {
    let mock = Mock::default();
    let api = client(&mock, None).await;

    assert_eq!(api.attempt_status("anything").await.expect("404 is not an error"), None);
    assert_eq!(api.attempt_status("null-data").await.expect("null data"), None);
}

#[tokio::test]
async fn requests_carry_bearer_token_and_request_id() {
    let mock = Mock::default();
    let api = client(&mock, Some("secret-token")).await;

    api.fetch_exercise("bare").await.expect("exercise");
    api.fetch_exercise("bare").await.expect("exercise");

    let headers = mock.headers.lock().expect("lock").clone();
    assert_eq!(headers.len(), 2);
    assert_eq!(
        headers[0].get("authorization").and_then(|value| value.to_str().ok()),
        Some("Bearer secret-token")
    );
    let first_id = headers[0].get("x-request-id").and_then(|value| value.to_str().ok());
    let second_id = headers[1].get("x-request-id").and_then(|value| value.to_str().ok());
    assert!(first_id.is_some_and(|id| uuid::Uuid::parse_str(id).is_ok()));
    assert_ne!(first_id, second_id);
}

#[tokio::test]
async fn anonymous_client_sends_no_authorization() {
    let mock = Mock::default();
    let api = client(&mock, None).await;

    api.fetch_exercise("bare").await.expect("exercise");
    assert!(mock.headers.lock().expect("lock")[0].get("authorization").is_none());
}

#[tokio::test]
async fn validation_derives_correctness_from_status() {
    let mock = Mock::default();
    let validator = AnswerValidator::new(Arc::new(client(&mock, None).await));

    let result = validator
        .validate_answer("L1", &UserAnswer::TrueFalse(Some(false)))
        .await
        .expect("validated");

    assert!(result.is_correct());
    assert_eq!(result.score, 95);
    assert_eq!(mock.bodies.lock().expect("lock")[0], json!({"userAnswer": false}));
}

#[tokio::test]
async fn validation_errors_use_server_message_or_fallback() {
    let mock = Mock::default();
    let validator = AnswerValidator::new(Arc::new(client(&mock, None).await));
    let answer = UserAnswer::Text("because".to_string());

    assert_eq!(
        validator.validate_answer("down", &answer).await,
        Err(ExerciseError::ValidationFailed("Grader is overloaded".to_string()))
    );
    assert_eq!(
        validator.validate_answer("silent", &answer).await,
        Err(ExerciseError::ValidationFailed("Failed to validate the answer".to_string()))
    );
}

#[tokio::test]
async fn final_submission_is_polled_to_a_grade_over_http() {
    let mock = Mock::default();
    let api = Arc::new(client(&mock, Some("token")).await);
    let scores = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&scores);

    let config = PollConfig { interval: Duration::from_millis(50), max_ticks: 20 };
    let mut controller = ExerciseViewController::from_api(api, config)
        .on_complete(move |score| sink.lock().expect("lock").push(score));

    controller.load("L-flow").await.expect("load");
    assert_eq!(controller.phase(), &Phase::Ready);

    controller
        .apply_edit(lesson_exercises::schemas::AnswerEdit::Choose(false))
        .expect("edit");
    let attempt = controller.submit_final().await.expect("submitted");
    assert_eq!(attempt.status, AttemptStatus::Pending);

    let outcome = tokio::time::timeout(Duration::from_secs(5), controller.next_grading_update())
        .await
        .expect("graded in time")
        .expect("outcome");

    assert!(matches!(outcome, PollOutcome::Graded(ref graded) if graded.status == AttemptStatus::Correct));
    assert_eq!(mock.status_calls.load(Ordering::SeqCst), 3);
    assert_eq!(*scores.lock().expect("lock"), vec![9]);
    assert_eq!(mock.bodies.lock().expect("lock").last(), Some(&json!({"answer": false})));

    controller.dispose();
}

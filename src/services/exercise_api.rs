use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::HeaderName;
use reqwest::{Client, Method, StatusCode, Url};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::core::auth::{StaticToken, TokenSource};
use crate::core::config::Settings;
use crate::core::metrics;
use crate::schemas::{Attempt, Exercise, RawValidationResult, UserAnswer};
use crate::services::envelope::{self, EnvelopeError};

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid {endpoint} url: {detail}")]
    InvalidUrl { endpoint: &'static str, detail: String },
    #[error("{endpoint} request failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned {status}{}", message_suffix(.message))]
    Status { endpoint: &'static str, status: StatusCode, message: Option<String> },
    #[error("{endpoint} was rejected: {message}")]
    Rejected { endpoint: &'static str, message: String },
    #[error("{endpoint} response carried no data")]
    MissingData { endpoint: &'static str },
    #[error("{endpoint} returned an unexpected payload: {detail}")]
    Decode { endpoint: &'static str, detail: String },
}

fn message_suffix(message: &Option<String>) -> String {
    message.as_deref().map(|message| format!(": {message}")).unwrap_or_default()
}

impl ApiError {
    /// Message the server itself provided, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Status { message, .. } => message.as_deref(),
            ApiError::Rejected { message, .. } => Some(message),
            _ => None,
        }
    }

    fn from_envelope(endpoint: &'static str, err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::Rejected(message) => ApiError::Rejected { endpoint, message },
            EnvelopeError::MissingData => ApiError::MissingData { endpoint },
            EnvelopeError::Decode(detail) => ApiError::Decode { endpoint, detail },
        }
    }
}

/// Remote operations of the exercise service, relative to `/lessons/{lessonId}/exercise`.
#[async_trait]
pub trait ExerciseApi: Send + Sync {
    async fn fetch_exercise(&self, lesson_id: &str) -> Result<Exercise, ApiError>;

    async fn validate_answer(
        &self,
        lesson_id: &str,
        answer: &UserAnswer,
    ) -> Result<RawValidationResult, ApiError>;

    async fn submit_answer(&self, lesson_id: &str, answer: &UserAnswer) -> Result<Attempt, ApiError>;

    /// `Ok(None)` when the lesson has no active attempt (HTTP 404 or null data).
    async fn attempt_status(&self, lesson_id: &str) -> Result<Option<Attempt>, ApiError>;
}

struct Reply {
    status: StatusCode,
    body: Value,
}

#[derive(Clone)]
pub struct HttpExerciseApi {
    client: Client,
    base_url: Url,
    tokens: Arc<dyn TokenSource>,
}

impl HttpExerciseApi {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(settings.api().connect_timeout())
            .timeout(settings.api().request_timeout())
            .build()
            .context("Failed to build exercise HTTP client")?;

        let base_url = Url::parse(&settings.api().api_base())
            .with_context(|| format!("Invalid exercise API base {}", settings.api().api_base()))?;
        let tokens = Arc::new(StaticToken::new(settings.auth().bearer_token.clone()));

        Ok(Self::with_client(client, base_url, tokens))
    }

    pub fn with_client(client: Client, base_url: Url, tokens: Arc<dyn TokenSource>) -> Self {
        Self { client, base_url, tokens }
    }

    fn exercise_url(&self, endpoint: &'static str, lesson_id: &str, tail: Option<&str>) -> Result<Url, ApiError> {
        if lesson_id.trim().is_empty() {
            return Err(ApiError::InvalidUrl { endpoint, detail: "lesson id is empty".to_string() });
        }

        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| ApiError::InvalidUrl {
                endpoint,
                detail: format!("{} cannot be a base url", self.base_url),
            })?;
            segments.pop_if_empty().extend(["lessons", lesson_id, "exercise"]);
            if let Some(tail) = tail {
                segments.push(tail);
            }
        }

        Ok(url)
    }

    async fn execute(
        &self,
        endpoint: &'static str,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<Reply, ApiError> {
        let request_id = Uuid::new_v4().to_string();
        let mut request =
            self.client.request(method.clone(), url.clone()).header(REQUEST_ID_HEADER, &request_id);
        if let Some(token) = self.tokens.bearer_token().await {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let started = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(source) => {
                metrics::record_request(endpoint, "transport_error", started.elapsed());
                tracing::warn!(endpoint, request_id = %request_id, %url, error = %source, "exercise request failed");
                return Err(ApiError::Transport { endpoint, source });
            }
        };

        let status = response.status();
        let raw_body = response.text().await.map_err(|source| ApiError::Transport { endpoint, source })?;
        let outcome = if status.is_success() { "ok" } else { "http_error" };
        metrics::record_request(endpoint, outcome, started.elapsed());
        tracing::debug!(
            endpoint,
            request_id = %request_id,
            method = %method,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "exercise request completed"
        );

        let body = if raw_body.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str::<Value>(&raw_body) {
                Ok(body) => body,
                Err(_) if !status.is_success() => Value::String(raw_body),
                Err(err) => {
                    return Err(ApiError::Decode {
                        endpoint,
                        detail: format!("non-JSON body (status {status}): {err}"),
                    })
                }
            }
        };

        Ok(Reply { status, body })
    }

    fn success_body(endpoint: &'static str, reply: Reply) -> Result<Value, ApiError> {
        if reply.status.is_success() {
            return Ok(reply.body);
        }

        let message = match &reply.body {
            Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            body => envelope::extract_error_message(body),
        };
        Err(ApiError::Status { endpoint, status: reply.status, message })
    }
}

#[async_trait]
impl ExerciseApi for HttpExerciseApi {
    async fn fetch_exercise(&self, lesson_id: &str) -> Result<Exercise, ApiError> {
        const ENDPOINT: &str = "exercise";
        let url = self.exercise_url(ENDPOINT, lesson_id, None)?;
        let reply = self.execute(ENDPOINT, Method::GET, url, None).await?;
        let body = Self::success_body(ENDPOINT, reply)?;

        envelope::unwrap_payload(body).map_err(|err| ApiError::from_envelope(ENDPOINT, err))
    }

    async fn validate_answer(
        &self,
        lesson_id: &str,
        answer: &UserAnswer,
    ) -> Result<RawValidationResult, ApiError> {
        const ENDPOINT: &str = "validate";
        let url = self.exercise_url(ENDPOINT, lesson_id, Some("validate"))?;
        let payload = json!({ "userAnswer": answer.to_wire() });
        let reply = self.execute(ENDPOINT, Method::POST, url, Some(payload)).await?;
        let body = Self::success_body(ENDPOINT, reply)?;

        envelope::unwrap_payload(body).map_err(|err| ApiError::from_envelope(ENDPOINT, err))
    }

    async fn submit_answer(&self, lesson_id: &str, answer: &UserAnswer) -> Result<Attempt, ApiError> {
        const ENDPOINT: &str = "submit";
        let url = self.exercise_url(ENDPOINT, lesson_id, Some("submit"))?;
        let payload = json!({ "answer": answer.to_wire() });
        let reply = self.execute(ENDPOINT, Method::POST, url, Some(payload)).await?;
        let body = Self::success_body(ENDPOINT, reply)?;

        envelope::unwrap_payload(body).map_err(|err| ApiError::from_envelope(ENDPOINT, err))
    }

    async fn attempt_status(&self, lesson_id: &str) -> Result<Option<Attempt>, ApiError> {
        const ENDPOINT: &str = "attempt_status";
        let url = self.exercise_url(ENDPOINT, lesson_id, Some("attempt-status"))?;
        let reply = self.execute(ENDPOINT, Method::GET, url, None).await?;
        if reply.status == StatusCode::NOT_FOUND {
            tracing::debug!(lesson_id, "no active attempt");
            return Ok(None);
        }
        let body = Self::success_body(ENDPOINT, reply)?;

        envelope::unwrap_optional_payload(body).map_err(|err| ApiError::from_envelope(ENDPOINT, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base: &str) -> HttpExerciseApi {
        HttpExerciseApi::with_client(
            Client::new(),
            Url::parse(base).expect("url"),
            Arc::new(StaticToken::anonymous()),
        )
    }

    #[test]
    fn exercise_urls_are_built_under_the_api_base() {
        let api = api("http://localhost:3000/api");
        assert_eq!(
            api.exercise_url("exercise", "L1", None).expect("url").as_str(),
            "http://localhost:3000/api/lessons/L1/exercise"
        );
        assert_eq!(
            api.exercise_url("attempt_status", "L1", Some("attempt-status")).expect("url").as_str(),
            "http://localhost:3000/api/lessons/L1/exercise/attempt-status"
        );
    }

    #[test]
    fn lesson_ids_are_escaped_as_one_segment() {
        let api = api("http://localhost:3000/api/");
        let url = api.exercise_url("validate", "a/b c", Some("validate")).expect("url");
        assert_eq!(url.as_str(), "http://localhost:3000/api/lessons/a%2Fb%20c/exercise/validate");
    }

    #[test]
    fn empty_lesson_id_is_rejected_before_any_request() {
        let err = api("http://localhost:3000/api").exercise_url("exercise", " ", None).expect_err("empty");
        assert!(matches!(err, ApiError::InvalidUrl { endpoint: "exercise", .. }));
    }

    #[test]
    fn non_success_plain_text_body_becomes_the_message() {
        let reply = Reply { status: StatusCode::BAD_GATEWAY, body: Value::String("upstream down".to_string()) };
        let err = HttpExerciseApi::success_body("submit", reply).expect_err("status");
        assert_eq!(err.server_message(), Some("upstream down"));
        assert_eq!(err.to_string(), "submit returned 502 Bad Gateway: upstream down");
    }
}

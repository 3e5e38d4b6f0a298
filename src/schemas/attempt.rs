use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Pending,
    Correct,
    Incorrect,
}

impl AttemptStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, AttemptStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttemptStatus::Pending => "pending",
            AttemptStatus::Correct => "correct",
            AttemptStatus::Incorrect => "incorrect",
        }
    }

    pub fn badge(self) -> &'static str {
        match self {
            AttemptStatus::Pending => "Evaluating...",
            AttemptStatus::Correct => "Correct",
            AttemptStatus::Incorrect => "Incorrect",
        }
    }
}

/// Persisted record of a final submission; `pending` until the grader finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub lesson_id: String,
    #[serde(default)]
    pub answer: Value,
    pub status: AttemptStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_score")]
    pub score: Option<u32>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub evaluated_at: Option<OffsetDateTime>,
}

/// Graders may send fractional or out-of-range points; they are rounded into 0..=100.
fn lenient_score<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(raw.map(|value| {
        let score = if value.is_finite() { value.round().clamp(0.0, 100.0) as u32 } else { 0 };
        if (f64::from(score) - value).abs() >= 1.0 {
            tracing::warn!(raw_score = value, score, "attempt score outside 0..=100, clamped");
        }
        score
    }))
}

impl Attempt {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

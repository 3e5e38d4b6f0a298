use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Evaluating,
    ApprovedExcellent,
    ApprovedImprove,
    Rejected,
}

impl ValidationStatus {
    pub const ALL: [ValidationStatus; 4] = [
        ValidationStatus::Evaluating,
        ValidationStatus::ApprovedExcellent,
        ValidationStatus::ApprovedImprove,
        ValidationStatus::Rejected,
    ];

    pub fn is_correct(self) -> bool {
        !matches!(self, ValidationStatus::Rejected)
    }

    /// `evaluating` is provisional; the grade arrives later on the lesson's attempt.
    pub fn is_terminal(self) -> bool {
        !matches!(self, ValidationStatus::Evaluating)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValidationStatus::Evaluating => "evaluating",
            ValidationStatus::ApprovedExcellent => "approved_excellent",
            ValidationStatus::ApprovedImprove => "approved_improve",
            ValidationStatus::Rejected => "rejected",
        }
    }

    /// Accepts the server vocabulary with loose casing and `-`/space separators.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "evaluating" => Some(ValidationStatus::Evaluating),
            "approved_excellent" => Some(ValidationStatus::ApprovedExcellent),
            "approved_improve" => Some(ValidationStatus::ApprovedImprove),
            "rejected" => Some(ValidationStatus::Rejected),
            _ => None,
        }
    }

    pub fn headline(self) -> &'static str {
        match self {
            ValidationStatus::Evaluating => "Still evaluating",
            ValidationStatus::ApprovedExcellent => "Excellent!",
            ValidationStatus::ApprovedImprove => "Good, but it can improve",
            ValidationStatus::Rejected => "Incorrect",
        }
    }
}

/// Validation payload as the server sends it. Any `isCorrect` the server adds is ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawValidationResult {
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub suggestions: Option<String>,
    pub status: String,
}

/// Immutable judgment on one submitted answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub score: u8,
    pub feedback: String,
    pub suggestions: Option<String>,
    pub status: ValidationStatus,
}

impl ValidationResult {
    /// Always derived from `status`, never read from the wire.
    pub fn is_correct(&self) -> bool {
        self.status.is_correct()
    }

    /// Correct and final: the lesson can be marked complete.
    pub fn is_approved(&self) -> bool {
        self.status.is_terminal() && self.is_correct()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognised validation status: {0}")]
pub struct UnknownStatus(pub String);

impl TryFrom<RawValidationResult> for ValidationResult {
    type Error = UnknownStatus;

    fn try_from(raw: RawValidationResult) -> Result<Self, Self::Error> {
        let status = ValidationStatus::parse(&raw.status).ok_or(UnknownStatus(raw.status))?;
        let score = if raw.score.is_finite() { raw.score.round().clamp(0.0, 100.0) as u8 } else { 0 };
        if (score as f64 - raw.score).abs() >= 1.0 {
            tracing::warn!(raw_score = raw.score, score, "validation score outside 0..=100, clamped");
        }

        let suggestions = raw.suggestions.filter(|value| !value.trim().is_empty());

        Ok(Self { score, feedback: raw.feedback, suggestions, status })
    }
}

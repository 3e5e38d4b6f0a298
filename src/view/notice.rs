use std::fmt;

use crate::schemas::{Attempt, AttemptStatus, IncompleteAnswer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    LoadFailure,
    ValidationFailure,
    SubmitFailure,
    IncompleteAnswer,
    Evaluating,
    PollTimeout,
    StatusCheckFailure,
    UnsupportedType,
    Graded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl NoticeLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "success",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        }
    }
}

/// User-facing message queued by the controller. Blocking notices replace the exercise
/// form; the rest are transient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub level: NoticeLevel,
    pub title: String,
    pub detail: Option<String>,
    pub blocking: bool,
}

impl Notice {
    fn new(kind: NoticeKind, level: NoticeLevel, title: &str, detail: Option<String>) -> Self {
        Self { kind, level, title: title.to_string(), detail, blocking: false }
    }

    fn blocking(mut self) -> Self {
        self.blocking = true;
        self
    }

    pub fn load_failure(message: &str) -> Self {
        Self::new(
            NoticeKind::LoadFailure,
            NoticeLevel::Error,
            "Could not load the exercise",
            Some(message.to_string()),
        )
        .blocking()
    }

    pub fn validation_failure(message: &str) -> Self {
        Self::new(
            NoticeKind::ValidationFailure,
            NoticeLevel::Error,
            "Could not check your answer",
            Some(format!("{message}. Your answer was kept, try again.")),
        )
    }

    pub fn submit_failure(message: &str) -> Self {
        Self::new(
            NoticeKind::SubmitFailure,
            NoticeLevel::Error,
            "Could not submit your answer",
            Some(message.to_string()),
        )
    }

    pub fn incomplete(reason: &IncompleteAnswer) -> Self {
        Self::new(NoticeKind::IncompleteAnswer, NoticeLevel::Warning, &reason.to_string(), None)
    }

    pub fn evaluating() -> Self {
        Self::new(
            NoticeKind::Evaluating,
            NoticeLevel::Info,
            "Still evaluating",
            Some("Your answer is still being graded. Check back in a moment or try again.".to_string()),
        )
    }

    pub fn poll_timeout() -> Self {
        Self::new(
            NoticeKind::PollTimeout,
            NoticeLevel::Info,
            "Still evaluating",
            Some("Grading is taking longer than expected. Check back in a moment.".to_string()),
        )
    }

    pub fn status_check_failure(message: &str) -> Self {
        Self::new(
            NoticeKind::StatusCheckFailure,
            NoticeLevel::Warning,
            "Could not check the grading status",
            Some(message.to_string()),
        )
    }

    pub fn unsupported(content_type: &str) -> Self {
        Self::new(
            NoticeKind::UnsupportedType,
            NoticeLevel::Warning,
            "Exercise type not supported",
            Some(format!("\"{content_type}\" exercises cannot be answered here yet.")),
        )
        .blocking()
    }

    pub fn graded(attempt: &Attempt) -> Self {
        let level = match attempt.status {
            AttemptStatus::Correct => NoticeLevel::Success,
            AttemptStatus::Incorrect => NoticeLevel::Warning,
            AttemptStatus::Pending => NoticeLevel::Info,
        };
        Self::new(NoticeKind::Graded, level, attempt.status.badge(), attempt.feedback.clone())
    }

    /// Load failures come with an explicit retry action.
    pub fn offers_retry(&self) -> bool {
        self.kind == NoticeKind::LoadFailure
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level.as_str(), self.title)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_informational_not_an_error() {
        let notice = Notice::poll_timeout();
        assert_eq!(notice.level, NoticeLevel::Info);
        assert!(notice.to_string().contains("taking longer than expected"));
        assert!(!notice.to_string().to_lowercase().contains("failed"));
    }

    #[test]
    fn provisional_grade_is_informational() {
        let notice = Notice::evaluating();
        assert_eq!(notice.level, NoticeLevel::Info);
        assert!(!notice.blocking);
        assert!(!notice.offers_retry());
    }

    #[test]
    fn load_failure_blocks_and_offers_retry() {
        let notice = Notice::load_failure("Lesson not found");
        assert!(notice.blocking);
        assert!(notice.offers_retry());
        assert_eq!(notice.to_string(), "[error] Could not load the exercise: Lesson not found");
        assert!(!Notice::validation_failure("x").offers_retry());
    }

    #[test]
    fn incomplete_answer_is_a_transient_warning() {
        let notice = Notice::incomplete(&IncompleteAnswer::BlanksRemaining { missing: vec![1] });
        assert!(!notice.blocking);
        assert_eq!(notice.to_string(), "[warning] Complete all blanks before submitting");
    }
}

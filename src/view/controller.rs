use std::sync::Arc;

use thiserror::Error;
use tokio::sync::oneshot;

use crate::schemas::{
    AnswerEdit, Attempt, AttemptStatus, EditError, Exercise, ExerciseContent, IncompleteAnswer,
    UserAnswer, ValidationResult,
};
use crate::services::{AnswerValidator, ExerciseApi, ExerciseError};
use crate::tasks::{AttemptPoller, PollConfig, PollOutcome, PollerHandle};
use crate::view::notice::Notice;
use crate::view::widgets::Widget;

/// Called with the score when an answer is judged correct; at most once per loaded lesson.
pub type CompletionCallback = Box<dyn FnMut(u32) + Send>;

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    Loading,
    LoadFailed { message: String },
    Unsupported { content_type: String },
    Ready,
    Validating,
    Reviewed(ValidationResult),
    Submitting,
    AwaitingGrade { attempt_id: String },
    Graded(Attempt),
    StillEvaluating { attempt_id: String },
    Disposed,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Loading => "loading",
            Phase::LoadFailed { .. } => "load_failed",
            Phase::Unsupported { .. } => "unsupported",
            Phase::Ready => "ready",
            Phase::Validating => "validating",
            Phase::Reviewed(_) => "reviewed",
            Phase::Submitting => "submitting",
            Phase::AwaitingGrade { .. } => "awaiting_grade",
            Phase::Graded(_) => "graded",
            Phase::StillEvaluating { .. } => "still_evaluating",
            Phase::Disposed => "disposed",
        }
    }

    /// Terminal correct outcomes; nothing more can be submitted for this lesson.
    fn is_locked(&self) -> bool {
        match self {
            Phase::Reviewed(result) => result.is_approved(),
            Phase::Graded(attempt) => attempt.status == AttemptStatus::Correct,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error(transparent)]
    Incomplete(#[from] IncompleteAnswer),
    #[error("no exercise is ready to answer")]
    NotReady,
    #[error("this exercise is already complete")]
    Blocked,
    #[error(transparent)]
    Failed(#[from] ExerciseError),
    #[error(transparent)]
    InvalidEdit(#[from] EditError),
    #[error("the exercise session was closed")]
    Disposed,
}

struct ActivePoll {
    handle: PollerHandle,
    outcome: oneshot::Receiver<PollOutcome>,
}

/// Owns one learner's exercise session for a lesson: loading, answering, validation,
/// final submission and grading.
pub struct ExerciseViewController {
    validator: AnswerValidator,
    poller: AttemptPoller,
    lesson_id: String,
    phase: Phase,
    exercise: Option<Exercise>,
    answer: Option<UserAnswer>,
    last_attempt: Option<Attempt>,
    active_poll: Option<ActivePoll>,
    notices: Vec<Notice>,
    on_complete: Option<CompletionCallback>,
    completed: bool,
}

impl ExerciseViewController {
    pub fn new(validator: AnswerValidator, poller: AttemptPoller) -> Self {
        Self {
            validator,
            poller,
            lesson_id: String::new(),
            phase: Phase::Idle,
            exercise: None,
            answer: None,
            last_attempt: None,
            active_poll: None,
            notices: Vec::new(),
            on_complete: None,
            completed: false,
        }
    }

    pub fn from_api(api: Arc<dyn ExerciseApi>, config: PollConfig) -> Self {
        let validator = AnswerValidator::new(api);
        let poller = AttemptPoller::new(validator.clone(), config);
        Self::new(validator, poller)
    }

    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnMut(u32) + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn lesson_id(&self) -> &str {
        &self.lesson_id
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn exercise(&self) -> Option<&Exercise> {
        self.exercise.as_ref()
    }

    pub fn answer(&self) -> Option<&UserAnswer> {
        self.answer.as_ref()
    }

    pub fn last_attempt(&self) -> Option<&Attempt> {
        self.last_attempt.as_ref()
    }

    /// Widget for the loaded exercise, chosen by its content type.
    pub fn widget(&self) -> Option<Widget<'_>> {
        self.exercise.as_ref().map(|exercise| Widget::for_content(&exercise.content))
    }

    pub fn is_polling(&self) -> bool {
        self.active_poll.is_some()
    }

    pub fn poll_ticks(&self) -> Option<u32> {
        self.active_poll.as_ref().map(|poll| poll.handle.ticks())
    }

    /// The session may accept input: answered edits and submissions.
    pub fn accepts_input(&self) -> bool {
        self.phase == Phase::Ready
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Replaces the session with a freshly loaded lesson. Any running poll is cancelled.
    pub async fn load(&mut self, lesson_id: &str) -> Result<(), ViewError> {
        if self.phase == Phase::Disposed {
            return Err(ViewError::Disposed);
        }

        self.reset_session();
        self.lesson_id = lesson_id.to_string();
        self.phase = Phase::Loading;

        let (exercise, current_attempt) = tokio::join!(
            self.validator.generate_exercise(lesson_id),
            self.validator.attempt_status(lesson_id)
        );

        let exercise = match exercise {
            Ok(exercise) => exercise,
            Err(err) => {
                self.phase = Phase::LoadFailed { message: err.to_string() };
                self.notices.push(Notice::load_failure(&err.to_string()));
                return Err(ViewError::Failed(err));
            }
        };

        if exercise.type_mismatch() {
            tracing::warn!(
                lesson_id,
                declared = %exercise.declared_type,
                content_type = exercise.content.type_name(),
                "exercise type disagrees with content type; rendering by content"
            );
        }

        self.answer = UserAnswer::initial_for(&exercise.content);
        let content_type = exercise.content.type_name().to_string();
        self.exercise = Some(exercise);

        if self.answer.is_none() {
            tracing::warn!(lesson_id, content_type = %content_type, "unsupported exercise type");
            self.notices.push(Notice::unsupported(&content_type));
            self.phase = Phase::Unsupported { content_type };
            return Ok(());
        }

        self.phase = Phase::Ready;
        match current_attempt {
            Ok(Some(attempt)) => self.resume(attempt),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(lesson_id, error = %err, "ignoring attempt status failure during load");
            }
        }

        tracing::info!(lesson_id, phase = self.phase.name(), content_type = %content_type, "exercise session ready");
        Ok(())
    }

    /// Retry action offered after a load failure.
    pub async fn retry_load(&mut self) -> Result<(), ViewError> {
        let lesson_id = self.lesson_id.clone();
        if lesson_id.is_empty() {
            return Err(ViewError::NotReady);
        }
        self.load(&lesson_id).await
    }

    fn resume(&mut self, attempt: Attempt) {
        tracing::info!(
            lesson_id = %self.lesson_id,
            attempt_id = %attempt.id,
            status = attempt.status.as_str(),
            "resuming existing attempt"
        );
        match attempt.status {
            AttemptStatus::Pending => self.start_polling(attempt),
            AttemptStatus::Correct => {
                self.phase = Phase::Graded(attempt.clone());
                self.last_attempt = Some(attempt);
            }
            AttemptStatus::Incorrect => {
                self.last_attempt = Some(attempt);
            }
        }
    }

    pub fn apply_edit(&mut self, edit: AnswerEdit) -> Result<(), ViewError> {
        self.ensure_ready()?;
        let blank_count = self.blank_count();
        let answer = self.answer.as_mut().ok_or(ViewError::NotReady)?;
        answer.apply(edit, blank_count)?;
        Ok(())
    }

    /// Sends the current answer for validation. Incomplete answers never reach the network.
    pub async fn submit(&mut self) -> Result<ValidationResult, ViewError> {
        let answer = self.complete_answer()?;

        self.phase = Phase::Validating;
        match self.validator.validate_answer(&self.lesson_id, &answer).await {
            Ok(result) => {
                self.phase = Phase::Reviewed(result.clone());
                if !result.status.is_terminal() {
                    self.follow_provisional_grade().await;
                } else if result.is_correct() {
                    self.fire_complete(u32::from(result.score));
                }
                Ok(result)
            }
            Err(err) => {
                self.phase = Phase::Ready;
                self.notices.push(Notice::validation_failure(&err.to_string()));
                Err(ViewError::Failed(err))
            }
        }
    }

    /// An `evaluating` result is not a grade. Poll the lesson's attempt when the server has
    /// one; otherwise the result stays open for another try.
    async fn follow_provisional_grade(&mut self) {
        match self.validator.attempt_status(&self.lesson_id).await {
            Ok(Some(attempt)) if attempt.is_terminal() && self.last_attempt.as_ref() == Some(&attempt) => {
                tracing::debug!(lesson_id = %self.lesson_id, attempt_id = %attempt.id, "only an earlier attempt is graded");
                self.notices.push(Notice::evaluating());
            }
            Ok(Some(attempt)) if attempt.is_terminal() => {
                self.apply_poll_outcome(&PollOutcome::Graded(attempt));
            }
            Ok(Some(attempt)) => self.start_polling(attempt),
            Ok(None) => self.notices.push(Notice::evaluating()),
            Err(err) => {
                tracing::warn!(lesson_id = %self.lesson_id, error = %err, "attempt lookup after provisional grade failed");
                self.notices.push(Notice::evaluating());
            }
        }
    }

    /// Final submission: creates the attempt and starts polling for its grade.
    pub async fn submit_final(&mut self) -> Result<Attempt, ViewError> {
        let answer = self.complete_answer()?;

        self.phase = Phase::Submitting;
        match self.validator.submit_final(&self.lesson_id, &answer).await {
            Ok(attempt) => {
                self.start_polling(attempt.clone());
                Ok(attempt)
            }
            Err(err) => {
                self.phase = Phase::Ready;
                self.notices.push(Notice::submit_failure(&err.to_string()));
                Err(ViewError::Failed(err))
            }
        }
    }

    /// Clears a rejected result and starts over with an empty answer. The exercise is not
    /// fetched again.
    pub fn try_again(&mut self) -> Result<(), ViewError> {
        match &self.phase {
            Phase::Disposed => return Err(ViewError::Disposed),
            phase if phase.is_locked() => return Err(ViewError::Blocked),
            Phase::Reviewed(_) | Phase::Graded(_) => {}
            _ => return Err(ViewError::NotReady),
        }

        let exercise = self.exercise.as_ref().ok_or(ViewError::NotReady)?;
        self.answer = UserAnswer::initial_for(&exercise.content);
        self.phase = Phase::Ready;
        Ok(())
    }

    /// Waits for the running poll to finish and applies its outcome. `None` when nothing is
    /// being polled.
    pub async fn next_grading_update(&mut self) -> Option<PollOutcome> {
        let poll = self.active_poll.as_mut()?;
        let received = (&mut poll.outcome).await;
        self.active_poll = None;

        match received {
            Ok(outcome) => {
                self.apply_poll_outcome(&outcome);
                Some(outcome)
            }
            Err(_) => {
                tracing::warn!(lesson_id = %self.lesson_id, "attempt poller ended without an outcome");
                None
            }
        }
    }

    /// Manual refresh after polling timed out or failed.
    pub fn resume_polling(&mut self) -> Result<(), ViewError> {
        match &self.phase {
            Phase::StillEvaluating { .. } => {}
            Phase::Disposed => return Err(ViewError::Disposed),
            _ => return Err(ViewError::NotReady),
        }
        let attempt = self.last_attempt.clone().ok_or(ViewError::NotReady)?;
        self.start_polling(attempt);
        Ok(())
    }

    /// Ends the session. No poll tick fires after this returns.
    pub fn dispose(&mut self) {
        if self.phase == Phase::Disposed {
            return;
        }
        self.cancel_poll();
        self.phase = Phase::Disposed;
        tracing::debug!(lesson_id = %self.lesson_id, "exercise session disposed");
    }

    fn ensure_ready(&self) -> Result<(), ViewError> {
        match &self.phase {
            Phase::Ready => Ok(()),
            Phase::Disposed => Err(ViewError::Disposed),
            phase if phase.is_locked() => Err(ViewError::Blocked),
            _ => Err(ViewError::NotReady),
        }
    }

    fn blank_count(&self) -> usize {
        match self.exercise.as_ref().map(|exercise| &exercise.content) {
            Some(ExerciseContent::FillBlank(content)) => content.blank_count(),
            _ => 0,
        }
    }

    fn complete_answer(&mut self) -> Result<UserAnswer, ViewError> {
        self.ensure_ready()?;
        let answer = self.answer.clone().ok_or(ViewError::NotReady)?;
        if let Err(reason) = answer.check_complete(self.blank_count()) {
            tracing::debug!(lesson_id = %self.lesson_id, reason = %reason, "submission blocked locally");
            self.notices.push(Notice::incomplete(&reason));
            return Err(ViewError::Incomplete(reason));
        }
        Ok(answer)
    }

    fn start_polling(&mut self, attempt: Attempt) {
        self.cancel_poll();

        let (tx, rx) = oneshot::channel();
        let handle = self.poller.start(&self.lesson_id, &attempt, move |outcome| {
            let _ = tx.send(outcome);
        });

        self.phase = Phase::AwaitingGrade { attempt_id: attempt.id.clone() };
        self.last_attempt = Some(attempt);
        self.active_poll = Some(ActivePoll { handle, outcome: rx });
    }

    fn cancel_poll(&mut self) {
        if let Some(poll) = self.active_poll.take() {
            poll.handle.cancel();
            tracing::debug!(
                lesson_id = %self.lesson_id,
                attempt_id = poll.handle.attempt_id(),
                ticks = poll.handle.ticks(),
                "attempt poll cancelled"
            );
        }
    }

    fn apply_poll_outcome(&mut self, outcome: &PollOutcome) {
        match outcome {
            PollOutcome::Graded(attempt) => {
                self.notices.push(Notice::graded(attempt));
                if attempt.status == AttemptStatus::Correct {
                    self.fire_complete(attempt.score.unwrap_or(0));
                }
                self.last_attempt = Some(attempt.clone());
                self.phase = Phase::Graded(attempt.clone());
            }
            PollOutcome::TimedOut { attempt_id, .. } => {
                self.notices.push(Notice::poll_timeout());
                self.phase = Phase::StillEvaluating { attempt_id: attempt_id.clone() };
            }
            PollOutcome::Failed { attempt_id, message } => {
                self.notices.push(Notice::status_check_failure(message));
                self.phase = Phase::StillEvaluating { attempt_id: attempt_id.clone() };
            }
        }
    }

    fn fire_complete(&mut self, score: u32) {
        if self.completed {
            return;
        }
        self.completed = true;
        tracing::info!(lesson_id = %self.lesson_id, score, "exercise completed");
        if let Some(callback) = self.on_complete.as_mut() {
            callback(score);
        }
    }

    fn reset_session(&mut self) {
        self.cancel_poll();
        self.exercise = None;
        self.answer = None;
        self.last_attempt = None;
        self.notices.clear();
        self.completed = false;
    }
}

impl Drop for ExerciseViewController {
    fn drop(&mut self) {
        self.cancel_poll();
    }
}

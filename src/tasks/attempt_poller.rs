use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::core::config::PollSettings;
use crate::core::metrics;
use crate::schemas::Attempt;
use crate::services::AnswerValidator;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_MAX_TICKS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_ticks: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval: DEFAULT_INTERVAL, max_ticks: DEFAULT_MAX_TICKS }
    }
}

impl From<&PollSettings> for PollConfig {
    fn from(settings: &PollSettings) -> Self {
        Self { interval: settings.interval(), max_ticks: settings.max_attempts }
    }
}

/// How a polling session ended. Cancelled sessions report nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The attempt left `pending`; it may be correct or incorrect.
    Graded(Attempt),
    /// Budget exhausted while still `pending`. Grading may still finish server-side.
    TimedOut { attempt_id: String, ticks: u32 },
    /// A status fetch failed; polling stopped.
    Failed { attempt_id: String, message: String },
}

impl PollOutcome {
    fn label(&self) -> &'static str {
        match self {
            PollOutcome::Graded(_) => "graded",
            PollOutcome::TimedOut { .. } => "timed_out",
            PollOutcome::Failed { .. } => "failed",
        }
    }
}

/// Starts cancellable status-polling tasks for submitted attempts.
#[derive(Clone)]
pub struct AttemptPoller {
    validator: AnswerValidator,
    config: PollConfig,
}

impl AttemptPoller {
    pub fn new(validator: AnswerValidator, config: PollConfig) -> Self {
        Self { validator, config }
    }

    pub fn config(&self) -> PollConfig {
        self.config
    }

    /// Polls the lesson's attempt status every `interval`, first fetch one interval after
    /// start, and hands the outcome to `on_finish` unless the handle was cancelled first.
    pub fn start<F>(&self, lesson_id: &str, attempt: &Attempt, on_finish: F) -> PollerHandle
    where
        F: FnOnce(PollOutcome) + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let ticks = Arc::new(AtomicU32::new(0));

        let session = PollSession {
            validator: self.validator.clone(),
            config: self.config,
            lesson_id: lesson_id.to_string(),
            attempt_id: attempt.id.clone(),
            ticks: Arc::clone(&ticks),
        };
        let already_graded = attempt.is_terminal().then(|| attempt.clone());

        tracing::info!(
            lesson_id,
            attempt_id = %attempt.id,
            interval_ms = self.config.interval.as_millis() as u64,
            max_ticks = self.config.max_ticks,
            "attempt polling started"
        );

        let task = tokio::spawn(async move {
            let mut cancel = cancel_rx;
            let outcome = match already_graded {
                Some(attempt) => Some(PollOutcome::Graded(attempt)),
                None => session.run(&mut cancel).await,
            };

            match outcome {
                Some(outcome) if !*cancel.borrow() => {
                    metrics::record_poll_outcome(outcome.label());
                    tracing::info!(
                        lesson_id = %session.lesson_id,
                        attempt_id = %session.attempt_id,
                        outcome = outcome.label(),
                        ticks = session.ticks.load(Ordering::SeqCst),
                        "attempt polling finished"
                    );
                    on_finish(outcome);
                }
                _ => {
                    metrics::record_poll_outcome("cancelled");
                    tracing::debug!(
                        lesson_id = %session.lesson_id,
                        attempt_id = %session.attempt_id,
                        ticks = session.ticks.load(Ordering::SeqCst),
                        "attempt polling cancelled"
                    );
                }
            }
        });

        PollerHandle { attempt_id: attempt.id.clone(), cancel: cancel_tx, ticks, task: Some(task) }
    }
}

struct PollSession {
    validator: AnswerValidator,
    config: PollConfig,
    lesson_id: String,
    attempt_id: String,
    ticks: Arc<AtomicU32>,
}

impl PollSession {
    /// `None` when cancelled. Each fetch completes before the next tick is awaited, so
    /// responses never overlap.
    async fn run(&self, cancel: &mut watch::Receiver<bool>) -> Option<PollOutcome> {
        let mut timer = interval_at(Instant::now() + self.config.interval, self.config.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while self.ticks.load(Ordering::SeqCst) < self.config.max_ticks {
            tokio::select! {
                biased;
                _ = cancelled(cancel) => return None,
                _ = timer.tick() => {}
            }

            let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
            metrics::record_poll_tick();

            let fetched = tokio::select! {
                biased;
                _ = cancelled(cancel) => return None,
                fetched = self.validator.attempt_status(&self.lesson_id) => fetched,
            };

            match fetched {
                Ok(Some(attempt)) if attempt.id != self.attempt_id => {
                    tracing::debug!(
                        tick,
                        expected = %self.attempt_id,
                        received = %attempt.id,
                        "ignoring status for a different attempt"
                    );
                }
                Ok(Some(attempt)) if attempt.is_terminal() => {
                    return Some(PollOutcome::Graded(attempt));
                }
                Ok(_) => {
                    tracing::trace!(tick, attempt_id = %self.attempt_id, "attempt still pending");
                }
                Err(err) => {
                    return Some(PollOutcome::Failed {
                        attempt_id: self.attempt_id.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        Some(PollOutcome::TimedOut {
            attempt_id: self.attempt_id.clone(),
            ticks: self.ticks.load(Ordering::SeqCst),
        })
    }
}

/// Resolves once cancellation is requested or the handle is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            return;
        }
    }
}

/// Owner of one running poll. Dropping the handle cancels the poll.
pub struct PollerHandle {
    attempt_id: String,
    cancel: watch::Sender<bool>,
    ticks: Arc<AtomicU32>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn attempt_id(&self) -> &str {
        &self.attempt_id
    }

    /// Status fetches started so far.
    pub fn ticks(&self) -> u32 {
        self.ticks.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Waits for the polling task to exit, whether it finished or was cancelled.
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::error!(attempt_id = %self.attempt_id, error = %err, "attempt poller join failed");
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.send_replace(true);
    }
}

impl std::fmt::Debug for PollerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollerHandle")
            .field("attempt_id", &self.attempt_id)
            .field("ticks", &self.ticks())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

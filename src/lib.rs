pub mod core;
pub mod schemas;
pub mod services;
pub mod tasks;
pub mod view;

mod cli;

#[cfg(test)]
mod test_support;

pub use cli::run;
pub use services::{AnswerValidator, ExerciseApi, ExerciseError, HttpExerciseApi};
pub use tasks::{AttemptPoller, PollConfig, PollOutcome};
pub use view::{ExerciseViewController, Phase, ViewError};

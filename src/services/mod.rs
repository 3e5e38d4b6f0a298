pub mod answer_validator;
pub mod envelope;
pub mod exercise_api;

pub use answer_validator::{AnswerValidator, ExerciseError};
pub use exercise_api::{ApiError, ExerciseApi, HttpExerciseApi};

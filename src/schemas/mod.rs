pub mod answer;
pub mod attempt;
pub mod exercise;
pub mod validation;

pub use answer::{AnswerEdit, EditError, IncompleteAnswer, UserAnswer};
pub use attempt::{Attempt, AttemptStatus};
pub use exercise::{Exercise, ExerciseContent, ExerciseType};
pub use validation::{RawValidationResult, ValidationResult, ValidationStatus};

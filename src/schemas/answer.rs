use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::schemas::exercise::ExerciseContent;

/// The learner's in-progress response, shaped by the exercise content it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAnswer {
    TrueFalse(Option<bool>),
    MultipleChoice(Option<String>),
    /// Blank index (left to right, zero-based) to typed value.
    FillBlank(BTreeMap<usize, String>),
    /// Code completion and open-ended answers.
    Text(String),
}

/// A single edit coming from an input widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerEdit {
    Choose(bool),
    Select(String),
    Blank { index: usize, value: String },
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IncompleteAnswer {
    #[error("Select an answer before submitting")]
    NothingSelected,
    #[error("Complete all blanks before submitting")]
    BlanksRemaining { missing: Vec<usize> },
    #[error("Write an answer before submitting")]
    EmptyText,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("this edit does not apply to a {0} answer")]
    WrongShape(&'static str),
    #[error("blank {index} does not exist (exercise has {count})")]
    BlankOutOfRange { index: usize, count: usize },
}

impl UserAnswer {
    /// Fresh, unanswered state for the given content. Matching and unsupported content
    /// have no answer widget and therefore no answer.
    pub fn initial_for(content: &ExerciseContent) -> Option<Self> {
        match content {
            ExerciseContent::TrueFalse(_) => Some(UserAnswer::TrueFalse(None)),
            ExerciseContent::MultipleChoice(_) => Some(UserAnswer::MultipleChoice(None)),
            ExerciseContent::FillBlank(_) => Some(UserAnswer::FillBlank(BTreeMap::new())),
            ExerciseContent::CodeCompletion(_) | ExerciseContent::OpenEnded(_) => {
                Some(UserAnswer::Text(String::new()))
            }
            ExerciseContent::Matching(_) | ExerciseContent::Unsupported { .. } => None,
        }
    }

    pub fn shape(&self) -> &'static str {
        match self {
            UserAnswer::TrueFalse(_) => "true/false",
            UserAnswer::MultipleChoice(_) => "multiple-choice",
            UserAnswer::FillBlank(_) => "fill-blank",
            UserAnswer::Text(_) => "free-text",
        }
    }

    /// `blank_count` only matters for fill-blank answers.
    pub fn apply(&mut self, edit: AnswerEdit, blank_count: usize) -> Result<(), EditError> {
        match (self, edit) {
            (UserAnswer::TrueFalse(current), AnswerEdit::Choose(value)) => {
                *current = Some(value);
            }
            (UserAnswer::MultipleChoice(current), AnswerEdit::Select(option_id)) => {
                *current = Some(option_id);
            }
            (UserAnswer::FillBlank(values), AnswerEdit::Blank { index, value }) => {
                if index >= blank_count {
                    return Err(EditError::BlankOutOfRange { index, count: blank_count });
                }
                values.insert(index, value);
            }
            (UserAnswer::Text(current), AnswerEdit::Text(value)) => {
                *current = value;
            }
            (answer, _) => return Err(EditError::WrongShape(answer.shape())),
        }

        Ok(())
    }

    /// Local precondition for any submission: nothing may be left unanswered.
    pub fn check_complete(&self, blank_count: usize) -> Result<(), IncompleteAnswer> {
        match self {
            UserAnswer::TrueFalse(None) | UserAnswer::MultipleChoice(None) => {
                Err(IncompleteAnswer::NothingSelected)
            }
            UserAnswer::TrueFalse(Some(_)) => Ok(()),
            UserAnswer::MultipleChoice(Some(option_id)) if option_id.trim().is_empty() => {
                Err(IncompleteAnswer::NothingSelected)
            }
            UserAnswer::MultipleChoice(Some(_)) => Ok(()),
            UserAnswer::FillBlank(values) => {
                let missing: Vec<usize> = (0..blank_count)
                    .filter(|index| values.get(index).map_or(true, String::is_empty))
                    .collect();
                if missing.is_empty() && blank_count > 0 {
                    Ok(())
                } else {
                    Err(IncompleteAnswer::BlanksRemaining { missing })
                }
            }
            UserAnswer::Text(value) if value.trim().is_empty() => Err(IncompleteAnswer::EmptyText),
            UserAnswer::Text(_) => Ok(()),
        }
    }

    /// JSON form sent to the exercise service.
    pub fn to_wire(&self) -> Value {
        match self {
            UserAnswer::TrueFalse(value) => value.map(Value::Bool).unwrap_or(Value::Null),
            UserAnswer::MultipleChoice(value) => {
                value.clone().map(Value::String).unwrap_or(Value::Null)
            }
            UserAnswer::FillBlank(values) => Value::Object(
                values
                    .iter()
                    .map(|(index, value)| (index.to_string(), Value::String(value.clone())))
                    .collect::<Map<String, Value>>(),
            ),
            UserAnswer::Text(value) => Value::String(value.clone()),
        }
    }
}

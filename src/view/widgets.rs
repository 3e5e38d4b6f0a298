use std::fmt::Write as _;

use thiserror::Error;

use crate::schemas::exercise::{
    CodeCompletionContent, FillBlankContent, MultipleChoiceContent, OpenEndedContent,
    TrueFalseContent,
};
use crate::schemas::{AnswerEdit, Attempt, ExerciseContent, UserAnswer, ValidationResult};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("type an answer first")]
    Empty,
    #[error("expected {expected}, got \"{input}\"")]
    Unrecognised { expected: &'static str, input: String },
    #[error("no option \"{0}\"")]
    UnknownOption(String),
    #[error("blank {0} does not exist")]
    UnknownBlank(usize),
    #[error("this exercise cannot be answered here")]
    Unsupported,
}

/// Input widget chosen from the exercise content. Selection follows `content.type` only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Widget<'a> {
    TrueFalse(&'a TrueFalseContent),
    MultipleChoice(&'a MultipleChoiceContent),
    FillBlank(&'a FillBlankContent),
    CodeCompletion(&'a CodeCompletionContent),
    OpenEnded(&'a OpenEndedContent),
    Unsupported { content_type: &'a str },
}

impl<'a> Widget<'a> {
    pub fn for_content(content: &'a ExerciseContent) -> Self {
        match content {
            ExerciseContent::TrueFalse(content) => Widget::TrueFalse(content),
            ExerciseContent::MultipleChoice(content) => Widget::MultipleChoice(content),
            ExerciseContent::FillBlank(content) => Widget::FillBlank(content),
            ExerciseContent::CodeCompletion(content) => Widget::CodeCompletion(content),
            ExerciseContent::OpenEnded(content) => Widget::OpenEnded(content),
            // Pairs are stored but there is no answer widget for them.
            ExerciseContent::Matching(_) => Widget::Unsupported { content_type: "matching" },
            ExerciseContent::Unsupported { content_type } => Widget::Unsupported { content_type },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Widget::TrueFalse(_) => "true_false",
            Widget::MultipleChoice(_) => "multiple_choice",
            Widget::FillBlank(_) => "fill_blank",
            Widget::CodeCompletion(_) => "code_completion",
            Widget::OpenEnded(_) => "open_ended",
            Widget::Unsupported { .. } => "unsupported",
        }
    }

    /// Free-text widgets read several lines before producing one edit.
    pub fn is_multiline(&self) -> bool {
        matches!(self, Widget::CodeCompletion(_) | Widget::OpenEnded(_))
    }

    pub fn prompt(&self) -> &'static str {
        match self {
            Widget::TrueFalse(_) => "Answer true or false",
            Widget::MultipleChoice(_) => "Pick an option by letter",
            Widget::FillBlank(_) => "Fill a blank as <number>=<value>",
            Widget::CodeCompletion(_) => "Write your code, finish with a line containing only \".\"",
            Widget::OpenEnded(_) => "Write your answer, finish with a line containing only \".\"",
            Widget::Unsupported { .. } => "This exercise cannot be answered here",
        }
    }

    pub fn render(&self, answer: Option<&UserAnswer>) -> String {
        let mut out = String::new();
        match self {
            Widget::TrueFalse(content) => {
                let chosen = match answer {
                    Some(UserAnswer::TrueFalse(value)) => *value,
                    _ => None,
                };
                let _ = writeln!(out, "{}", content.statement);
                let _ = writeln!(out, "  {} True", marker(chosen == Some(true)));
                let _ = writeln!(out, "  {} False", marker(chosen == Some(false)));
            }
            Widget::MultipleChoice(content) => {
                let chosen = match answer {
                    Some(UserAnswer::MultipleChoice(value)) => value.as_deref(),
                    _ => None,
                };
                let _ = writeln!(out, "{}", content.question);
                for (index, option) in content.options.iter().enumerate() {
                    let _ = writeln!(
                        out,
                        "  {} {}. {}",
                        marker(chosen == Some(option.id.as_str())),
                        option_letter(index),
                        option.text
                    );
                }
            }
            Widget::FillBlank(content) => {
                let values = match answer {
                    Some(UserAnswer::FillBlank(values)) => Some(values),
                    _ => None,
                };
                let segments = content.segments();
                let last = segments.len().saturating_sub(1);
                for (index, segment) in segments.iter().enumerate() {
                    out.push_str(segment);
                    if index < last {
                        match values.and_then(|values| values.get(&index)) {
                            Some(value) if !value.is_empty() => {
                                let _ = write!(out, "[{}: {value}]", index + 1);
                            }
                            _ => {
                                let _ = write!(out, "[{}: ____]", index + 1);
                            }
                        }
                    }
                }
                out.push('\n');
            }
            Widget::CodeCompletion(content) => {
                let _ = writeln!(out, "{}", content.instruction);
                if !content.starter_code.is_empty() {
                    let _ = writeln!(out, "Starter code:\n{}", indent(&content.starter_code));
                }
                if let Some(expected) = &content.expected_output {
                    let _ = writeln!(out, "Expected output: {expected}");
                }
                for (index, case) in content.test_cases.iter().enumerate() {
                    let _ = writeln!(
                        out,
                        "Test {}: input {} -> {}",
                        index + 1,
                        case.input,
                        case.expected_output
                    );
                }
                push_text_answer(&mut out, answer);
            }
            Widget::OpenEnded(content) => {
                let _ = writeln!(out, "{}", content.question);
                if !content.evaluation_criteria.is_empty() {
                    let _ = writeln!(out, "You will be evaluated on:");
                    for criterion in &content.evaluation_criteria {
                        let _ = writeln!(out, "  - {criterion}");
                    }
                }
                push_text_answer(&mut out, answer);
            }
            Widget::Unsupported { content_type } => {
                let _ = writeln!(out, "Exercise type not supported: {content_type}");
            }
        }
        out
    }

    /// Turns one line (or, for free-text widgets, the collected text) into an answer edit.
    pub fn parse_input(&self, input: &str) -> Result<AnswerEdit, InputError> {
        let trimmed = input.trim();
        if trimmed.is_empty() && !self.is_multiline() {
            return Err(InputError::Empty);
        }

        match self {
            Widget::TrueFalse(_) => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "t" | "yes" | "y" => Ok(AnswerEdit::Choose(true)),
                "false" | "f" | "no" | "n" => Ok(AnswerEdit::Choose(false)),
                _ => Err(InputError::Unrecognised { expected: "true or false", input: trimmed.to_string() }),
            },
            Widget::MultipleChoice(content) => {
                if let Some(option) = content.option(trimmed) {
                    return Ok(AnswerEdit::Select(option.id.clone()));
                }
                letter_index(trimmed)
                    .and_then(|index| content.options.get(index))
                    .map(|option| AnswerEdit::Select(option.id.clone()))
                    .ok_or_else(|| InputError::UnknownOption(trimmed.to_string()))
            }
            Widget::FillBlank(content) => {
                let Some((number, value)) = trimmed.split_once('=') else {
                    return Err(InputError::Unrecognised {
                        expected: "<number>=<value>",
                        input: trimmed.to_string(),
                    });
                };
                let number: usize = number.trim().parse().map_err(|_| InputError::Unrecognised {
                    expected: "a blank number",
                    input: number.trim().to_string(),
                })?;
                if number == 0 || number > content.blank_count() {
                    return Err(InputError::UnknownBlank(number));
                }
                Ok(AnswerEdit::Blank { index: number - 1, value: value.trim().to_string() })
            }
            Widget::CodeCompletion(_) | Widget::OpenEnded(_) => {
                Ok(AnswerEdit::Text(input.trim_end_matches(['\n', '\r']).to_string()))
            }
            Widget::Unsupported { .. } => Err(InputError::Unsupported),
        }
    }
}

fn marker(selected: bool) -> &'static str {
    if selected {
        "(x)"
    } else {
        "( )"
    }
}

fn option_letter(index: usize) -> char {
    u8::try_from(index).ok().filter(|index| *index < 26).map_or('?', |index| char::from(b'A' + index))
}

fn letter_index(input: &str) -> Option<usize> {
    let mut chars = input.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    if chars.next().is_some() || !letter.is_ascii_uppercase() {
        return None;
    }
    Some(usize::from(letter as u8 - b'A'))
}

fn indent(text: &str) -> String {
    text.lines().map(|line| format!("    {line}")).collect::<Vec<_>>().join("\n")
}

fn push_text_answer(out: &mut String, answer: Option<&UserAnswer>) {
    if let Some(UserAnswer::Text(text)) = answer {
        if !text.trim().is_empty() {
            let _ = writeln!(out, "Your answer:\n{}", indent(text));
        }
    }
}

pub fn render_result(result: &ValidationResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({} / 100)", result.status.headline(), result.score);
    if !result.feedback.is_empty() {
        let _ = writeln!(out, "{}", result.feedback);
    }
    if let Some(suggestions) = &result.suggestions {
        let _ = writeln!(out, "Suggestions: {suggestions}");
    }
    if !result.is_correct() {
        let _ = writeln!(out, "Type \"retry\" to try again.");
    }
    out
}

pub fn render_attempt(attempt: &Attempt) -> String {
    let mut out = format!("[{}]", attempt.status.badge());
    if let Some(score) = attempt.score {
        let _ = write!(out, " score {score}");
    }
    if let Some(evaluated_at) = attempt.evaluated_at {
        let _ = write!(out, " at {}", crate::core::time::format_short_utc(evaluated_at));
    }
    if let Some(feedback) = attempt.feedback.as_deref().filter(|feedback| !feedback.is_empty()) {
        let _ = write!(out, "\n{feedback}");
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;
    use crate::schemas::{AttemptStatus, ValidationStatus};
    use crate::test_support::{attempt, fill_blank_exercise, multiple_choice_exercise, sample_exercise};

    #[test]
    fn widget_follows_content_type_not_declared_type() {
        let mut exercise = multiple_choice_exercise();
        exercise.declared_type = "true_false".to_string();

        assert!(matches!(Widget::for_content(&exercise.content), Widget::MultipleChoice(_)));
    }

    #[test]
    fn matching_and_unknown_types_are_unsupported() {
        let matching = sample_exercise(json!({"type": "matching", "data": {"pairs": [{"left": "a", "right": "b"}]}}));
        let unknown = sample_exercise(json!({"type": "diagram", "data": {}}));

        assert_eq!(Widget::for_content(&matching.content), Widget::Unsupported { content_type: "matching" });
        let widget = Widget::for_content(&unknown.content);
        assert_eq!(widget, Widget::Unsupported { content_type: "diagram" });
        assert!(widget.render(None).contains("not supported: diagram"));
        assert_eq!(widget.parse_input("a"), Err(InputError::Unsupported));
    }

    #[test]
    fn multiple_choice_accepts_letters_and_ids() {
        let exercise = multiple_choice_exercise();
        let widget = Widget::for_content(&exercise.content);

        assert_eq!(widget.parse_input("b"), Ok(AnswerEdit::Select("opt-b".to_string())));
        assert_eq!(widget.parse_input("opt-c"), Ok(AnswerEdit::Select("opt-c".to_string())));
        assert_eq!(widget.parse_input("z"), Err(InputError::UnknownOption("z".to_string())));

        let rendered = widget.render(Some(&UserAnswer::MultipleChoice(Some("opt-a".to_string()))));
        assert!(rendered.contains("(x) A. let"));
        assert!(rendered.contains("( ) B. mut"));
    }

    #[test]
    fn true_false_parsing() {
        let exercise = crate::test_support::true_false_exercise();
        let widget = Widget::for_content(&exercise.content);

        assert_eq!(widget.parse_input("Yes"), Ok(AnswerEdit::Choose(true)));
        assert_eq!(widget.parse_input(" f "), Ok(AnswerEdit::Choose(false)));
        assert!(matches!(widget.parse_input("maybe"), Err(InputError::Unrecognised { .. })));
        assert_eq!(widget.parse_input("  "), Err(InputError::Empty));
    }

    #[test]
    fn fill_blank_numbers_slots_from_one() {
        let exercise = fill_blank_exercise();
        let widget = Widget::for_content(&exercise.content);

        assert_eq!(
            widget.parse_input("2 = i32"),
            Ok(AnswerEdit::Blank { index: 1, value: "i32".to_string() })
        );
        assert_eq!(widget.parse_input("3=x"), Err(InputError::UnknownBlank(3)));
        assert_eq!(widget.parse_input("0=x"), Err(InputError::UnknownBlank(0)));

        let mut values = BTreeMap::new();
        values.insert(0, "main".to_string());
        let rendered = widget.render(Some(&UserAnswer::FillBlank(values)));
        assert_eq!(rendered, "fn [1: main]() -> [2: ____] {}\n");
    }

    #[test]
    fn free_text_keeps_inner_lines() {
        let exercise = sample_exercise(json!({
            "type": "code_completion",
            "data": {"instruction": "Return the sum", "starterCode": "fn add() {\n}", "testCases": [{"input": "1 2", "expectedOutput": "3"}]}
        }));
        let widget = Widget::for_content(&exercise.content);
        assert!(widget.is_multiline());

        let rendered = widget.render(None);
        assert!(rendered.contains("    fn add() {"));
        assert!(rendered.contains("Test 1: input 1 2 -> 3"));
        assert_eq!(
            widget.parse_input("a + b\n  .sum()\n"),
            Ok(AnswerEdit::Text("a + b\n  .sum()".to_string()))
        );
    }

    #[test]
    fn result_and_attempt_rendering() {
        let rejected = ValidationResult {
            score: 20,
            feedback: "Missing the borrow".to_string(),
            suggestions: Some("Read chapter 4".to_string()),
            status: ValidationStatus::Rejected,
        };
        let rendered = render_result(&rejected);
        assert!(rendered.starts_with("Incorrect (20 / 100)"));
        assert!(rendered.contains("retry"));

        let excellent = ValidationResult { status: ValidationStatus::ApprovedExcellent, ..rejected };
        assert!(!render_result(&excellent).contains("retry"));

        let graded = attempt("att-1", AttemptStatus::Correct, Some(8));
        assert_eq!(render_attempt(&graded), "[Correct] score 8\nGraded");
    }
}

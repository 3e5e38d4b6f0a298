use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use time::OffsetDateTime;
use validator::Validate;

/// Placeholder that marks one blank inside fill-blank text.
pub const BLANK_MARKER: &str = "___";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseType {
    TrueFalse,
    MultipleChoice,
    FillBlank,
    CodeCompletion,
    OpenEnded,
    Matching,
}

impl ExerciseType {
    pub fn as_str(self) -> &'static str {
        match self {
            ExerciseType::TrueFalse => "true_false",
            ExerciseType::MultipleChoice => "multiple_choice",
            ExerciseType::FillBlank => "fill_blank",
            ExerciseType::CodeCompletion => "code_completion",
            ExerciseType::OpenEnded => "open_ended",
            ExerciseType::Matching => "matching",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "true_false" => Some(ExerciseType::TrueFalse),
            "multiple_choice" => Some(ExerciseType::MultipleChoice),
            "fill_blank" => Some(ExerciseType::FillBlank),
            "code_completion" => Some(ExerciseType::CodeCompletion),
            "open_ended" => Some(ExerciseType::OpenEnded),
            "matching" => Some(ExerciseType::Matching),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrueFalseContent {
    pub statement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipleChoiceContent {
    pub question: String,
    pub options: Vec<ChoiceOption>,
}

impl MultipleChoiceContent {
    pub fn option(&self, id: &str) -> Option<&ChoiceOption> {
        self.options.iter().find(|option| option.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlankSlot {
    pub id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillBlankContent {
    pub text: String,
    pub blanks: Vec<BlankSlot>,
}

impl FillBlankContent {
    /// Text pieces around the blanks; blank `i` sits between piece `i` and `i + 1`.
    pub fn segments(&self) -> Vec<&str> {
        self.text.split(BLANK_MARKER).collect()
    }

    pub fn marker_count(&self) -> usize {
        self.text.matches(BLANK_MARKER).count()
    }

    pub fn blank_count(&self) -> usize {
        self.marker_count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeCompletionContent {
    pub instruction: String,
    #[serde(default)]
    pub starter_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test_cases: Vec<TestCase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenEndedContent {
    pub question: String,
    #[serde(default)]
    pub evaluation_criteria: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingPair {
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingContent {
    #[serde(default)]
    pub pairs: Vec<MatchingPair>,
}

/// Exercise body, tagged on the wire as `{"type": "...", "data": {...}}`.
///
/// Unknown type strings decode into [`ExerciseContent::Unsupported`] instead of failing,
/// so the caller can show a labelled "not supported" state.
#[derive(Debug, Clone, PartialEq)]
pub enum ExerciseContent {
    TrueFalse(TrueFalseContent),
    MultipleChoice(MultipleChoiceContent),
    FillBlank(FillBlankContent),
    CodeCompletion(CodeCompletionContent),
    OpenEnded(OpenEndedContent),
    Matching(MatchingContent),
    Unsupported { content_type: String },
}

impl ExerciseContent {
    pub fn kind(&self) -> Option<ExerciseType> {
        match self {
            ExerciseContent::TrueFalse(_) => Some(ExerciseType::TrueFalse),
            ExerciseContent::MultipleChoice(_) => Some(ExerciseType::MultipleChoice),
            ExerciseContent::FillBlank(_) => Some(ExerciseType::FillBlank),
            ExerciseContent::CodeCompletion(_) => Some(ExerciseType::CodeCompletion),
            ExerciseContent::OpenEnded(_) => Some(ExerciseType::OpenEnded),
            ExerciseContent::Matching(_) => Some(ExerciseType::Matching),
            ExerciseContent::Unsupported { .. } => None,
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            ExerciseContent::Unsupported { content_type } => content_type,
            other => other.kind().map(ExerciseType::as_str).unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct TaggedContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    data: Value,
}

#[derive(Serialize)]
struct TaggedContentRef<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    data: Value,
}

impl<'de> Deserialize<'de> for ExerciseContent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tagged = TaggedContent::deserialize(deserializer)?;
        let Some(kind) = ExerciseType::parse(&tagged.content_type) else {
            return Ok(ExerciseContent::Unsupported { content_type: tagged.content_type });
        };

        let data = tagged.data;
        let decoded = match kind {
            ExerciseType::TrueFalse => serde_json::from_value(data).map(ExerciseContent::TrueFalse),
            ExerciseType::MultipleChoice => {
                serde_json::from_value(data).map(ExerciseContent::MultipleChoice)
            }
            ExerciseType::FillBlank => serde_json::from_value(data).map(ExerciseContent::FillBlank),
            ExerciseType::CodeCompletion => {
                serde_json::from_value(data).map(ExerciseContent::CodeCompletion)
            }
            ExerciseType::OpenEnded => serde_json::from_value(data).map(ExerciseContent::OpenEnded),
            ExerciseType::Matching => serde_json::from_value(data).map(ExerciseContent::Matching),
        };

        decoded.map_err(|err| {
            D::Error::custom(format!("invalid {} content: {err}", kind.as_str()))
        })
    }
}

impl Serialize for ExerciseContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let data = match self {
            ExerciseContent::TrueFalse(content) => serde_json::to_value(content),
            ExerciseContent::MultipleChoice(content) => serde_json::to_value(content),
            ExerciseContent::FillBlank(content) => serde_json::to_value(content),
            ExerciseContent::CodeCompletion(content) => serde_json::to_value(content),
            ExerciseContent::OpenEnded(content) => serde_json::to_value(content),
            ExerciseContent::Matching(content) => serde_json::to_value(content),
            ExerciseContent::Unsupported { .. } => Ok(Value::Null),
        }
        .map_err(S::Error::custom)?;

        TaggedContentRef { content_type: self.type_name(), data }.serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub lesson_id: String,
    /// Type the server declared; rendering always follows `content` instead.
    #[serde(rename = "type")]
    pub declared_type: String,
    #[validate(length(min = 1, message = "instructions must not be empty"))]
    pub instructions: String,
    pub content: ExerciseContent,
    #[validate(range(min = 1, max = 100, message = "maxPoints must be between 1 and 100"))]
    pub max_points: u32,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub generated_at: Option<OffsetDateTime>,
}

impl Exercise {
    pub fn declared_kind(&self) -> Option<ExerciseType> {
        ExerciseType::parse(&self.declared_type)
    }

    pub fn type_mismatch(&self) -> bool {
        self.declared_kind() != self.content.kind()
    }

    /// Structural checks the server is trusted to get right but does not always.
    pub fn check_integrity(&self) -> Result<(), String> {
        self.validate().map_err(|err| err.to_string())?;

        match &self.content {
            ExerciseContent::FillBlank(content) => {
                let markers = content.marker_count();
                if markers == 0 {
                    return Err("fill-blank text contains no blanks".to_string());
                }
                if markers != content.blanks.len() {
                    return Err(format!(
                        "fill-blank text has {markers} blank markers but {} blanks were declared",
                        content.blanks.len()
                    ));
                }
            }
            ExerciseContent::MultipleChoice(content) => {
                if content.options.is_empty() {
                    return Err("multiple-choice exercise has no options".to_string());
                }
                for (index, option) in content.options.iter().enumerate() {
                    if content.options[..index].iter().any(|other| other.id == option.id) {
                        return Err(format!("duplicate option id {}", option.id));
                    }
                }
            }
            ExerciseContent::TrueFalse(_)
            | ExerciseContent::CodeCompletion(_)
            | ExerciseContent::OpenEnded(_)
            | ExerciseContent::Matching(_)
            | ExerciseContent::Unsupported { .. } => {}
        }

        Ok(())
    }
}

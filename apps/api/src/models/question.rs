//! Canonical clarifying-question type returned by the AI collaborator.
//!
//! The LLM returns slightly different shapes across prompts (`question` vs
//! `text` for the prompt text, occasional unknown `input_type` values).
//! Everything is normalized into `Question` at this boundary so the rest of
//! the codebase sees exactly one schema.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// Input widget the frontend should render for a question.
/// Unknown values coerce to `Text` rather than failing the whole response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    #[default]
    Text,
    Textarea,
    Multiselect,
    Checkbox,
}

impl<'de> Deserialize<'de> for InputType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "text" => InputType::Text,
            "textarea" => InputType::Textarea,
            "multiselect" => InputType::Multiselect,
            "checkbox" => InputType::Checkbox,
            other => {
                warn!("Unknown question input_type '{other}', coercing to text");
                InputType::Text
            }
        })
    }
}

/// A clarifying question the user answers before generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub input_type: InputType,
    pub required: bool,
    pub category: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub can_add_more: bool,
}

/// Raw question shape as emitted by the LLM. Field names vary per call site.
#[derive(Debug, Deserialize)]
pub struct RawQuestion {
    question: Option<String>,
    text: Option<String>,
    #[serde(default)]
    input_type: InputType,
    #[serde(default = "default_required")]
    required: bool,
    #[serde(default = "default_category")]
    category: String,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    can_add_more: bool,
}

fn default_required() -> bool {
    true
}

fn default_category() -> String {
    "general".to_string()
}

impl RawQuestion {
    /// Converts the raw LLM shape into the canonical `Question`.
    /// Returns `None` when the entry carries no prompt text at all.
    pub fn normalize(self) -> Option<Question> {
        let text = self.question.or(self.text)?.trim().to_string();
        if text.is_empty() {
            return None;
        }
        Some(Question {
            text,
            input_type: self.input_type,
            required: self.required,
            category: self.category,
            options: self.options,
            can_add_more: self.can_add_more,
        })
    }
}

/// Normalizes a full LLM response, dropping entries without prompt text.
pub fn normalize_questions(raw: Vec<RawQuestion>) -> Vec<Question> {
    raw.into_iter().filter_map(RawQuestion::normalize).collect()
}

use serde::{Deserialize, Serialize};
use std::fmt;

// ===== Task Type =====

/// How the human side answers a task.
///
/// Unrecognised values coming from the server are kept verbatim in
/// [`TaskType::Other`] so a newer backend never breaks deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskType {
    /// The human types a free-text answer.
    TextEntry,
    /// The human only confirms completion; no text is submitted.
    Confirmation,
    Other(String),
}

impl TaskType {
    pub fn as_str(&self) -> &str {
        match self {
            TaskType::TextEntry => "text_entry",
            TaskType::Confirmation => "confirmation",
            TaskType::Other(value) => value,
        }
    }

    /// Whether a submission needs free text from the human.
    pub fn requires_text(&self) -> bool {
        matches!(self, TaskType::TextEntry)
    }
}

impl From<String> for TaskType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "text_entry" => TaskType::TextEntry,
            "confirmation" => TaskType::Confirmation,
            _ => TaskType::Other(value),
        }
    }
}

impl From<TaskType> for String {
    fn from(value: TaskType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ===== Task =====

/// The challenge both participants race on. Set once when the race is
/// created and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub human_instructions: String,
    #[serde(default)]
    pub agent_instructions: String,
    pub task_type: TaskType,
    #[serde(default)]
    pub success_criteria: String,
    #[serde(default)]
    pub expected_output_description: String,
    #[serde(default)]
    pub evaluation_guidelines: Vec<String>,
}

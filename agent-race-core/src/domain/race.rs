use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::RaceId;
use super::participant::ParticipantState;
use super::task::Task;

// ===== Race Status =====

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum RaceStatus {
    AwaitingTask,
    #[default]
    Ready,
    Running,
    AwaitingHuman,
    Judging,
    Completed,
    Other(String),
}

impl RaceStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RaceStatus::AwaitingTask => "awaiting_task",
            RaceStatus::Ready => "ready",
            RaceStatus::Running => "running",
            RaceStatus::AwaitingHuman => "awaiting_human",
            RaceStatus::Judging => "judging",
            RaceStatus::Completed => "completed",
            RaceStatus::Other(value) => value,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RaceStatus::Completed)
    }
}

impl From<String> for RaceStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "awaiting_task" => RaceStatus::AwaitingTask,
            "ready" => RaceStatus::Ready,
            "running" => RaceStatus::Running,
            "awaiting_human" => RaceStatus::AwaitingHuman,
            "judging" => RaceStatus::Judging,
            "completed" => RaceStatus::Completed,
            _ => RaceStatus::Other(value),
        }
    }
}

impl From<RaceStatus> for String {
    fn from(value: RaceStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for RaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ===== Verdict =====

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Winner {
    Agent,
    Human,
    Tie,
    Other(String),
}

impl Winner {
    pub fn as_str(&self) -> &str {
        match self {
            Winner::Agent => "agent",
            Winner::Human => "human",
            Winner::Tie => "tie",
            Winner::Other(value) => value,
        }
    }
}

impl From<String> for Winner {
    fn from(value: String) -> Self {
        match value.to_lowercase().as_str() {
            "agent" => Winner::Agent,
            "human" => Winner::Human,
            "tie" => Winner::Tie,
            _ => Winner::Other(value),
        }
    }
}

impl From<Winner> for String {
    fn from(value: Winner) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Judged outcome. Absent until judging has resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub winner: Winner,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub agent_score: f64,
    #[serde(default)]
    pub human_score: f64,
}

// ===== Race =====

/// Full race snapshot as returned by every race endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Race {
    #[serde(rename = "race_id", alias = "id")]
    pub id: RaceId,
    #[serde(default)]
    pub status: RaceStatus,
    #[serde(default)]
    pub task: Option<Task>,
    #[serde(default)]
    pub agent: ParticipantState,
    #[serde(default)]
    pub human: ParticipantState,
    #[serde(default)]
    pub verdict: Option<Verdict>,
}

impl Race {
    /// Whether the race is waiting on the asynchronous judge.
    pub fn is_judging(&self) -> bool {
        self.status == RaceStatus::Judging && self.verdict.is_none()
    }

    /// Whether a human submission needs free text.
    pub fn requires_text_submission(&self) -> bool {
        self.task
            .as_ref()
            .map(|t| t.task_type.requires_text())
            .unwrap_or(false)
    }
}

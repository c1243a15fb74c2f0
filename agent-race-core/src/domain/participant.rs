use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ===== Participant Status =====

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum ParticipantStatus {
    #[default]
    Pending,
    Starting,
    Running,
    Completed,
    Error,
    Other(String),
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ParticipantStatus::Pending => "pending",
            ParticipantStatus::Starting => "starting",
            ParticipantStatus::Running => "running",
            ParticipantStatus::Completed => "completed",
            ParticipantStatus::Error => "error",
            ParticipantStatus::Other(value) => value,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ParticipantStatus::Completed | ParticipantStatus::Error)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ParticipantStatus::Running)
    }
}

impl From<String> for ParticipantStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pending" => ParticipantStatus::Pending,
            "starting" => ParticipantStatus::Starting,
            "running" => ParticipantStatus::Running,
            "completed" => ParticipantStatus::Completed,
            "error" => ParticipantStatus::Error,
            _ => ParticipantStatus::Other(value),
        }
    }
}

impl From<&str> for ParticipantStatus {
    fn from(value: &str) -> Self {
        ParticipantStatus::from(value.to_string())
    }
}

impl From<ParticipantStatus> for String {
    fn from(value: ParticipantStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ===== Participant State =====

/// Progress of one side of a race.
///
/// The agent side is patched incrementally by stream events; the human side
/// only changes through explicit start/submit calls. `live_url` is only ever
/// populated for the agent, and the server omits `result` for the human on
/// confirmation tasks, so every field tolerates being absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ParticipantState {
    #[serde(default)]
    pub status: ParticipantStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_url: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
}

impl ParticipantState {
    /// Duration reported by the server, or one derived from the local
    /// timestamps when the server has not computed it yet.
    pub fn effective_duration(&self) -> Option<f64> {
        if self.duration_seconds.is_some() {
            return self.duration_seconds;
        }
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) if end >= start => {
                Some((end - start).num_milliseconds() as f64 / 1000.0)
            }
            _ => None,
        }
    }

    pub fn has_result(&self) -> bool {
        self.result.as_deref().is_some_and(|r| !r.is_empty())
    }
}

//! Runs resource client
//!
//! Standalone agent runs that are not attached to a race.

use crate::client::HttpClient;
use crate::error::SdkResult;
use crate::stream::EventStream;
use agent_race_core::{CoreError, RunId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Shortest task instruction the server accepts
pub const MIN_TASK_LENGTH: usize = 2;

/// Client for ad-hoc run operations
#[derive(Debug, Clone)]
pub struct RunsClient {
    client: Arc<HttpClient>,
}

impl RunsClient {
    /// Create a new runs client
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    /// Start an agent run for a free-form task
    pub async fn start(&self, task: impl Into<String>) -> SdkResult<RunHandle> {
        let request = StartRunRequest::new(task)?;
        self.client.post("/run", request).await
    }

    /// Get the coarse state of a run
    pub async fn status(&self, run_id: &RunId) -> SdkResult<RunStatusResponse> {
        self.client.get(&format!("/run/{}", run_id)).await
    }

    /// Open the event stream of a run
    pub async fn events(&self, run_id: &RunId) -> SdkResult<EventStream> {
        let response = self
            .client
            .open_stream(&format!("/run/{}/events", run_id))
            .await?;
        Ok(EventStream::from_response(response))
    }
}

/// Request to start a standalone run
#[derive(Debug, Clone, Serialize)]
pub struct StartRunRequest {
    pub task: String,
}

impl StartRunRequest {
    /// Create a request, rejecting instructions the server would refuse
    pub fn new(task: impl Into<String>) -> Result<Self, CoreError> {
        let task = task.into();
        if task.trim().chars().count() < MIN_TASK_LENGTH {
            return Err(CoreError::Validation(format!(
                "task must be at least {} characters",
                MIN_TASK_LENGTH
            )));
        }
        Ok(Self { task })
    }
}

/// Response of the run start endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunHandle {
    pub run_id: RunId,
}

/// Coarse run state reported by `GET /run/{id}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Completed,
    Error,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Running => write!(f, "running"),
            RunState::Completed => write!(f, "completed"),
            RunState::Error => write!(f, "error"),
        }
    }
}

/// Response of the run status endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatusResponse {
    pub run_id: RunId,
    pub task: String,
    pub state: RunState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_run_request_validation() {
        assert!(StartRunRequest::new("x").is_err());
        assert!(StartRunRequest::new("  y ").is_err());
        assert!(StartRunRequest::new("find the pricing page").is_ok());
    }

    #[test]
    fn test_run_status_deserialization() {
        let status: RunStatusResponse = serde_json::from_value(serde_json::json!({
            "run_id": "abc",
            "task": "find the pricing page",
            "state": "completed"
        }))
        .unwrap();
        assert_eq!(status.state, RunState::Completed);
    }
}

//! Races resource client
//!
//! This module provides methods for the race lifecycle endpoints.

use crate::client::HttpClient;
use crate::error::SdkResult;
use crate::stream::EventStream;
use agent_race_core::{Race, RaceId, RunId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Client for race operations
#[derive(Debug, Clone)]
pub struct RacesClient {
    client: Arc<HttpClient>,
}

impl RacesClient {
    /// Create a new races client
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    /// Create a new race; the server generates its task
    pub async fn create(&self) -> SdkResult<Race> {
        let envelope: RaceEnvelope = self.client.post_empty("/race").await?;
        Ok(envelope.race)
    }

    /// Get the current snapshot of a race
    pub async fn get(&self, race_id: &RaceId) -> SdkResult<Race> {
        let envelope: RaceEnvelope = self.client.get(&format!("/race/{}", race_id)).await?;
        Ok(envelope.race)
    }

    /// Mark the human side as started
    pub async fn start_human(&self, race_id: &RaceId) -> SdkResult<Race> {
        let envelope: RaceEnvelope = self
            .client
            .post_empty(&format!("/race/{}/human/start", race_id))
            .await?;
        Ok(envelope.race)
    }

    /// Submit the human's answer. `None` is sent as `null`, which is what
    /// confirmation tasks expect.
    pub async fn submit_human(
        &self,
        race_id: &RaceId,
        submission: Option<String>,
    ) -> SdkResult<Race> {
        let envelope: RaceEnvelope = self
            .client
            .post(
                &format!("/race/{}/human/submit", race_id),
                HumanSubmissionRequest { submission },
            )
            .await?;
        Ok(envelope.race)
    }

    /// Start the agent side; returns the snapshot and the run to stream
    pub async fn start_agent(&self, race_id: &RaceId) -> SdkResult<AgentStart> {
        self.client
            .post_empty(&format!("/race/{}/agent/start", race_id))
            .await
    }

    /// Open the event stream of an agent run
    pub async fn events(&self, run_id: &RunId) -> SdkResult<EventStream> {
        let response = self
            .client
            .open_stream(&format!("/run/{}/events", run_id))
            .await?;
        Ok(EventStream::from_response(response))
    }
}

/// `{ "race": ... }` wrapper used by every race endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceEnvelope {
    pub race: Race,
}

/// Request body of the human submission endpoint
#[derive(Debug, Clone, Serialize)]
pub struct HumanSubmissionRequest {
    pub submission: Option<String>,
}

/// Response of the agent start endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStart {
    pub race: Race,
    pub run_id: RunId,
}

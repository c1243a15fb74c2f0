//! Backend seam used by [`crate::controller::RaceController`].
//!
//! [`crate::AgentRaceClient`] implements it over HTTP; tests and embedders
//! can substitute their own backend.

use async_trait::async_trait;

use agent_race_core::{Race, RaceId, RunId};

use crate::error::SdkResult;
use crate::resources::races::AgentStart;
use crate::stream::EventStream;

/// The race endpoints the controller drives.
#[async_trait]
pub trait RaceApi: Send + Sync + 'static {
    /// Create a race with a freshly generated task.
    async fn create_race(&self) -> SdkResult<Race>;

    /// Fetch the current snapshot of a race.
    async fn get_race(&self, race_id: &RaceId) -> SdkResult<Race>;

    /// Mark the human as started.
    async fn start_human(&self, race_id: &RaceId) -> SdkResult<Race>;

    /// Submit the human's answer; `None` for confirmation tasks.
    async fn submit_human(&self, race_id: &RaceId, submission: Option<String>) -> SdkResult<Race>;

    /// Start the agent and return the run whose events to follow.
    async fn start_agent(&self, race_id: &RaceId) -> SdkResult<AgentStart>;

    /// Open the event stream of an agent run.
    async fn open_events(&self, run_id: &RunId) -> SdkResult<EventStream>;
}

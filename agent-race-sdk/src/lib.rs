//! Agent Race SDK
//!
//! This crate provides a Rust client for the human vs. agent race API. It
//! covers the race lifecycle endpoints, standalone agent runs, the agent's
//! Server-Sent Events stream and a [`RaceController`] that keeps a race
//! session in sync with the server.
//!
//! # Features
//!
//! - **Typed API clients**: races and runs with strongly-typed snapshots
//! - **Event streaming**: incremental SSE decoding into [`StreamEvent`]s
//! - **Session controller**: merge rules, reconciliation and judging poll
//! - **Automatic retries**: idempotent requests retried with backoff
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use agent_race_sdk::{AgentRaceClient, RaceController, SdkConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AgentRaceClient::new(SdkConfig::from_env())?;
//!     let controller = RaceController::new(client);
//!
//!     let race = controller.create_race().await?;
//!     println!("Race {} is {}", race.id, race.status);
//!
//!     controller.start_race().await?;
//!     let mut updates = controller.subscribe();
//!     while updates.changed().await.is_ok() {
//!         let session = updates.borrow().clone();
//!         if let Some(url) = session.race().and_then(|r| r.agent.live_url.as_deref()) {
//!             println!("Watch the agent at {}", url);
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! ```rust,no_run
//! use agent_race_sdk::{AgentRaceClient, RaceId, SdkError};
//!
//! async fn show(client: &AgentRaceClient, id: &RaceId) {
//!     match client.races().get(id).await {
//!         Ok(race) => println!("{}: {}", race.id, race.status),
//!         Err(SdkError::ApiError { status: 404, .. }) => eprintln!("No such race"),
//!         Err(e) => eprintln!("Other error: {}", e),
//!     }
//! }
//! ```

#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod api;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod resources;
pub mod stream;

// Re-export main types for convenience
pub use api::RaceApi;
pub use client::HttpClient;
pub use config::{
    normalize_origin, SdkConfig, SdkConfigBuilder, API_URL_ENV, DEFAULT_JUDGING_POLL_INTERVAL,
    DEFAULT_ORIGIN,
};
pub use controller::RaceController;
pub use error::{SdkError, SdkResult};
pub use stream::{EventStream, SseDecoder, SseFrame};

// Re-export resource clients
pub use resources::races::{AgentStart, HumanSubmissionRequest, RaceEnvelope, RacesClient};
pub use resources::runs::{RunHandle, RunState, RunStatusResponse, RunsClient, StartRunRequest};

// Re-export the domain so callers need a single dependency
pub use agent_race_core::{
    BusyFlags, ParticipantState, ParticipantStatus, Race, RaceId, RaceSession, RaceStatus, RunId,
    StreamEvent, StreamState, Task, TaskType, Verdict, Winner,
};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// The main client for the race API.
///
/// # Example
///
/// ```rust,no_run
/// use agent_race_sdk::AgentRaceClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = AgentRaceClient::builder("http://localhost:8000").build()?;
/// let race = client.races().create().await?;
/// let run = client.runs().start("Find the pricing page").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AgentRaceClient {
    http_client: Arc<HttpClient>,
    races: RacesClient,
    runs: RunsClient,
}

impl AgentRaceClient {
    /// Create a new client with the given configuration.
    ///
    /// Fails if the configuration does not validate.
    pub fn new(config: SdkConfig) -> SdkResult<Self> {
        let http_client = Arc::new(HttpClient::new(config)?);

        Ok(Self {
            races: RacesClient::new(Arc::clone(&http_client)),
            runs: RunsClient::new(Arc::clone(&http_client)),
            http_client,
        })
    }

    /// Create a new client using a builder pattern.
    pub fn builder(base_url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(base_url)
    }

    /// Client for the race lifecycle endpoints
    pub fn races(&self) -> &RacesClient {
        &self.races
    }

    /// Client for standalone agent runs
    pub fn runs(&self) -> &RunsClient {
        &self.runs
    }

    /// Get a reference to the underlying HTTP client.
    pub fn http_client(&self) -> &HttpClient {
        &self.http_client
    }

    /// Get the base URL of the API.
    pub fn base_url(&self) -> &str {
        &self.http_client.config().base_url
    }
}

#[async_trait]
impl RaceApi for AgentRaceClient {
    async fn create_race(&self) -> SdkResult<Race> {
        self.races.create().await
    }

    async fn get_race(&self, race_id: &RaceId) -> SdkResult<Race> {
        self.races.get(race_id).await
    }

    async fn start_human(&self, race_id: &RaceId) -> SdkResult<Race> {
        self.races.start_human(race_id).await
    }

    async fn submit_human(&self, race_id: &RaceId, submission: Option<String>) -> SdkResult<Race> {
        self.races.submit_human(race_id, submission).await
    }

    async fn start_agent(&self, race_id: &RaceId) -> SdkResult<AgentStart> {
        self.races.start_agent(race_id).await
    }

    async fn open_events(&self, run_id: &RunId) -> SdkResult<EventStream> {
        self.races.events(run_id).await
    }
}

/// Builder for creating an [`AgentRaceClient`] with fluent configuration.
#[derive(Debug)]
pub struct ClientBuilder {
    config_builder: SdkConfigBuilder,
}

impl ClientBuilder {
    /// Create a new client builder with the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            config_builder: SdkConfig::builder(base_url),
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config_builder = self.config_builder.timeout(timeout);
        self
    }

    /// Set the connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config_builder = self.config_builder.connect_timeout(timeout);
        self
    }

    /// Set the maximum number of retries for idempotent requests.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.config_builder = self.config_builder.max_retries(max_retries);
        self
    }

    /// Set the judging poll interval.
    pub fn with_judging_poll_interval(mut self, interval: Duration) -> Self {
        self.config_builder = self.config_builder.judging_poll_interval(interval);
        self
    }

    /// Enable or disable request/response logging.
    pub fn with_logging(mut self, enable: bool) -> Self {
        self.config_builder = self.config_builder.logging(enable);
        self
    }

    /// Add a custom header to all requests.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.header(name, value);
        self
    }

    /// Build the client.
    pub fn build(self) -> SdkResult<AgentRaceClient> {
        AgentRaceClient::new(self.config_builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builder() {
        let client = AgentRaceClient::builder("https://api.example.com")
            .with_timeout(Duration::from_secs(30))
            .with_max_retries(3)
            .with_logging(true)
            .build()
            .unwrap();

        assert_eq!(client.base_url(), "https://api.example.com");
    }

    #[test]
    fn test_client_rejects_invalid_url() {
        assert!(AgentRaceClient::builder("not a url").build().is_err());
    }

    #[test]
    fn test_client_from_origin() {
        let client = AgentRaceClient::new(SdkConfig::from_origin(Some(":9000"))).unwrap();
        assert_eq!(client.base_url(), "http://localhost:9000");
    }
}

//! CLI execution context

use anyhow::{Context as _, Result};
use agent_race_sdk::{normalize_origin, AgentRaceClient, RaceController, SdkConfig};
use clap::ValueEnum;
use std::time::Duration;
use tracing::warn;

use crate::cli::Cli;
use crate::config::{CliConfig, Profile};
use crate::output::{OutputFormat, OutputWriter};

/// Execution context for CLI commands
pub struct Context {
    /// CLI configuration
    pub config: CliConfig,

    /// Active profile name
    pub profile_name: Option<String>,

    /// Active profile
    pub profile: Profile,

    /// Output writer
    pub output: OutputWriter,

    /// Verbose mode
    pub verbose: bool,

    /// API URL override from the flag or environment
    pub api_url_override: Option<String>,
}

impl Context {
    /// Create a new context from CLI arguments
    pub fn new(cli: &Cli) -> Result<Self> {
        let config = CliConfig::load()?;

        let profile_name = cli.profile.clone().or_else(|| config.default_profile.clone());
        let profile = match config.get_profile(profile_name.as_deref()) {
            Some(profile) => profile.clone(),
            None => {
                if let Some(name) = &profile_name {
                    warn!(profile = %name, "Profile not found, using defaults");
                }
                Profile::default()
            }
        };

        let output_format = cli
            .output
            .or_else(|| parse_format(profile.output_format.as_deref()))
            .or_else(|| parse_format(Some(&config.settings.output_format)))
            .unwrap_or_default();
        let output = OutputWriter::new(output_format, cli.no_color || !config.settings.color);

        Ok(Self {
            verbose: cli.verbose || config.settings.verbose,
            config,
            profile_name,
            profile,
            output,
            api_url_override: cli.api_url.clone(),
        })
    }

    /// Get the effective API origin
    pub fn api_url(&self) -> String {
        normalize_origin(
            self.api_url_override
                .as_deref()
                .or(self.profile.api_url.as_deref()),
        )
    }

    /// Build the SDK configuration from settings and the active profile
    pub fn sdk_config(&self) -> SdkConfig {
        let settings = &self.config.settings;
        let mut config = SdkConfig::new(self.api_url())
            .with_timeout(Duration::from_secs(settings.timeout_secs))
            .with_max_retries(settings.max_retries)
            .with_judging_poll_interval(Duration::from_secs(settings.judging_poll_secs))
            .with_logging(self.verbose);

        for (name, value) in &self.profile.headers {
            config = config.with_header(name.clone(), value.clone());
        }

        config
    }

    /// Create an SDK client
    pub fn create_client(&self) -> Result<AgentRaceClient> {
        AgentRaceClient::new(self.sdk_config()).context("Failed to create API client")
    }

    /// Create a race controller on top of a fresh client
    pub fn create_controller(&self) -> Result<RaceController<AgentRaceClient>> {
        let config = self.sdk_config();
        let poll_interval = config.judging_poll_interval;
        let client = AgentRaceClient::new(config).context("Failed to create API client")?;
        Ok(RaceController::with_poll_interval(client, poll_interval))
    }
}

fn parse_format(value: Option<&str>) -> Option<OutputFormat> {
    let value = value?;
    match OutputFormat::from_str(value, true) {
        Ok(format) => Some(format),
        Err(_) => {
            warn!(format = value, "Ignoring unknown output format");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!(parse_format(Some("JSON")), Some(OutputFormat::Json));
        assert_eq!(parse_format(Some("compact")), Some(OutputFormat::Compact));
        assert_eq!(parse_format(Some("xml")), None);
        assert_eq!(parse_format(None), None);
    }
}

//! CLI configuration management

use anyhow::{Context as _, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "AGENT_RACE_CONFIG";

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CliConfig {
    /// Default profile to use
    #[serde(default)]
    pub default_profile: Option<String>,

    /// Named profiles
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,

    /// Global settings
    #[serde(default)]
    pub settings: Settings,
}

impl CliConfig {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a file, or defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {:?}", path))?;
            let config: CliConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config from {:?}", path))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config to {:?}", path))?;
        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }
        let dirs = ProjectDirs::from("com", "agent-race", "agent-race-cli")
            .context("Could not determine config directory")?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get a profile by name, falling back to the default profile
    pub fn get_profile(&self, name: Option<&str>) -> Option<&Profile> {
        let profile_name = name.or(self.default_profile.as_deref())?;
        self.profiles.get(profile_name)
    }

    /// Get or create a profile
    pub fn get_or_create_profile(&mut self, name: &str) -> &mut Profile {
        self.profiles.entry(name.to_string()).or_default()
    }

    /// Set the default profile
    pub fn set_default_profile(&mut self, name: &str) {
        self.default_profile = Some(name.to_string());
    }

    /// Remove a profile
    pub fn remove_profile(&mut self, name: &str) -> Option<Profile> {
        if self.default_profile.as_deref() == Some(name) {
            self.default_profile = None;
        }
        self.profiles.remove(name)
    }

    /// List all profile names
    pub fn list_profiles(&self) -> Vec<&str> {
        self.profiles.keys().map(|s| s.as_str()).collect()
    }
}

/// A configuration profile
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Profile {
    /// API origin, in any form the SDK accepts
    #[serde(default)]
    pub api_url: Option<String>,

    /// Default output format
    #[serde(default)]
    pub output_format: Option<String>,

    /// Additional headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Global settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Default output format
    #[serde(default = "default_output_format")]
    pub output_format: String,

    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Enable verbose output by default
    #[serde(default)]
    pub verbose: bool,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries for idempotent requests
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Seconds between refreshes while a race is judged
    #[serde(default = "default_judging_poll")]
    pub judging_poll_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_format: default_output_format(),
            color: true,
            verbose: false,
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            judging_poll_secs: default_judging_poll(),
        }
    }
}

fn default_output_format() -> String {
    "table".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_judging_poll() -> u64 {
    agent_race_sdk::DEFAULT_JUDGING_POLL_INTERVAL.as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = CliConfig::default();
        assert!(config.default_profile.is_none());
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.output_format, "table");
        assert!(settings.color);
        assert!(!settings.verbose);
        assert_eq!(settings.timeout_secs, 30);
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.judging_poll_secs, 3);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: CliConfig = toml::from_str(
            r#"
            default_profile = "staging"

            [profiles.staging]
            api_url = ":9000"

            [settings]
            timeout_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.get_profile(None).unwrap().api_url.as_deref(), Some(":9000"));
        assert_eq!(config.settings.timeout_secs, 5);
        assert_eq!(config.settings.max_retries, 3);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = CliConfig::default();
        config.get_or_create_profile("local").api_url = Some("localhost:8000".to_string());
        config.set_default_profile("local");
        config.save_to(&path).unwrap();

        assert_eq!(CliConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_remove_default_profile() {
        let mut config = CliConfig::default();
        config.get_or_create_profile("local");
        config.set_default_profile("local");

        assert!(config.remove_profile("local").is_some());
        assert!(config.default_profile.is_none());
    }
}

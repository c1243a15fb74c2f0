//! Configuration commands

use anyhow::{bail, Context as _, Result};
use clap::{Args, Subcommand};
use colored::Colorize;

use crate::config::{CliConfig, Profile, Settings};
use crate::context::Context;

/// Configuration management commands
#[derive(Debug, Args)]
pub struct ConfigCommands {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration
    Show {
        /// Show configuration for a specific profile
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., settings.timeout_secs, profile.local.api_url)
        key: String,

        /// Value to set
        value: String,

        /// Profile to configure
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,

        /// Profile to read from
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// List all profiles
    Profiles,

    /// Set the default profile
    UseProfile {
        /// Profile name to use as default
        name: String,
    },

    /// Create a new profile
    CreateProfile {
        /// Profile name
        name: String,

        /// API origin for this profile
        #[arg(long)]
        api_url: Option<String>,

        /// Copy settings from another profile
        #[arg(long)]
        from: Option<String>,
    },

    /// Delete a profile
    DeleteProfile {
        /// Profile name to delete
        name: String,

        /// Force deletion without confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Show the configuration file path
    Path,

    /// Reset configuration to defaults
    Reset {
        /// Force reset without confirmation
        #[arg(short, long)]
        force: bool,
    },
}

/// Execute configuration commands
pub async fn execute(ctx: &Context, cmd: ConfigCommands) -> Result<()> {
    match cmd.command {
        ConfigSubcommand::Show { profile } => show(ctx, profile.as_deref()),
        ConfigSubcommand::Set { key, value, profile } => set(ctx, &key, &value, profile.as_deref()),
        ConfigSubcommand::Get { key, profile } => get(ctx, &key, profile.as_deref()),
        ConfigSubcommand::Profiles => list_profiles(ctx),
        ConfigSubcommand::UseProfile { name } => use_profile(ctx, &name),
        ConfigSubcommand::CreateProfile { name, api_url, from } => {
            create_profile(ctx, &name, api_url.as_deref(), from.as_deref())
        }
        ConfigSubcommand::DeleteProfile { name, force } => delete_profile(ctx, &name, force),
        ConfigSubcommand::Path => show_path(),
        ConfigSubcommand::Reset { force } => reset(ctx, force),
    }
}

fn print_profile(name: &str, profile: &Profile, is_default: bool) {
    let default_marker = if is_default {
        " (default)".green().to_string()
    } else {
        String::new()
    };
    println!("  [{}]{}", name, default_marker);
    println!(
        "    api_url: {}",
        agent_race_sdk::normalize_origin(profile.api_url.as_deref())
    );
    if let Some(format) = &profile.output_format {
        println!("    output_format: {}", format);
    }
    if !profile.headers.is_empty() {
        println!("    headers:");
        for (k, v) in &profile.headers {
            println!("      {}: {}", k, v);
        }
    }
}

fn show(ctx: &Context, profile: Option<&str>) -> Result<()> {
    let config = &ctx.config;

    println!("{}", "Configuration".bold().underline());
    println!();

    println!("{}", "Settings:".cyan());
    println!("  output_format: {}", config.settings.output_format);
    println!("  color: {}", config.settings.color);
    println!("  verbose: {}", config.settings.verbose);
    println!("  timeout_secs: {}", config.settings.timeout_secs);
    println!("  max_retries: {}", config.settings.max_retries);
    println!("  judging_poll_secs: {}", config.settings.judging_poll_secs);

    if let Some(default) = &config.default_profile {
        println!();
        println!("{}: {}", "Default profile".cyan(), default);
    }

    println!();
    println!("{}", "Profiles:".cyan());

    if config.profiles.is_empty() {
        println!("  No profiles configured");
    } else if let Some(name) = profile {
        match config.profiles.get(name) {
            Some(p) => print_profile(name, p, config.default_profile.as_deref() == Some(name)),
            None => println!("  Profile '{}' not found", name),
        }
    } else {
        for (name, p) in &config.profiles {
            print_profile(name, p, config.default_profile.as_deref() == Some(name.as_str()));
        }
    }

    Ok(())
}

fn set_setting(settings: &mut Settings, setting: &str, value: &str) -> Result<()> {
    match setting {
        "output_format" => settings.output_format = value.to_string(),
        "color" => settings.color = value.parse().context("Invalid boolean value")?,
        "verbose" => settings.verbose = value.parse().context("Invalid boolean value")?,
        "timeout_secs" => settings.timeout_secs = value.parse().context("Invalid number")?,
        "max_retries" => settings.max_retries = value.parse().context("Invalid number")?,
        "judging_poll_secs" => {
            let secs: u64 = value.parse().context("Invalid number")?;
            if secs == 0 {
                bail!("judging_poll_secs must be at least 1");
            }
            settings.judging_poll_secs = secs;
        }
        _ => bail!("Unknown setting: {}", setting),
    }
    Ok(())
}

fn set_profile_field(profile: &mut Profile, field: &str, value: &str) -> Result<()> {
    match field {
        "api_url" => profile.api_url = Some(value.to_string()),
        "output_format" => profile.output_format = Some(value.to_string()),
        _ => match field.strip_prefix("headers.") {
            Some(header) if !header.is_empty() => {
                profile.headers.insert(header.to_string(), value.to_string());
            }
            _ => bail!("Unknown profile field: {}", field),
        },
    }
    Ok(())
}

/// Apply `key = value` to a configuration
fn apply(config: &mut CliConfig, key: &str, value: &str, profile: Option<&str>) -> Result<()> {
    let parts: Vec<&str> = key.splitn(3, '.').collect();

    match parts.as_slice() {
        ["settings", setting] => set_setting(&mut config.settings, setting, value),
        ["profile", pname, field] => set_profile_field(config.get_or_create_profile(pname), field, value),
        ["default_profile"] => {
            if !config.profiles.contains_key(value) {
                bail!("Profile '{}' not found", value);
            }
            config.set_default_profile(value);
            Ok(())
        }
        _ => match profile {
            Some(name) => set_profile_field(config.get_or_create_profile(name), key, value),
            None => bail!("Unknown configuration key: {}", key),
        },
    }
}

/// Read `key` from a configuration
fn lookup(config: &CliConfig, key: &str, profile: Option<&str>) -> Result<String> {
    let profile_field = |name: &str, field: &str| -> Result<String> {
        let p = config
            .profiles
            .get(name)
            .with_context(|| format!("Profile '{}' not found", name))?;
        match field {
            "api_url" => Ok(p.api_url.clone().unwrap_or_default()),
            "output_format" => Ok(p.output_format.clone().unwrap_or_default()),
            _ => match field.strip_prefix("headers.").and_then(|h| p.headers.get(h)) {
                Some(v) => Ok(v.clone()),
                None => bail!("Unknown profile field: {}", field),
            },
        }
    };

    let parts: Vec<&str> = key.splitn(3, '.').collect();
    match parts.as_slice() {
        ["settings", setting] => {
            let settings = &config.settings;
            Ok(match *setting {
                "output_format" => settings.output_format.clone(),
                "color" => settings.color.to_string(),
                "verbose" => settings.verbose.to_string(),
                "timeout_secs" => settings.timeout_secs.to_string(),
                "max_retries" => settings.max_retries.to_string(),
                "judging_poll_secs" => settings.judging_poll_secs.to_string(),
                _ => bail!("Unknown setting: {}", setting),
            })
        }
        ["profile", pname, field] => profile_field(*pname, *field),
        ["default_profile"] => Ok(config
            .default_profile
            .clone()
            .unwrap_or_else(|| "not set".to_string())),
        _ => match profile {
            Some(name) => profile_field(name, key),
            None => bail!("Unknown configuration key: {}", key),
        },
    }
}

fn set(ctx: &Context, key: &str, value: &str, profile: Option<&str>) -> Result<()> {
    let mut config = ctx.config.clone();
    apply(&mut config, key, value, profile)?;
    config.save().context("Failed to save configuration")?;

    ctx.output.success(&format!("Set {} = {}", key, value));
    Ok(())
}

fn get(ctx: &Context, key: &str, profile: Option<&str>) -> Result<()> {
    println!("{}", lookup(&ctx.config, key, profile)?);
    Ok(())
}

fn list_profiles(ctx: &Context) -> Result<()> {
    if ctx.config.profiles.is_empty() {
        ctx.output
            .info("No profiles configured. Run 'agent-race config create-profile <name>' to create one.");
        return Ok(());
    }

    println!("{}", "Configured profiles:".bold());
    println!();

    for name in ctx.config.list_profiles() {
        if ctx.config.default_profile.as_deref() == Some(name) {
            println!("  {} {}", "→".green(), name.green().bold());
        } else {
            println!("    {}", name);
        }
    }

    Ok(())
}

fn use_profile(ctx: &Context, name: &str) -> Result<()> {
    let mut config = ctx.config.clone();

    if !config.profiles.contains_key(name) {
        bail!(
            "Profile '{}' not found. Run 'agent-race config profiles' to list available profiles.",
            name
        );
    }

    config.set_default_profile(name);
    config.save().context("Failed to save configuration")?;

    ctx.output.success(&format!("Now using profile '{}'", name));
    Ok(())
}

fn create_profile(ctx: &Context, name: &str, api_url: Option<&str>, from: Option<&str>) -> Result<()> {
    let mut config = ctx.config.clone();

    if config.profiles.contains_key(name) {
        bail!("Profile '{}' already exists", name);
    }

    let mut new_profile = match from {
        Some(source) => config
            .profiles
            .get(source)
            .cloned()
            .with_context(|| format!("Source profile '{}' not found", source))?,
        None => Profile::default(),
    };

    if let Some(url) = api_url {
        new_profile.api_url = Some(url.to_string());
    }

    config.profiles.insert(name.to_string(), new_profile);
    config.save().context("Failed to save configuration")?;

    ctx.output.success(&format!("Created profile '{}'", name));
    if let Some(source) = from {
        ctx.output.info(&format!("Copied settings from '{}'", source));
    }

    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to get confirmation")
}

fn delete_profile(ctx: &Context, name: &str, force: bool) -> Result<()> {
    let mut config = ctx.config.clone();

    if !config.profiles.contains_key(name) {
        bail!("Profile '{}' not found", name);
    }

    if !force && !confirm(&format!("Delete profile '{}'?", name))? {
        ctx.output.info("Cancelled");
        return Ok(());
    }

    config.remove_profile(name);
    config.save().context("Failed to save configuration")?;

    ctx.output.success(&format!("Deleted profile '{}'", name));
    Ok(())
}

fn show_path() -> Result<()> {
    let path = CliConfig::config_path()?;
    let status = if path.exists() { "✓".green() } else { "✗".red() };
    println!("{} {}", status, path.display());
    Ok(())
}

fn reset(ctx: &Context, force: bool) -> Result<()> {
    if !force && !confirm("Reset all configuration to defaults? This cannot be undone.")? {
        ctx.output.info("Cancelled");
        return Ok(());
    }

    CliConfig::default()
        .save()
        .context("Failed to save configuration")?;

    ctx.output.success("Configuration reset to defaults");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_apply_and_lookup_settings() {
        let mut config = CliConfig::default();
        apply(&mut config, "settings.timeout_secs", "10", None).unwrap();
        apply(&mut config, "settings.judging_poll_secs", "5", None).unwrap();

        assert_eq!(lookup(&config, "settings.timeout_secs", None).unwrap(), "10");
        assert_eq!(lookup(&config, "settings.judging_poll_secs", None).unwrap(), "5");
        assert!(apply(&mut config, "settings.judging_poll_secs", "0", None).is_err());
        assert!(apply(&mut config, "settings.color", "maybe", None).is_err());
    }

    #[test]
    fn test_apply_profile_fields() {
        let mut config = CliConfig::default();
        apply(&mut config, "profile.local.api_url", ":9000", None).unwrap();
        apply(&mut config, "headers.X-Trace", "on", Some("local")).unwrap();

        assert_eq!(lookup(&config, "profile.local.api_url", None).unwrap(), ":9000");
        assert_eq!(lookup(&config, "headers.X-Trace", Some("local")).unwrap(), "on");
        assert!(lookup(&config, "profile.other.api_url", None).is_err());
    }

    #[test]
    fn test_default_profile_must_exist() {
        let mut config = CliConfig::default();
        assert!(apply(&mut config, "default_profile", "missing", None).is_err());

        config.get_or_create_profile("local");
        apply(&mut config, "default_profile", "local", None).unwrap();
        assert_eq!(lookup(&config, "default_profile", None).unwrap(), "local");
    }

    #[test]
    fn test_unknown_keys() {
        let mut config = CliConfig::default();
        assert!(apply(&mut config, "nonsense", "1", None).is_err());
        assert!(lookup(&config, "settings.nonsense", None).is_err());
    }
}

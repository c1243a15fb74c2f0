//! Command-line argument definitions

use agent_race_sdk::API_URL_ENV;
use clap::{Parser, Subcommand};

use crate::commands::config::ConfigCommands;
use crate::commands::race::RaceCommands;
use crate::commands::run::RunCommands;
use crate::output::OutputFormat;

/// Race a browser automation agent from the terminal
#[derive(Debug, Parser)]
#[command(name = "agent-race", version, about, long_about = None)]
pub struct Cli {
    /// Configuration profile to use
    #[arg(short, long, global = true, env = "AGENT_RACE_PROFILE")]
    pub profile: Option<String>,

    /// Output format (defaults to the configured format)
    #[arg(short, long, global = true, value_enum)]
    pub output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// API origin (full URL, host[:port] or :port)
    #[arg(long, global = true, env = API_URL_ENV)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create, start and follow races
    Race(RaceCommands),

    /// Launch standalone agent runs
    Run(RunCommands),

    /// Manage configuration and profiles
    Config(ConfigCommands),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_race_submit() {
        let cli = Cli::try_parse_from([
            "agent-race",
            "--output",
            "json",
            "race",
            "submit",
            "race-1",
            "$129",
        ])
        .unwrap();

        assert_eq!(cli.output, Some(OutputFormat::Json));
        assert!(matches!(cli.command, Commands::Race(_)));
    }

    #[test]
    fn test_race_show_needs_an_id() {
        assert!(Cli::try_parse_from(["agent-race", "race", "show"]).is_err());

        let cli = Cli::try_parse_from(["agent-race", "race", "show", "a", "b"]).unwrap();
        match cli.command {
            Commands::Race(RaceCommands {
                command: crate::commands::race::RaceSubcommand::Show { ids },
            }) => assert_eq!(ids.len(), 2),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}

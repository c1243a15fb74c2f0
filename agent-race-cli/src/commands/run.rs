//! Standalone run commands

use agent_race_sdk::{EventStream, RunId, RunStatusResponse, StreamEvent};
use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use comfy_table::Cell;
use futures::StreamExt;
use serde::Serialize;

use crate::context::Context;
use crate::output::{print_field, print_section, status_badge, TableDisplay};

/// Run commands
#[derive(Debug, Args)]
pub struct RunCommands {
    #[command(subcommand)]
    pub command: RunSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum RunSubcommand {
    /// Launch the agent on a free-form task
    Start {
        /// Task instruction for the agent
        task: String,

        /// Print the run ID and return without streaming events
        #[arg(long)]
        detach: bool,
    },

    /// Show the state of a run
    Status {
        /// Run ID
        id: RunId,
    },

    /// Stream the events of a run
    Events {
        /// Run ID
        id: RunId,
    },
}

/// Execute run commands
pub async fn execute(ctx: &Context, cmd: RunCommands) -> Result<()> {
    let client = ctx.create_client()?;

    match cmd.command {
        RunSubcommand::Start { task, detach } => {
            let handle = client
                .runs()
                .start(task)
                .await
                .context("Failed to start run")?;

            ctx.output.success(&format!("Started run {}", handle.run_id));
            if detach {
                if !ctx.output.is_human() {
                    println!("{}", serde_json::to_string(&handle)?);
                }
                return Ok(());
            }

            let events = client.runs().events(&handle.run_id).await?;
            print_events(ctx, &handle.run_id, events).await
        }

        RunSubcommand::Status { id } => {
            let status = client
                .runs()
                .status(&id)
                .await
                .with_context(|| format!("Failed to fetch run {}", id))?;
            ctx.output.write(&RunDisplay(status))
        }

        RunSubcommand::Events { id } => {
            let events = client.runs().events(&id).await?;
            print_events(ctx, &id, events).await
        }
    }
}

/// Print events as they arrive until the run completes or the stream ends
async fn print_events(ctx: &Context, run_id: &RunId, mut events: EventStream) -> Result<()> {
    let mut completed = false;

    while let Some(item) = events.next().await {
        let event = item?;
        completed = event.is_terminal();
        ctx.output.write_line(&EventLine {
            run_id: run_id.clone(),
            event,
        })?;
        if completed {
            break;
        }
    }

    if !completed {
        ctx.output
            .warning(&format!("Event stream of run {} ended before completion", run_id));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct RunDisplay(RunStatusResponse);

impl TableDisplay for RunDisplay {
    fn to_row(&self) -> Vec<Cell> {
        vec![
            Cell::new(self.0.run_id.as_str()),
            Cell::new(status_badge(&self.0.state.to_string())),
            Cell::new(&self.0.task),
        ]
    }

    fn display_single(&self) {
        print_section("Run");
        print_field("ID", self.0.run_id.as_str());
        print_field("State", &status_badge(&self.0.state.to_string()));
        print_field("Task", &self.0.task);
    }

    fn display_compact(&self) {
        println!("{}\t{}\t{}", self.0.run_id, self.0.state, self.0.task);
    }
}

/// One event of a run's feed
#[derive(Debug, Serialize)]
struct EventLine {
    run_id: RunId,
    #[serde(flatten)]
    event: StreamEvent,
}

impl EventLine {
    fn text(&self) -> String {
        match &self.event {
            StreamEvent::Status { status, message } => match (status, message) {
                (Some(status), Some(message)) => format!("{} {}", status, message),
                (Some(status), None) => status.to_string(),
                (None, Some(message)) => message.clone(),
                (None, None) => String::new(),
            },
            StreamEvent::Log { message } | StreamEvent::Message { message } => {
                message.clone().unwrap_or_default()
            }
            StreamEvent::Error { message } => message.clone().unwrap_or_else(|| "error".to_string()),
            StreamEvent::Result { result } => result.clone().unwrap_or_default(),
            StreamEvent::LiveUrl { url } => url.clone().unwrap_or_default(),
            StreamEvent::Complete => "run complete".to_string(),
            StreamEvent::Unknown => String::new(),
        }
    }
}

impl TableDisplay for EventLine {
    fn to_row(&self) -> Vec<Cell> {
        vec![Cell::new(self.event.kind()), Cell::new(self.text())]
    }

    fn display_single(&self) {
        self.display_compact();
    }

    fn display_compact(&self) {
        let kind = format!("{:>8}", self.event.kind());
        let kind = match &self.event {
            StreamEvent::Error { .. } => kind.red(),
            StreamEvent::Result { .. } | StreamEvent::Complete => kind.green(),
            StreamEvent::LiveUrl { .. } => kind.cyan(),
            StreamEvent::Status { .. } => kind.blue(),
            _ => kind.dimmed(),
        };
        println!("{} {}", kind, self.text());
    }
}

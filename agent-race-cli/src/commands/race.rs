//! Race commands

use agent_race_core::{ParticipantState, ParticipantStatus, RaceSession, RaceStatus, Verdict};
use agent_race_sdk::{AgentRaceClient, RaceController, RaceId};
use anyhow::{bail, Context as _, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use comfy_table::Cell;
use indicatif::ProgressBar;
use serde::Serialize;
use tokio::sync::{oneshot, watch};

use crate::context::Context;
use crate::output::{
    format_duration, format_score, format_timestamp, print_field, print_list_field,
    print_optional_field, print_section, status_badge, TableDisplay, MISSING,
};

/// Race commands
#[derive(Debug, Args)]
pub struct RaceCommands {
    #[command(subcommand)]
    pub command: RaceSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum RaceSubcommand {
    /// Create a new race with a generated task
    New {
        /// Start the race right away and follow the agent
        #[arg(long)]
        start: bool,
    },

    /// Show the current state of one or more races
    Show {
        /// Race IDs; several are shown as a summary table
        #[arg(required = true)]
        ids: Vec<RaceId>,
    },

    /// Start a race and follow the agent's progress
    Start {
        /// Race ID
        id: RaceId,

        /// Return once the agent is started instead of following it
        #[arg(long)]
        detach: bool,
    },

    /// Submit the human answer
    Submit {
        /// Race ID
        id: RaceId,

        /// Answer text; omit for confirmation tasks
        answer: Option<String>,

        /// Wait for the verdict after submitting
        #[arg(short, long)]
        wait: bool,
    },

    /// Wait for the verdict of a race being judged
    Wait {
        /// Race ID
        id: RaceId,
    },

    /// Play a full race interactively against the agent
    Play,
}

/// Execute race commands
pub async fn execute(ctx: &Context, cmd: RaceCommands) -> Result<()> {
    match cmd.command {
        RaceSubcommand::New { start } => new_race(ctx, start).await,
        RaceSubcommand::Show { ids } => show(ctx, ids).await,
        RaceSubcommand::Start { id, detach } => start(ctx, id, detach).await,
        RaceSubcommand::Submit { id, answer, wait } => submit(ctx, id, answer, wait).await,
        RaceSubcommand::Wait { id } => wait_for_verdict(ctx, id).await,
        RaceSubcommand::Play => play(ctx).await,
    }
}

// ===== Display =====

/// Displayable race for output
#[derive(Debug, Serialize)]
pub struct RaceDisplay {
    race_id: RaceId,
    status: String,
    task: Option<TaskDisplay>,
    agent: ParticipantDisplay,
    human: ParticipantDisplay,
    verdict: Option<Verdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct TaskDisplay {
    title: String,
    summary: String,
    task_type: String,
    /// Hidden until the race has started
    human_instructions: Option<String>,
    success_criteria: String,
    expected_output: String,
    evaluation_guidelines: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ParticipantDisplay {
    status: String,
    started_at: Option<String>,
    completed_at: Option<String>,
    duration: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    live_url: Option<String>,
    result: Option<String>,
}

impl From<&ParticipantState> for ParticipantDisplay {
    fn from(p: &ParticipantState) -> Self {
        Self {
            status: p.status.to_string(),
            started_at: p.started_at.as_ref().map(format_timestamp),
            completed_at: p.completed_at.as_ref().map(format_timestamp),
            duration: format_duration(p.effective_duration()),
            live_url: p.live_url.clone(),
            result: p.result.clone(),
        }
    }
}

impl RaceDisplay {
    /// Render the session's race, honoring the prompt visibility flag
    pub fn from_session(session: &RaceSession) -> Option<Self> {
        let race = session.race()?;
        let task = race.task.as_ref().map(|t| TaskDisplay {
            title: t.title.clone(),
            summary: t.summary.clone(),
            task_type: t.task_type.to_string(),
            human_instructions: session
                .prompt_revealed()
                .then(|| t.human_instructions.clone()),
            success_criteria: t.success_criteria.clone(),
            expected_output: t.expected_output_description.clone(),
            evaluation_guidelines: t.evaluation_guidelines.clone(),
        });

        Some(Self {
            race_id: race.id.clone(),
            status: race.status.to_string(),
            task,
            agent: (&race.agent).into(),
            human: (&race.human).into(),
            verdict: race.verdict.clone(),
            error: session.error().map(str::to_string),
        })
    }

    fn winner(&self) -> String {
        self.verdict
            .as_ref()
            .map(|v| v.winner.to_string())
            .unwrap_or_else(|| MISSING.to_string())
    }
}

fn print_participant(title: &str, p: &ParticipantDisplay) {
    print_section(title);
    print_field("Status", &status_badge(&p.status));
    print_optional_field("Started", p.started_at.as_deref());
    print_optional_field("Completed", p.completed_at.as_deref());
    print_field("Duration", &p.duration);
    print_optional_field("Live view", p.live_url.as_deref());
    print_optional_field("Result", p.result.as_deref());
}

impl TableDisplay for RaceDisplay {
    fn to_row(&self) -> Vec<Cell> {
        vec![
            Cell::new(self.race_id.as_str()),
            Cell::new(status_badge(&self.status)),
            Cell::new(status_badge(&self.agent.status)),
            Cell::new(status_badge(&self.human.status)),
            Cell::new(self.winner()),
        ]
    }

    fn display_single(&self) {
        print_section("Race");
        print_field("ID", self.race_id.as_str());
        print_field("Status", &status_badge(&self.status));

        if let Some(task) = &self.task {
            print_section("Task");
            print_field("Title", &task.title);
            print_field("Summary", &task.summary);
            print_field("Type", &task.task_type);
            match &task.human_instructions {
                Some(instructions) => print_field("Instructions", instructions),
                None => print_field("Instructions", &"revealed when the race starts".dimmed().to_string()),
            }
            print_field("Success criteria", &task.success_criteria);
            print_optional_field(
                "Expected output",
                Some(task.expected_output.as_str()).filter(|s| !s.is_empty()),
            );
            print_list_field("Evaluation", &task.evaluation_guidelines);
        }

        print_participant("Agent", &self.agent);
        print_participant("Human", &self.human);

        print_section("Verdict");
        match &self.verdict {
            Some(verdict) => {
                print_field("Winner", &verdict.winner.to_string().bold().to_string());
                print_field("Agent score", &format_score(verdict.agent_score));
                print_field("Human score", &format_score(verdict.human_score));
                print_field("Reasoning", &verdict.reasoning);
            }
            None if self.status == RaceStatus::Judging.as_str() => {
                print_field("Winner", &"judging in progress".dimmed().to_string())
            }
            None => print_field("Winner", MISSING),
        }

        if let Some(error) = &self.error {
            println!();
            println!("{} {}", "Error:".red().bold(), error);
        }
    }

    fn display_compact(&self) {
        println!(
            "{}\t{}\tagent={}\thuman={}\twinner={}",
            self.race_id,
            self.status,
            self.agent.status,
            self.human.status,
            self.winner()
        );
    }
}

fn write_session(ctx: &Context, session: &RaceSession) -> Result<()> {
    match RaceDisplay::from_session(session) {
        Some(display) => ctx.output.write(&display),
        None => bail!("No race loaded"),
    }
}

// ===== Progress =====

/// Whether the session will not change again without a user action
fn is_settled(session: &RaceSession) -> bool {
    !session.stream_state().is_open() && !session.busy().refreshing && !session.needs_judging_poll()
}

/// Prints what changed between session snapshots
struct ProgressReporter {
    spinner: Option<ProgressBar>,
    agent_status: Option<ParticipantStatus>,
    live_url: Option<String>,
    result_shown: bool,
    error: Option<String>,
    judging_shown: bool,
}

impl ProgressReporter {
    fn new(spinner: Option<ProgressBar>) -> Self {
        Self {
            spinner,
            agent_status: None,
            live_url: None,
            result_shown: false,
            error: None,
            judging_shown: false,
        }
    }

    fn line(&self, message: String) {
        match &self.spinner {
            Some(spinner) => spinner.println(message),
            None => println!("{}", message),
        }
    }

    fn report(&mut self, session: &RaceSession) {
        let Some(race) = session.race() else {
            return;
        };
        let agent = &race.agent;

        if self.agent_status.as_ref() != Some(&agent.status) {
            self.agent_status = Some(agent.status.clone());
            let message = format!("Agent {}", agent.status);
            match &self.spinner {
                Some(spinner) => spinner.set_message(message),
                None => self.line(format!("{} {}", "›".dimmed(), status_badge(&message))),
            }
        }

        if agent.live_url.is_some() && agent.live_url != self.live_url {
            self.live_url = agent.live_url.clone();
            if let Some(url) = &self.live_url {
                self.line(format!("{} {}", "Live view:".cyan(), url.underline()));
            }
        }

        if !self.result_shown {
            if let Some(result) = agent.result.as_deref().filter(|r| !r.is_empty()) {
                self.result_shown = true;
                self.line(format!("{} {}", "Agent result:".cyan(), result));
            }
        }

        if session.error().is_some() && session.error() != self.error.as_deref() {
            self.error = session.error().map(str::to_string);
            if let Some(error) = &self.error {
                self.line(format!("{} {}", "⚠".yellow(), error));
            }
        }

        if race.is_judging() && !self.judging_shown {
            self.judging_shown = true;
            match &self.spinner {
                Some(spinner) => spinner.set_message("Judging"),
                None => self.line("Judging…".dimmed().to_string()),
            }
        }
    }

    fn finish(&self) {
        if let Some(spinner) = &self.spinner {
            spinner.finish_and_clear();
        }
    }
}

/// Report progress until the session settles
async fn follow(
    mut updates: watch::Receiver<RaceSession>,
    reporter: &mut ProgressReporter,
) -> RaceSession {
    loop {
        let session = updates.borrow_and_update().clone();
        reporter.report(&session);
        if is_settled(&session) || updates.changed().await.is_err() {
            return session;
        }
    }
}

/// Report progress in the background until told to stop
fn report_in_background(
    mut updates: watch::Receiver<RaceSession>,
    mut reporter: ProgressReporter,
) -> (oneshot::Sender<()>, tokio::task::JoinHandle<ProgressReporter>) {
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        loop {
            let session = updates.borrow_and_update().clone();
            reporter.report(&session);
            tokio::select! {
                _ = &mut stop_rx => return reporter,
                changed = updates.changed() => {
                    if changed.is_err() {
                        return reporter;
                    }
                }
            }
        }
    });
    (stop_tx, handle)
}

async fn follow_and_show(ctx: &Context, controller: &RaceController<AgentRaceClient>) -> Result<()> {
    let spinner = ctx.output.spinner("Waiting for the agent");
    let mut reporter = ProgressReporter::new(spinner);
    let session = if ctx.output.is_human() {
        follow(controller.subscribe(), &mut reporter).await
    } else {
        let mut updates = controller.subscribe();
        let settled = updates
            .wait_for(is_settled)
            .await
            .context("Race controller stopped")?
            .clone();
        settled
    };
    reporter.finish();
    write_session(ctx, &session)
}

// ===== Commands =====

async fn new_race(ctx: &Context, start_now: bool) -> Result<()> {
    let controller = ctx.create_controller()?;

    let spinner = ctx.output.spinner("Generating a task...");
    let result = controller.create_race().await;
    if let Some(s) = spinner {
        s.finish_and_clear();
    }
    let race = result.context("Failed to create race")?;

    ctx.output.success(&format!("Created race {}", race.id));
    if start_now {
        start_and_follow(ctx, &controller, false).await
    } else {
        write_session(ctx, &controller.snapshot())
    }
}

async fn show(ctx: &Context, ids: Vec<RaceId>) -> Result<()> {
    let client = ctx.create_client()?;

    let spinner = ctx.output.spinner("Fetching race...");
    let mut sessions = Vec::with_capacity(ids.len());
    let mut failure = None;
    for id in &ids {
        match client.races().get(id).await {
            Ok(race) => {
                let mut session = RaceSession::new();
                session.apply_snapshot(race);
                sessions.push(session);
            }
            Err(e) => {
                failure = Some(anyhow::Error::new(e).context(format!("Failed to fetch race {}", id)));
                break;
            }
        }
    }
    if let Some(s) = spinner {
        s.finish_and_clear();
    }
    if let Some(e) = failure {
        return Err(e);
    }

    if let [session] = sessions.as_slice() {
        return write_session(ctx, session);
    }
    let rows: Vec<RaceDisplay> = sessions.iter().filter_map(RaceDisplay::from_session).collect();
    ctx.output
        .write_list(&rows, &["ID", "Status", "Agent", "Human", "Winner"])
}

async fn start(ctx: &Context, id: RaceId, detach: bool) -> Result<()> {
    let controller = ctx.create_controller()?;
    controller
        .resume(&id)
        .await
        .with_context(|| format!("Failed to load race {}", id))?;

    start_and_follow(ctx, &controller, detach).await
}

async fn start_and_follow(
    ctx: &Context,
    controller: &RaceController<AgentRaceClient>,
    detach: bool,
) -> Result<()> {
    let spinner = ctx.output.spinner("Starting race...");
    let result = controller.start_race().await;
    if let Some(s) = spinner {
        s.finish_and_clear();
    }
    let race = result.context("Failed to start race")?;

    ctx.output.success(&format!("Race {} started", race.id));
    if detach {
        if let Some(run_id) = controller.snapshot().run_id() {
            ctx.output.info(&format!("Agent run: {}", run_id));
        }
        return write_session(ctx, &controller.snapshot());
    }

    follow_and_show(ctx, controller).await
}

async fn submit(ctx: &Context, id: RaceId, answer: Option<String>, wait: bool) -> Result<()> {
    let controller = ctx.create_controller()?;
    let race = controller
        .resume(&id)
        .await
        .with_context(|| format!("Failed to load race {}", id))?;

    let answer = answer.filter(|a| !a.trim().is_empty());
    if race.requires_text_submission() && answer.is_none() {
        bail!("Race {} expects a text answer", id);
    }

    let spinner = ctx.output.spinner("Submitting...");
    let result = controller.submit_human(answer).await;
    if let Some(s) = spinner {
        s.finish_and_clear();
    }
    result.context("Failed to submit answer")?;
    ctx.output.success("Answer submitted");

    if wait {
        follow_and_show(ctx, &controller).await
    } else {
        write_session(ctx, &controller.snapshot())
    }
}

async fn wait_for_verdict(ctx: &Context, id: RaceId) -> Result<()> {
    let controller = ctx.create_controller()?;
    let race = controller
        .resume(&id)
        .await
        .with_context(|| format!("Failed to load race {}", id))?;

    if !race.is_judging() {
        ctx.output
            .info(&format!("Race {} is {}; nothing to wait for", race.id, race.status));
        return write_session(ctx, &controller.snapshot());
    }

    follow_and_show(ctx, &controller).await
}

async fn play(ctx: &Context) -> Result<()> {
    if !console::user_attended() {
        bail!("'race play' needs an interactive terminal");
    }

    let controller = ctx.create_controller()?;

    let spinner = ctx.output.spinner("Generating a task...");
    let result = controller.create_race().await;
    if let Some(s) = spinner {
        s.finish_and_clear();
    }
    let race = result.context("Failed to create race")?;
    let task = race.task.clone().context("The server returned a race without a task")?;

    print_section(&task.title);
    println!("{}", task.summary);
    println!();

    let ready = prompt(|| {
        dialoguer::Confirm::new()
            .with_prompt("Start the race?")
            .default(true)
            .interact()
    })
    .await?;
    if !ready {
        ctx.output.info(&format!("Race {} left ready; start it later with 'race start'", race.id));
        return Ok(());
    }

    controller.start_race().await.context("Failed to start race")?;

    print_section("Your instructions");
    println!("{}", task.human_instructions);
    print_field("Success criteria", &task.success_criteria);
    println!();

    let (stop, reporter) =
        report_in_background(controller.subscribe(), ProgressReporter::new(None));

    let answer = if task.task_type.requires_text() {
        let text = prompt(|| {
            dialoguer::Input::<String>::new()
                .with_prompt("Your answer")
                .interact_text()
        })
        .await?;
        Some(text)
    } else {
        prompt(|| {
            dialoguer::Confirm::new()
                .with_prompt("Done?")
                .default(true)
                .wait_for_newline(true)
                .interact()
        })
        .await?;
        None
    };
    controller.set_submission_draft(answer.clone().unwrap_or_default());

    controller.submit_human(answer).await.context("Failed to submit answer")?;
    ctx.output.success("Answer submitted");

    let _ = stop.send(());
    let mut reporter = reporter.await.context("Progress reporter failed")?;
    let session = follow(controller.subscribe(), &mut reporter).await;
    reporter.finish();

    write_session(ctx, &session)
}

/// Run a blocking dialoguer prompt off the async workers
async fn prompt<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> dialoguer::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("Prompt task failed")?
        .context("Failed to read input")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn session_for(value: serde_json::Value) -> RaceSession {
        let mut session = RaceSession::new();
        session.apply_snapshot(serde_json::from_value(value).unwrap());
        session
    }

    #[test]
    fn test_ready_race_hides_instructions() {
        let session = session_for(serde_json::json!({
            "race_id": "r1",
            "status": "ready",
            "task": {
                "title": "Find a flight",
                "task_type": "text_entry",
                "human_instructions": "Search for the fare"
            }
        }));

        let display = RaceDisplay::from_session(&session).unwrap();
        assert_eq!(display.task.unwrap().human_instructions, None);
    }

    #[test]
    fn test_started_race_reveals_instructions() {
        let session = session_for(serde_json::json!({
            "race_id": "r1",
            "status": "judging",
            "task": {
                "title": "Find a flight",
                "task_type": "text_entry",
                "human_instructions": "Search for the fare"
            },
            "agent": { "status": "completed", "duration_seconds": 0.25 }
        }));

        let display = RaceDisplay::from_session(&session).unwrap();
        assert_eq!(
            display.task.as_ref().unwrap().human_instructions.as_deref(),
            Some("Search for the fare")
        );
        assert_eq!(display.agent.duration, "250ms");
        assert_eq!(display.human.duration, "—");
        assert_eq!(display.winner(), "—");
    }

    #[test]
    fn test_settled_session() {
        let judging = session_for(serde_json::json!({ "race_id": "r1", "status": "judging" }));
        let done = session_for(serde_json::json!({ "race_id": "r1", "status": "awaiting_human" }));

        assert!(!is_settled(&judging));
        assert!(is_settled(&done));
    }
}

//! Client-side race session state.
//!
//! [`RaceSession`] holds the single current race together with everything
//! the client derives around it: the active run, the displayed error, the
//! prompt visibility flag, busy flags and the stream state. It performs no
//! I/O; the controller feeds it snapshots and stream events.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::domain::{ParticipantStatus, Race, RaceId, RaceStatus, RunId, StreamEvent};
use crate::error::{CoreError, Result};
use crate::live_url::{extract_live_url, sanitize_live_url};

/// Shown when the event stream drops without a more specific error.
pub const STREAM_INTERRUPTED_MESSAGE: &str =
    "Connection to the agent stream was interrupted. Refreshing race state.";

/// Shown for an `error` event that carries no message.
pub const AGENT_ERROR_MESSAGE: &str = "The agent reported an error.";

// ===== Errors =====

/// Where a user-visible error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSource {
    /// create, start or submit triggered by the user
    Action,
    /// reconciling or polling refresh
    Refresh,
    /// the event stream connection dropped
    StreamTransport,
    /// an `error` event sent by the server
    StreamEvent,
}

/// How a new error interacts with one already on display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    Overwrite,
    KeepFirst,
}

impl ErrorSource {
    pub fn policy(self) -> ErrorPolicy {
        match self {
            ErrorSource::Action => ErrorPolicy::Overwrite,
            ErrorSource::Refresh | ErrorSource::StreamTransport | ErrorSource::StreamEvent => {
                ErrorPolicy::KeepFirst
            }
        }
    }
}

// ===== Generation =====

/// Monotonic token identifying which race a pending action belongs to.
///
/// Starting a new race (or resuming another one) advances the generation;
/// results carrying an older token are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Generation(u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

// ===== Busy flags =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Start,
    Submit,
    Refresh,
}

/// One flag per user action so the view can disable its trigger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BusyFlags {
    pub creating: bool,
    pub starting: bool,
    pub submitting: bool,
    pub refreshing: bool,
}

impl BusyFlags {
    pub fn set(&mut self, action: Action, busy: bool) {
        match action {
            Action::Create => self.creating = busy,
            Action::Start => self.starting = busy,
            Action::Submit => self.submitting = busy,
            Action::Refresh => self.refreshing = busy,
        }
    }

    pub fn is_busy(&self, action: Action) -> bool {
        match action {
            Action::Create => self.creating,
            Action::Start => self.starting,
            Action::Submit => self.submitting,
            Action::Refresh => self.refreshing,
        }
    }

    pub fn any(&self) -> bool {
        self.creating || self.starting || self.submitting || self.refreshing
    }
}

// ===== Stream state =====

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "run_id", rename_all = "snake_case")]
pub enum StreamState {
    #[default]
    Idle,
    Open(RunId),
    Closed(RunId),
}

impl StreamState {
    pub fn is_open(&self) -> bool {
        matches!(self, StreamState::Open(_))
    }
}

/// What folding a stream event into the session produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// State changed.
    Applied,
    /// Nothing changed (no-op type, guarded field, no current race).
    Ignored,
    /// Terminal event: the stream must be closed and the race refreshed.
    Completed,
}

// ===== Session =====

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RaceSession {
    race: Option<Race>,
    run_id: Option<RunId>,
    error: Option<String>,
    prompt_revealed: bool,
    submission_draft: String,
    busy: BusyFlags,
    stream: StreamState,
    generation: Generation,
}

impl RaceSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn race(&self) -> Option<&Race> {
        self.race.as_ref()
    }

    pub fn race_id(&self) -> Option<&RaceId> {
        self.race.as_ref().map(|r| &r.id)
    }

    /// The current race, or an error when none has been created yet.
    pub fn require_race(&self) -> Result<&Race> {
        self.race
            .as_ref()
            .ok_or_else(|| CoreError::InvalidState("no race has been created".to_string()))
    }

    pub fn run_id(&self) -> Option<&RunId> {
        self.run_id.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn prompt_revealed(&self) -> bool {
        self.prompt_revealed
    }

    pub fn submission_draft(&self) -> &str {
        &self.submission_draft
    }

    pub fn busy(&self) -> BusyFlags {
        self.busy
    }

    pub fn stream_state(&self) -> &StreamState {
        &self.stream
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.generation == generation
    }

    /// Reset everything tied to the previous race before a new one is
    /// created or loaded. The old snapshot stays visible until replaced.
    pub fn begin_new_race(&mut self) -> Generation {
        self.generation = self.generation.next();
        self.run_id = None;
        self.error = None;
        self.prompt_revealed = false;
        self.submission_draft.clear();
        self.busy = BusyFlags::default();
        self.stream = StreamState::Idle;
        debug!(generation = self.generation.value(), "session reset for new race");
        self.generation
    }

    pub fn set_busy(&mut self, action: Action, busy: bool) {
        self.busy.set(action, busy);
    }

    /// Replace the race with a server snapshot.
    ///
    /// Any status other than `ready` means the human prompt must be
    /// visible, even if this client never ran the start flow (resume after
    /// a reload).
    pub fn apply_snapshot(&mut self, race: Race) {
        if race.status != RaceStatus::Ready {
            self.prompt_revealed = true;
        }
        self.race = Some(race);
    }

    pub fn reveal_prompt(&mut self) {
        self.prompt_revealed = true;
    }

    pub fn set_run_id(&mut self, run_id: RunId) {
        self.run_id = Some(run_id);
    }

    pub fn set_submission_draft(&mut self, draft: impl Into<String>) {
        self.submission_draft = draft.into();
    }

    /// Record a user-visible error according to the source's policy.
    ///
    /// Returns whether the message is now the one displayed.
    pub fn record_error(&mut self, source: ErrorSource, message: impl Into<String>) -> bool {
        if source.policy() == ErrorPolicy::KeepFirst {
            if let Some(existing) = &self.error {
                debug!(?source, existing = %existing, "keeping earlier error");
                return false;
            }
        }
        self.error = Some(message.into());
        true
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn stream_opened(&mut self, run_id: RunId) {
        self.stream = StreamState::Open(run_id);
    }

    /// Mark the stream closed. Returns `false` if it was not open, so
    /// callers can tell a repeated close from a real one.
    pub fn stream_closed(&mut self) -> bool {
        match std::mem::take(&mut self.stream) {
            StreamState::Open(run_id) => {
                self.stream = StreamState::Closed(run_id);
                true
            }
            other => {
                self.stream = other;
                false
            }
        }
    }

    /// Whether the judging poll should keep running.
    pub fn needs_judging_poll(&self) -> bool {
        self.race.as_ref().is_some_and(Race::is_judging)
    }

    /// Fold one stream event into the agent's participant state.
    ///
    /// `received_at` is the local receipt time; it is used for timestamps
    /// the stream does not carry.
    pub fn apply_event(&mut self, event: &StreamEvent, received_at: DateTime<Utc>) -> EventOutcome {
        if let StreamEvent::Error { message } = event {
            let message = message
                .as_deref()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(AGENT_ERROR_MESSAGE);
            self.record_error(ErrorSource::StreamEvent, message);
            if let Some(race) = self.race.as_mut() {
                race.agent.status = ParticipantStatus::Error;
            }
            return EventOutcome::Applied;
        }

        let Some(race) = self.race.as_mut() else {
            return if event.is_terminal() {
                EventOutcome::Completed
            } else {
                EventOutcome::Ignored
            };
        };
        let agent = &mut race.agent;

        match event {
            StreamEvent::Status {
                status: Some(status),
                ..
            } => {
                agent.status = status.clone();
                if status.is_running() {
                    if race.status == RaceStatus::Ready {
                        race.status = RaceStatus::Running;
                    }
                    if agent.started_at.is_none() {
                        agent.started_at = Some(received_at);
                    }
                }
                EventOutcome::Applied
            }
            // First live URL scraped from logs wins.
            StreamEvent::Log {
                message: Some(message),
            } => match extract_live_url(message) {
                Some(url) if agent.live_url.is_none() => {
                    agent.live_url = Some(url);
                    EventOutcome::Applied
                }
                _ => EventOutcome::Ignored,
            },
            // A dedicated live_url event always wins.
            StreamEvent::LiveUrl { url: Some(url) } => match sanitize_live_url(url) {
                Some(url) => {
                    agent.live_url = Some(url);
                    EventOutcome::Applied
                }
                None => EventOutcome::Ignored,
            },
            StreamEvent::Result {
                result: Some(result),
            } if !result.is_empty() && !agent.has_result() => {
                agent.result = Some(result.clone());
                EventOutcome::Applied
            }
            StreamEvent::Complete => {
                if agent.status != ParticipantStatus::Error {
                    agent.status = ParticipantStatus::Completed;
                }
                if agent.completed_at.is_none() {
                    agent.completed_at = Some(received_at);
                }
                EventOutcome::Completed
            }
            _ => EventOutcome::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ParticipantState, TaskType};
    use chrono::TimeZone;

    fn race(status: RaceStatus) -> Race {
        Race {
            id: RaceId::new("r1"),
            status,
            task: Some(crate::domain::Task {
                title: "Headline".to_string(),
                summary: String::new(),
                human_instructions: String::new(),
                agent_instructions: String::new(),
                task_type: TaskType::TextEntry,
                success_criteria: String::new(),
                expected_output_description: String::new(),
                evaluation_guidelines: vec![],
            }),
            agent: ParticipantState::default(),
            human: ParticipantState::default(),
            verdict: None,
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_error_policy_per_source() {
        let mut session = RaceSession::new();
        assert!(session.record_error(ErrorSource::Refresh, "first"));
        assert!(!session.record_error(ErrorSource::StreamTransport, "second"));
        assert_eq!(session.error(), Some("first"));
        assert!(session.record_error(ErrorSource::Action, "third"));
        assert_eq!(session.error(), Some("third"));
    }

    #[test]
    fn test_begin_new_race_advances_generation() {
        let mut session = RaceSession::new();
        let first = session.begin_new_race();
        session.set_submission_draft("draft");
        session.reveal_prompt();
        let second = session.begin_new_race();
        assert!(second > first);
        assert!(!session.is_current(first));
        assert_eq!(session.submission_draft(), "");
        assert!(!session.prompt_revealed());
    }

    #[test]
    fn test_stream_closed_only_once() {
        let mut session = RaceSession::new();
        session.stream_opened(RunId::new("run"));
        assert!(session.stream_closed());
        assert!(!session.stream_closed());
        assert_eq!(session.stream_state(), &StreamState::Closed(RunId::new("run")));
    }

    #[test]
    fn test_status_running_promotes_ready_race() {
        let mut session = RaceSession::new();
        session.apply_snapshot(race(RaceStatus::Ready));
        session.apply_event(&StreamEvent::status("running"), at(1));
        session.apply_event(&StreamEvent::status("running"), at(5));

        let race = session.race().unwrap();
        assert_eq!(race.status, RaceStatus::Running);
        assert_eq!(race.agent.started_at, Some(at(1)));
    }

    #[test]
    fn test_complete_keeps_error_status() {
        let mut session = RaceSession::new();
        session.apply_snapshot(race(RaceStatus::Running));
        session.apply_event(&StreamEvent::error("boom"), at(1));
        let outcome = session.apply_event(&StreamEvent::Complete, at(2));

        assert_eq!(outcome, EventOutcome::Completed);
        let agent = &session.race().unwrap().agent;
        assert_eq!(agent.status, ParticipantStatus::Error);
        assert_eq!(agent.completed_at, Some(at(2)));
    }
}

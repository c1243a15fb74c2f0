//! Race session controller
//!
//! [`RaceController`] drives one [`RaceSession`] against a [`RaceApi`]: it
//! issues the lifecycle calls, follows the agent's event stream in a
//! background task, reconciles with the server after the stream ends and
//! polls while the race is being judged. Every state change is published
//! on a `watch` channel so a view can render snapshots.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use agent_race_core::{
    Action, ErrorSource, EventOutcome, Generation, Race, RaceId, RaceSession, RunId, StreamState,
    STREAM_INTERRUPTED_MESSAGE,
};

use crate::api::RaceApi;
use crate::config::DEFAULT_JUDGING_POLL_INTERVAL;
use crate::error::{SdkError, SdkResult};

/// Owns the current race and everything attached to it.
///
/// Dropping the controller closes the event stream and stops the judging
/// poll.
pub struct RaceController<A: RaceApi> {
    inner: Arc<Inner<A>>,
}

struct Inner<A: RaceApi> {
    api: A,
    session: Mutex<RaceSession>,
    updates: watch::Sender<RaceSession>,
    stream_task: Mutex<Option<JoinHandle<()>>>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
    poll_interval: Duration,
    /// Set once the controller is dropped; no task is spawned after that.
    closed: AtomicBool,
}

impl<A: RaceApi> RaceController<A> {
    /// Create a controller polling every three seconds while judging
    pub fn new(api: A) -> Self {
        Self::with_poll_interval(api, DEFAULT_JUDGING_POLL_INTERVAL)
    }

    /// Create a controller with a custom judging poll interval
    pub fn with_poll_interval(api: A, poll_interval: Duration) -> Self {
        let (updates, _) = watch::channel(RaceSession::default());
        Self {
            inner: Arc::new(Inner {
                api,
                session: Mutex::new(RaceSession::default()),
                updates,
                stream_task: Mutex::new(None),
                poll_task: Mutex::new(None),
                closed: AtomicBool::new(false),
                poll_interval,
            }),
        }
    }

    /// The backend this controller talks to
    pub fn api(&self) -> &A {
        &self.inner.api
    }

    /// Receive a copy of the session after every change
    pub fn subscribe(&self) -> watch::Receiver<RaceSession> {
        self.inner.updates.subscribe()
    }

    /// Copy of the current session
    pub fn snapshot(&self) -> RaceSession {
        self.inner.session.lock().clone()
    }

    /// Id of the current race, if any
    pub fn race_id(&self) -> Option<RaceId> {
        self.inner.session.lock().race_id().cloned()
    }

    /// Create a new race, replacing the current one.
    pub async fn create_race(&self) -> SdkResult<Race> {
        let generation = self.inner.reset_for_new_race(Action::Create);

        let result = self.inner.api.create_race().await;
        let race = self.inner.settle(generation, Action::Create, result, true, |s, race| {
            s.apply_snapshot(race.clone())
        })?;

        info!(race_id = %race.id, "race created");
        self.inner.sync_judging_poll(generation);
        Ok(race)
    }

    /// Load an existing race into a fresh session.
    pub async fn resume(&self, race_id: &RaceId) -> SdkResult<Race> {
        let generation = self.inner.reset_for_new_race(Action::Refresh);

        let result = self.inner.api.get_race(race_id).await;
        let race = self.inner.settle(generation, Action::Refresh, result, true, |s, race| {
            s.apply_snapshot(race.clone())
        })?;

        info!(race_id = %race.id, status = %race.status, "race resumed");
        self.inner.sync_judging_poll(generation);
        Ok(race)
    }

    /// Start the current race: the human side first, then the agent.
    ///
    /// The agent is only started once the human start succeeded. On success
    /// the agent's event stream is followed in the background.
    pub async fn start_race(&self) -> SdkResult<Race> {
        let (generation, race_id) = self.inner.begin(Action::Start)?;

        let result = self.inner.api.start_human(&race_id).await;
        self.inner.settle(generation, Action::Start, result, false, |s, race| {
            s.reveal_prompt();
            s.apply_snapshot(race.clone());
        })?;

        let result = self.inner.api.start_agent(&race_id).await;
        let start = self.inner.settle(generation, Action::Start, result, true, |s, start| {
            s.apply_snapshot(start.race.clone());
            s.set_run_id(start.run_id.clone());
        })?;

        info!(race_id = %race_id, run_id = %start.run_id, "agent started");
        self.inner.open_stream(generation, start.run_id);
        Ok(start.race)
    }

    /// Submit the human's answer; `None` for confirmation tasks.
    pub async fn submit_human(&self, submission: Option<String>) -> SdkResult<Race> {
        let (generation, race_id) = self.inner.begin(Action::Submit)?;

        let result = self.inner.api.submit_human(&race_id, submission).await;
        let race = self.inner.settle(generation, Action::Submit, result, true, |s, race| {
            s.apply_snapshot(race.clone())
        })?;

        self.inner.sync_judging_poll(generation);
        Ok(race)
    }

    /// Re-fetch the current race from the server.
    pub async fn refresh(&self) -> SdkResult<Race> {
        let generation = self.inner.session.lock().generation();
        self.inner.refresh(generation).await
    }

    /// Keep the text the human is composing
    pub fn set_submission_draft(&self, draft: impl Into<String>) {
        self.inner.update(|s| s.set_submission_draft(draft));
    }

    /// Close the event stream. Returns `false` if none was open.
    pub fn close_stream(&self) -> bool {
        self.inner.close_stream()
    }
}

impl<A: RaceApi> Drop for RaceController<A> {
    fn drop(&mut self) {
        self.inner.shutdown();
    }
}

impl<A: RaceApi> std::fmt::Debug for RaceController<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaceController")
            .field("session", &*self.inner.session.lock())
            .field("poll_interval", &self.inner.poll_interval)
            .finish_non_exhaustive()
    }
}

fn error_source(action: Action) -> ErrorSource {
    match action {
        Action::Refresh => ErrorSource::Refresh,
        Action::Create | Action::Start | Action::Submit => ErrorSource::Action,
    }
}

impl<A: RaceApi> Inner<A> {
    /// Mutate the session and publish the result. Never held across an await.
    fn update<R>(&self, f: impl FnOnce(&mut RaceSession) -> R) -> R {
        let mut session = self.session.lock();
        let out = f(&mut session);
        self.updates.send_replace(session.clone());
        out
    }

    fn reset_for_new_race(&self, action: Action) -> Generation {
        self.close_stream();
        self.stop_poll();
        self.update(|s| {
            let generation = s.begin_new_race();
            s.set_busy(action, true);
            generation
        })
    }

    /// Mark `action` busy on the current race and return what the request needs.
    fn begin(&self, action: Action) -> SdkResult<(Generation, RaceId)> {
        self.update(|s| {
            let race_id = s.require_race()?.id.clone();
            if s.busy().is_busy(action) {
                return Err(SdkError::InvalidState(format!(
                    "{:?} already in progress for race {}",
                    action, race_id
                )));
            }
            s.set_busy(action, true);
            Ok((s.generation(), race_id))
        })
    }

    /// Apply the outcome of a request issued under `generation`.
    ///
    /// Results for a replaced race are dropped as [`SdkError::Superseded`].
    /// Failures become the displayed error according to the action's
    /// policy. `finished` releases the busy flag on success; failures always
    /// release it.
    fn settle<T>(
        &self,
        generation: Generation,
        action: Action,
        result: SdkResult<T>,
        finished: bool,
        apply: impl FnOnce(&mut RaceSession, &T),
    ) -> SdkResult<T> {
        self.update(|s| {
            if !s.is_current(generation) {
                debug!(?action, generation = generation.value(), "discarding stale result");
                return Err(SdkError::Superseded);
            }
            match result {
                Ok(value) => {
                    apply(s, &value);
                    if finished {
                        s.set_busy(action, false);
                    }
                    Ok(value)
                }
                Err(err) => {
                    warn!(?action, "request failed: {}", err);
                    s.set_busy(action, false);
                    s.record_error(error_source(action), err.to_string());
                    Err(err)
                }
            }
        })
    }

    async fn refresh(self: &Arc<Self>, generation: Generation) -> SdkResult<Race> {
        let race_id = self.update(|s| {
            if !s.is_current(generation) {
                return Err(SdkError::Superseded);
            }
            let race_id = s.require_race()?.id.clone();
            s.set_busy(Action::Refresh, true);
            Ok(race_id)
        })?;

        let result = self.api.get_race(&race_id).await;
        let race = self.settle(generation, Action::Refresh, result, true, |s, race| {
            s.apply_snapshot(race.clone())
        })?;

        self.sync_judging_poll(generation);
        Ok(race)
    }

    // ===== Event stream =====

    fn open_stream(self: &Arc<Self>, generation: Generation, run_id: RunId) {
        self.close_stream();

        let mut slot = self.stream_task.lock();
        if self.is_closed() {
            return;
        }
        let opened = self.update(|s| {
            if !s.is_current(generation) {
                return false;
            }
            s.stream_opened(run_id.clone());
            true
        });
        if !opened {
            return;
        }

        debug!(run_id = %run_id, "opening event stream");
        let inner = Arc::clone(self);
        *slot = Some(tokio::spawn(async move {
            inner.follow_stream(generation, run_id).await;
        }));
    }

    /// Close an open stream. A task whose stream already ended keeps
    /// running so its reconciling refresh lands.
    fn close_stream(&self) -> bool {
        let mut slot = self.stream_task.lock();
        let closed = self.update(|s| s.stream_closed());
        if closed {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
            debug!("event stream closed");
        }
        closed
    }

    fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(handle) = self.stream_task.lock().take() {
            handle.abort();
        }
        self.update(|s| s.stream_closed());
        self.stop_poll();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn owns_stream(session: &RaceSession, generation: Generation, run_id: &RunId) -> bool {
        session.is_current(generation)
            && matches!(session.stream_state(), StreamState::Open(open) if open == run_id)
    }

    async fn follow_stream(self: Arc<Self>, generation: Generation, run_id: RunId) {
        let mut events = match self.api.open_events(&run_id).await {
            Ok(events) => events,
            Err(err) => {
                warn!(run_id = %run_id, "could not open event stream: {}", err);
                self.end_stream(generation, &run_id, true).await;
                return;
            }
        };

        while let Some(item) = events.next().await {
            let event = match item {
                Ok(event) => event,
                Err(err) => {
                    warn!(run_id = %run_id, "event stream failed: {}", err);
                    self.end_stream(generation, &run_id, true).await;
                    return;
                }
            };

            debug!(run_id = %run_id, kind = event.kind(), "stream event");
            let outcome = self.update(|s| {
                Self::owns_stream(s, generation, &run_id).then(|| s.apply_event(&event, Utc::now()))
            });

            match outcome {
                None => return,
                Some(EventOutcome::Completed) => {
                    info!(run_id = %run_id, "agent run complete");
                    self.end_stream(generation, &run_id, false).await;
                    return;
                }
                Some(EventOutcome::Applied | EventOutcome::Ignored) => {}
            }
        }

        warn!(run_id = %run_id, "event stream ended before completion");
        self.end_stream(generation, &run_id, true).await;
    }

    /// Close the stream this task owns and reconcile once. The refresh is
    /// marked busy in the same update so observers never see a gap.
    async fn end_stream(self: &Arc<Self>, generation: Generation, run_id: &RunId, interrupted: bool) {
        let closed = self.update(|s| {
            if !Self::owns_stream(s, generation, run_id) {
                return false;
            }
            s.stream_closed();
            s.set_busy(Action::Refresh, true);
            if interrupted {
                s.record_error(ErrorSource::StreamTransport, STREAM_INTERRUPTED_MESSAGE);
            }
            true
        });

        if closed {
            if let Err(err) = self.refresh(generation).await {
                debug!("reconciling refresh failed: {}", err);
            }
        }
    }

    // ===== Judging poll =====

    /// Start the poll if the race is judging and no poll is running.
    fn sync_judging_poll(self: &Arc<Self>, generation: Generation) {
        let needed = {
            let session = self.session.lock();
            session.is_current(generation) && session.needs_judging_poll()
        };
        if !needed {
            return;
        }

        let mut slot = self.poll_task.lock();
        if self.is_closed() || slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        debug!(interval = ?self.poll_interval, "race is judging, polling for verdict");
        let inner = Arc::clone(self);
        *slot = Some(tokio::spawn(async move {
            inner.poll_judging(generation).await;
        }));
    }

    async fn poll_judging(self: Arc<Self>, generation: Generation) {
        loop {
            tokio::time::sleep(self.poll_interval).await;

            let keep_polling = !self.is_closed() && {
                let session = self.session.lock();
                session.is_current(generation) && session.needs_judging_poll()
            };
            if !keep_polling {
                debug!("judging poll finished");
                return;
            }

            match self.refresh(generation).await {
                Err(SdkError::Superseded) => return,
                Err(err) => debug!("judging poll refresh failed: {}", err),
                Ok(_) => {}
            }
        }
    }

    fn stop_poll(&self) {
        if let Some(handle) = self.poll_task.lock().take() {
            handle.abort();
        }
    }
}

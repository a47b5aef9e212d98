//! Polling client state machine.
//!
//! A poller is a single tokio task that owns a [`PollState`] and changes it
//! only through [`Transition`]s. Every trigger (start, timer, manual refresh)
//! launches an independent fetch tagged with a fresh generation; a completion
//! older than the newest one already applied is dropped, so a slow response
//! can never overwrite a newer one.
//!
//! The state is published on a [`watch`] channel. Dropping the
//! [`PollerHandle`] (or calling [`PollerHandle::stop`]) ends the task, which
//! cancels the timer and aborts every fetch still in flight.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::client::ClientError;
use crate::flight::FlightRecord;

/// Message used when a fetch task dies without reporting an outcome.
const ABANDONED_MESSAGE: &str = "An unexpected error occurred. Please try again later.";

/// Something the poller can ask for the current flight record.
#[async_trait::async_trait]
pub trait FlightSource: Send + Sync {
    /// Fetch the current record.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] whose `Display` is shown to the user.
    async fn fetch(&self) -> Result<FlightRecord, ClientError>;
}

/// Coarse poller phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    /// Nothing has been requested yet.
    #[default]
    Idle,
    /// A fetch was started and nothing newer has completed.
    Loading,
    /// The most recent applied fetch succeeded.
    Success,
    /// The most recent applied fetch failed.
    Error,
}

/// What caused a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// First fetch after the poller starts.
    Initial,
    /// The refresh interval elapsed.
    Timer,
    /// The user asked for a refresh.
    Manual,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initial => write!(f, "initial"),
            Self::Timer => write!(f, "timer"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// Snapshot of everything the presentation layer shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollState {
    /// Current phase.
    pub phase: Phase,
    /// Last successfully fetched record. Kept across failures.
    pub flight: Option<FlightRecord>,
    /// Message of the last applied failure, cleared when a fetch starts.
    pub error: Option<String>,
    /// When the last successful fetch completed.
    pub last_updated: Option<DateTime<Utc>>,
    /// Number of successful fetches applied.
    pub refresh_count: u64,
    /// Generation of the most recently applied completion.
    pub applied_generation: u64,
    /// Fetches started but not yet finished.
    pub pending: usize,
}

/// A discrete change to [`PollState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// A fetch was launched.
    Started {
        /// Generation assigned to the fetch.
        generation: u64,
    },
    /// A fetch returned a record.
    Succeeded {
        /// Generation of the fetch.
        generation: u64,
        /// The record.
        flight: Box<FlightRecord>,
        /// Completion time.
        at: DateTime<Utc>,
    },
    /// A fetch failed.
    Failed {
        /// Generation of the fetch.
        generation: u64,
        /// User-facing message.
        message: String,
    },
    /// A fetch task ended without an outcome (panicked or was aborted).
    Abandoned {
        /// User-facing message.
        message: String,
    },
}

impl PollState {
    /// Apply `transition`, returning the next state.
    #[must_use]
    pub fn apply(self, transition: Transition) -> Self {
        match transition {
            Transition::Started { .. } => Self {
                phase: Phase::Loading,
                error: None,
                pending: self.pending + 1,
                ..self
            },
            Transition::Succeeded {
                generation,
                flight,
                at,
            } => {
                let next = self.finish_one();
                if next.is_stale(generation) {
                    return next;
                }
                Self {
                    phase: Phase::Success,
                    flight: Some(*flight),
                    error: None,
                    last_updated: Some(at),
                    refresh_count: next.refresh_count + 1,
                    applied_generation: generation,
                    ..next
                }
            }
            Transition::Failed {
                generation,
                message,
            } => {
                let next = self.finish_one();
                if next.is_stale(generation) {
                    return next;
                }
                Self {
                    phase: Phase::Error,
                    error: Some(message),
                    applied_generation: generation,
                    ..next
                }
            }
            Transition::Abandoned { message } => {
                let next = self.finish_one();
                if next.pending == 0 && next.phase == Phase::Loading {
                    Self {
                        phase: Phase::Error,
                        error: Some(message),
                        ..next
                    }
                } else {
                    next
                }
            }
        }
    }

    /// Whether any fetch is still in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.pending > 0
    }

    fn finish_one(self) -> Self {
        Self {
            pending: self.pending.saturating_sub(1),
            ..self
        }
    }

    fn is_stale(&self, generation: u64) -> bool {
        generation < self.applied_generation
    }
}

#[derive(Debug)]
enum Command {
    Refresh,
    Stop,
}

#[derive(Debug)]
struct FetchOutcome {
    generation: u64,
    result: Result<Box<FlightRecord>, ClientError>,
}

enum Event {
    Command(Option<Command>),
    Joined(Result<FetchOutcome, JoinError>),
    Tick,
}

/// Handle to a running poller.
///
/// Dropping the handle stops the poller.
#[derive(Debug)]
pub struct PollerHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<PollState>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Request an immediate fetch. Ignored once the poller has stopped.
    pub fn refresh(&self) {
        if self.commands.try_send(Command::Refresh).is_err() {
            debug!("Refresh dropped; poller busy or stopped");
        }
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> PollState {
        self.state.borrow().clone()
    }

    /// A receiver that observes every published state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.clone()
    }

    /// Stop the poller and wait for its task to finish.
    pub async fn stop(mut self) {
        if self.commands.send(Command::Stop).await.is_err() {
            debug!("Poller already stopped");
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!("Poller task ended abnormally: {e}");
                }
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Start polling `source` every `interval`, beginning immediately.
///
/// Must be called from within a tokio runtime.
pub fn spawn(source: Arc<dyn FlightSource>, interval: Duration) -> PollerHandle {
    let (commands_tx, commands_rx) = mpsc::channel(16);
    let (state_tx, state_rx) = watch::channel(PollState::default());

    let poller = Poller {
        source,
        fetches: JoinSet::new(),
        state: PollState::default(),
        state_tx,
        next_generation: 0,
    };
    let task = tokio::spawn(poller.run(interval, commands_rx));

    PollerHandle {
        commands: commands_tx,
        state: state_rx,
        task: Some(task),
    }
}

struct Poller {
    source: Arc<dyn FlightSource>,
    fetches: JoinSet<FetchOutcome>,
    state: PollState,
    state_tx: watch::Sender<PollState>,
    next_generation: u64,
}

impl Poller {
    async fn run(mut self, interval: Duration, mut commands: mpsc::Receiver<Command>) {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut started = false;

        info!(interval_secs = interval.as_secs(), "Poller started");

        loop {
            let event = tokio::select! {
                biased;
                command = commands.recv() => Event::Command(command),
                Some(joined) = self.fetches.join_next(), if !self.fetches.is_empty() => {
                    Event::Joined(joined)
                }
                _ = ticker.tick() => Event::Tick,
            };

            match event {
                Event::Command(Some(Command::Refresh)) => self.launch(Trigger::Manual),
                Event::Command(Some(Command::Stop) | None) => break,
                Event::Joined(joined) => self.complete(joined),
                Event::Tick => {
                    let trigger = if started {
                        Trigger::Timer
                    } else {
                        Trigger::Initial
                    };
                    started = true;
                    self.launch(trigger);
                }
            }
        }

        let in_flight = self.fetches.len();
        self.fetches.abort_all();
        info!(in_flight, "Poller stopped");
    }

    fn launch(&mut self, trigger: Trigger) {
        self.next_generation += 1;
        let generation = self.next_generation;
        debug!(generation, %trigger, "Fetching flight status");

        let source = Arc::clone(&self.source);
        self.fetches.spawn(async move {
            let result = source.fetch().await.map(Box::new);
            FetchOutcome { generation, result }
        });
        self.apply(Transition::Started { generation });
    }

    fn complete(&mut self, joined: Result<FetchOutcome, JoinError>) {
        let transition = match joined {
            Ok(FetchOutcome {
                generation,
                result: Ok(flight),
            }) => {
                debug!(generation, status = %flight.status(), "Fetch succeeded");
                Transition::Succeeded {
                    generation,
                    flight,
                    at: Utc::now(),
                }
            }
            Ok(FetchOutcome {
                generation,
                result: Err(e),
            }) => {
                warn!(generation, "Fetch failed: {e}");
                Transition::Failed {
                    generation,
                    message: e.user_message(),
                }
            }
            Err(e) => {
                warn!("Fetch task ended without a result: {e}");
                Transition::Abandoned {
                    message: ABANDONED_MESSAGE.to_string(),
                }
            }
        };

        if let Transition::Succeeded { generation, .. } | Transition::Failed { generation, .. } =
            &transition
        {
            if self.state.is_stale(*generation) {
                debug!(
                    generation,
                    applied = self.state.applied_generation,
                    "Discarding stale result"
                );
            }
        }
        self.apply(transition);
    }

    fn apply(&mut self, transition: Transition) {
        self.state = std::mem::take(&mut self.state).apply(transition);
        self.state_tx.send_replace(self.state.clone());
    }
}

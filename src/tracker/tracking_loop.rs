use std::{
    io::{ErrorKind, Write},
    time::Duration,
};

use anyhow::Result;
use chrono::NaiveDateTime;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, Lines},
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::{
    cli::render::{Console, SessionSummary, Summary},
    probe::{FocusProbe, FocusSnapshot},
    storage::{entities::Sample, ActivityStore},
    utils::{clock::Clock, time::local_second},
};

use super::{
    activity::ActivityKey,
    command::{Command, InvalidCommand, COMMAND_HELP},
    state::TrackerState,
};

/// Cadence and presentation settings of the loop.
#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    pub period: Duration,
    pub top_activities: usize,
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Quit,
    Interrupted,
}

enum WaitEvent {
    Deadline,
    Interrupted,
    Line(std::io::Result<Option<String>>),
}

/// Outcome of reading one line of input.
enum InputLine {
    Text(String),
    /// The line was consumed but isn't valid UTF-8.
    Undecodable,
    Closed,
}

/// Samples focus once per period, persists and aggregates the samples, and reacts to commands
/// typed in between ticks. It's the only owner of the store and of [TrackerState].
pub struct TrackingLoop<S, R, W> {
    probe: Box<dyn FocusProbe>,
    store: S,
    input: Lines<R>,
    input_open: bool,
    console: Console<W>,
    clock: Box<dyn Clock>,
    shutdown: CancellationToken,
    settings: LoopSettings,
    state: TrackerState,
    notice: Option<String>,
}

impl<S, R, W> TrackingLoop<S, R, W>
where
    S: ActivityStore,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(
        probe: Box<dyn FocusProbe>,
        store: S,
        input: R,
        console: Console<W>,
        clock: Box<dyn Clock>,
        shutdown: CancellationToken,
        settings: LoopSettings,
    ) -> Self {
        let state = TrackerState::new(clock.time(), clock.instant());
        Self {
            probe,
            store,
            input: input.lines(),
            input_open: true,
            console,
            clock,
            shutdown,
            settings,
            state,
            notice: None,
        }
    }

    /// Executes the loop until `q` or an interrupt. The store is closed on either path and the
    /// final state is handed back.
    pub async fn run(mut self) -> Result<(ExitReason, TrackerState)> {
        let reason = self.run_ticks().await;
        info!("Tracking loop finished {reason:?}");
        if let Err(e) = self.console.line("Tracking stopped.") {
            warn!("Failed to write to console {e:?}");
        }
        self.store.close()?;
        Ok((reason, self.state))
    }

    async fn run_ticks(&mut self) -> ExitReason {
        self.say("Activity tracking started.");
        self.say(COMMAND_HELP);

        loop {
            let deadline = self.clock.instant() + self.settings.period;
            self.tick().await;

            if let Some(reason) = self.wait_for_commands(deadline).await {
                return reason;
            }
        }
    }

    /// One pass of sample, persist, aggregate and render.
    #[instrument(level = "debug", skip(self))]
    pub async fn tick(&mut self) {
        let now = self.clock.instant();
        let wall_time = self.clock.time();

        match self.probe.sample().await {
            Ok(snapshot) => self.accept(snapshot, local_second(&wall_time), now),
            Err(e) => warn!("No usable sample this tick {e}"),
        }

        self.redraw();
    }

    fn accept(&mut self, snapshot: FocusSnapshot, timestamp: NaiveDateTime, now: Instant) {
        let sample = Sample::new(timestamp, snapshot, self.state.sessions.label());
        debug!("Collected sample {:?}", sample);

        if let Err(e) = self.store.append(&sample) {
            warn!("Failed to persist sample, it will be missing from the log {e}");
        }

        self.state.record(ActivityKey::from_sample(&sample), now);
    }

    /// Waits for input until `deadline`. Every line is handled as soon as it arrives, so the
    /// cadence only slips while a session name is being typed.
    async fn wait_for_commands(&mut self, deadline: Instant) -> Option<ExitReason> {
        loop {
            let event = tokio::select! {
                _ = self.shutdown.cancelled() => WaitEvent::Interrupted,
                _ = self.clock.sleep_until(deadline) => WaitEvent::Deadline,
                line = self.input.next_line(), if self.input_open => WaitEvent::Line(line),
            };

            match event {
                WaitEvent::Deadline => return None,
                WaitEvent::Interrupted => return Some(ExitReason::Interrupted),
                WaitEvent::Line(line) => {
                    match self.accept_input(line) {
                        InputLine::Text(line) => {
                            if let Some(reason) = self.handle_line(&line).await {
                                return Some(reason);
                            }
                        }
                        InputLine::Undecodable => {
                            self.notice = Some(InvalidCommand(String::new()).to_string());
                        }
                        InputLine::Closed => continue,
                    }
                    self.redraw();
                }
            }
        }
    }

    /// Unwraps a read from input. End of input or a read error stops listening for commands,
    /// while sampling goes on. A line that isn't UTF-8 has already been consumed, so reading
    /// continues after it.
    fn accept_input(&mut self, line: std::io::Result<Option<String>>) -> InputLine {
        match line {
            Ok(Some(line)) => InputLine::Text(line),
            Ok(None) => {
                info!("Input closed, commands are no longer accepted");
                self.input_open = false;
                InputLine::Closed
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                debug!("Rejected undecodable input {e}");
                InputLine::Undecodable
            }
            Err(e) => {
                warn!("Failed to read input {e:?}");
                self.input_open = false;
                InputLine::Closed
            }
        }
    }

    async fn handle_line(&mut self, line: &str) -> Option<ExitReason> {
        match line.parse::<Command>() {
            Ok(Command::Quit) => Some(ExitReason::Quit),
            Ok(Command::StopSession) => {
                let notice = match self.state.stop_session() {
                    Some(session) => {
                        info!("Stopped session {}", session.label);
                        format!("Session '{}' stopped.", session.label)
                    }
                    None => "No active session to stop.".to_string(),
                };
                self.notice = Some(notice);
                None
            }
            Ok(Command::NewSession) => self.prompt_session().await,
            Err(e) => {
                debug!("Rejected input {:?}", e.0);
                self.notice = Some(e.to_string());
                None
            }
        }
    }

    /// Blocks the cadence until a session name is entered.
    async fn prompt_session(&mut self) -> Option<ExitReason> {
        if !self.input_open {
            return None;
        }
        if let Err(e) = self.console.prompt("Enter new session name: ") {
            warn!("Failed to write to console {e:?}");
        }

        let line = tokio::select! {
            _ = self.shutdown.cancelled() => return Some(ExitReason::Interrupted),
            line = self.input.next_line() => line,
        };
        let label = match self.accept_input(line) {
            InputLine::Text(label) => label,
            InputLine::Undecodable => {
                self.notice = Some("Session name must be valid text.".into());
                return None;
            }
            InputLine::Closed => {
                self.notice = Some("No session name was entered.".into());
                return None;
            }
        };

        let now = self.clock.instant();
        let notice = match self.state.start_session(&label, self.clock.time(), now) {
            Ok(session) => {
                info!("Started session {}", session.label);
                format!("New session started: {}", session.label)
            }
            Err(e) => e.to_string(),
        };
        self.notice = Some(notice);
        None
    }

    fn redraw(&mut self) {
        let now = self.clock.instant();
        let activities = self.state.aggregate.top(self.settings.top_activities);
        let session = self
            .state
            .sessions
            .current()
            .map(|session| SessionSummary {
                label: &session.label,
                started_at: session.started_at,
                elapsed_seconds: session.elapsed(now).as_secs(),
            });
        let summary = Summary {
            tracking_seconds: self.state.elapsed(now).as_secs(),
            session,
            top_activities: self.settings.top_activities,
            activities: &activities,
            notice: self.notice.as_deref(),
        };
        if let Err(e) = self.console.redraw(&summary) {
            warn!("Failed to redraw console {e:?}");
        }
    }

    fn say(&mut self, text: &str) {
        if let Err(e) = self.console.line(text) {
            warn!("Failed to write to console {e:?}");
        }
    }
}

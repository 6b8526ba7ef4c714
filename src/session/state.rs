use std::{fmt::Display, num::NonZeroU64};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{error::SessionError, utils::time::format_hms};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Paused,
    Stopped,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Running => write!(f, "running"),
            SessionState::Paused => write!(f, "paused"),
            SessionState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Whether a run ends by itself after a number of seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Unbounded,
    Limited(NonZeroU64),
}

impl Mode {
    /// `0` means no limit.
    pub fn from_limit(seconds: u64) -> Self {
        NonZeroU64::new(seconds).map_or(Mode::Unbounded, Mode::Limited)
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Unbounded => write!(f, "no limit"),
            Mode::Limited(limit) => write!(f, "limit {}", format_hms(limit.get())),
        }
    }
}

/// Result of counting one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Counted,
    LimitReached,
}

/// A tracking run. Holds no usage data, only the lifecycle and the elapsed counter, so the
/// transitions can be reasoned about on their own.
#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    elapsed: u64,
    mode: Mode,
    selected_mode: Mode,
    last_sample: Option<DateTime<Utc>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Mode::Unbounded)
    }
}

impl Session {
    pub fn new(selected_mode: Mode) -> Self {
        Self {
            state: SessionState::Idle,
            elapsed: 0,
            mode: selected_mode,
            selected_mode,
            last_sample: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    /// The mode in effect for the current run.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn selected_mode(&self) -> Mode {
        self.selected_mode
    }

    pub fn last_sample(&self) -> Option<DateTime<Utc>> {
        self.last_sample
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    /// Sessions that were started and not yet stopped.
    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Running | SessionState::Paused)
    }

    /// Changes the mode used by the next start. A running session keeps its current mode.
    pub fn select_mode(&mut self, mode: Mode) {
        if self.is_running() {
            debug!("Mode {mode} will apply after the next start");
        }
        self.selected_mode = mode;
    }

    /// Returns whether the state changed. Starting a running session does nothing.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            return false;
        }
        self.mode = self.selected_mode;
        self.state = SessionState::Running;
        true
    }

    pub fn pause(&mut self) -> Result<(), SessionError> {
        self.expect(SessionState::Running, "pause")?;
        self.state = SessionState::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), SessionError> {
        self.expect(SessionState::Paused, "resume")?;
        self.start();
        Ok(())
    }

    /// Ends the run and returns the elapsed seconds it reached. The counter is reset afterwards.
    pub fn stop(&mut self) -> Result<u64, SessionError> {
        if !self.is_active() {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                operation: "stop",
            });
        }
        let elapsed = self.elapsed;
        self.elapsed = 0;
        self.last_sample = None;
        self.state = SessionState::Stopped;
        Ok(elapsed)
    }

    /// Counts one second sampled at `now`. The second that reaches the limit is still counted.
    pub fn record_tick(&mut self, now: DateTime<Utc>) -> Result<TickOutcome, SessionError> {
        self.expect(SessionState::Running, "tick")?;
        self.elapsed += 1;
        self.last_sample = Some(now);
        match self.mode {
            Mode::Limited(limit) if self.elapsed >= limit.get() => Ok(TickOutcome::LimitReached),
            Mode::Limited(_) | Mode::Unbounded => Ok(TickOutcome::Counted),
        }
    }

    fn expect(&self, state: SessionState, operation: &'static str) -> Result<(), SessionError> {
        if self.state == state {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                from: self.state,
                operation,
            })
        }
    }
}

//! Countdown state machine and the one-second tick loop that drives it.

use crate::event::AppEvent;
use crate::models::{CustomTimes, Mode, TimerProfile};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

const DEFAULT_WORK_MINS: u32 = 25;
const DEFAULT_BREAK_MINS: u32 = 5;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    #[error("Invalid Time: {0:?} is not a whole number of minutes")]
    InvalidDuration(String),
}

/// Lifecycle of a single countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerState {
    /// No session counting.
    #[default]
    Idle,
    /// Session counting down.
    Running,
    /// Session started but held by the user.
    Paused,
}

/// Result of advancing the countdown by one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Timer is idle or paused, nothing happened.
    Inactive,
    /// Still counting, with the remaining seconds.
    Counting(u32),
    /// The session reached zero.
    Complete,
}

/// Resolves a session length in minutes.
///
/// Custom values that are not a whole non-negative number are rejected.
pub fn resolve_minutes(
    profile: TimerProfile,
    mode: Mode,
    custom: &CustomTimes,
) -> Result<u32, TimerError> {
    if let Some(minutes) = profile.preset_minutes(mode) {
        return Ok(minutes);
    }
    let raw = custom.for_mode(mode);
    raw.trim()
        .parse::<u32>()
        .map_err(|_| TimerError::InvalidDuration(raw.to_string()))
}

/// Like [`resolve_minutes`], but unparseable custom values fall back to 25/5.
pub fn resolve_minutes_or_default(profile: TimerProfile, mode: Mode, custom: &CustomTimes) -> u32 {
    resolve_minutes(profile, mode, custom).unwrap_or(match mode {
        Mode::Work => DEFAULT_WORK_MINS,
        Mode::Break => DEFAULT_BREAK_MINS,
    })
}

/// The countdown itself. Owned and mutated only by the session controller.
#[derive(Debug, Clone, Default)]
pub struct TimerModel {
    state: TimerState,
    remaining_secs: u32,
    mode: Mode,
    pomodoro_count: u32,
    pub custom: CustomTimes,
}

impl TimerModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    /// True while a session is counting or paused.
    pub fn is_active(&self) -> bool {
        matches!(self.state, TimerState::Running | TimerState::Paused)
    }

    pub fn is_paused(&self) -> bool {
        self.state == TimerState::Paused
    }

    #[cfg(test)]
    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn pomodoro_count(&self) -> u32 {
        self.pomodoro_count
    }

    pub fn set_pomodoro_count(&mut self, count: u32) {
        self.pomodoro_count = count;
    }

    /// Starts a session for `mode` and returns its length in seconds.
    /// On error the model is left untouched.
    pub fn start(&mut self, profile: TimerProfile, mode: Mode) -> Result<u32, TimerError> {
        let minutes = resolve_minutes(profile, mode, &self.custom)?;
        let secs = minutes
            .checked_mul(60)
            .ok_or_else(|| TimerError::InvalidDuration(self.custom.for_mode(mode).to_string()))?;

        self.remaining_secs = secs;
        self.state = TimerState::Running;
        Ok(secs)
    }

    /// Flips between running and paused.
    /// Returns the new paused flag, or `None` when no session is active.
    pub fn toggle_pause(&mut self) -> Option<bool> {
        self.state = match self.state {
            TimerState::Idle => return None,
            TimerState::Running => TimerState::Paused,
            TimerState::Paused => TimerState::Running,
        };
        Some(self.is_paused())
    }

    /// Advances the countdown by one second. Never goes below zero.
    pub fn tick(&mut self) -> Tick {
        if self.state != TimerState::Running {
            return Tick::Inactive;
        }
        if self.remaining_secs == 0 {
            return Tick::Complete;
        }
        self.remaining_secs -= 1;
        if self.remaining_secs == 0 {
            Tick::Complete
        } else {
            Tick::Counting(self.remaining_secs)
        }
    }

    /// Abandons the active session and switches mode.
    /// Returns the new mode, or `None` when no session is active.
    pub fn skip(&mut self) -> Option<Mode> {
        if !self.is_active() {
            return None;
        }
        self.state = TimerState::Idle;
        Some(self.toggle_mode())
    }

    /// Ends a session that ran to zero and switches mode.
    pub fn complete(&mut self) -> Mode {
        self.state = TimerState::Idle;
        self.toggle_mode()
    }

    /// Counts a finished work session.
    pub fn record_pomodoro(&mut self) {
        self.pomodoro_count = self.pomodoro_count.saturating_add(1);
    }

    pub fn toggle_mode(&mut self) -> Mode {
        self.mode = self.mode.toggled();
        self.mode
    }

    /// Length in seconds of the next session in the current mode.
    pub fn next_duration(&self, profile: TimerProfile) -> u32 {
        resolve_minutes_or_default(profile, self.mode, &self.custom).saturating_mul(60)
    }
}

/// Formats time in MM:SS format.
pub fn format_time(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Handle to the clock thread.
///
/// Each restart begins a new tick phase. Ticks carry the generation they were
/// produced in, so ones already queued from an earlier phase can be dropped.
pub struct Ticker {
    control: Sender<u64>,
    generation: u64,
}

impl Ticker {
    /// Spawns a clock that sends one tick per second to `tx`.
    pub fn spawn(tx: Sender<AppEvent>) -> Self {
        Self::with_period(tx, TICK_PERIOD)
    }

    fn with_period(tx: Sender<AppEvent>, period: Duration) -> Self {
        let (control, rx) = mpsc::channel();
        thread::spawn(move || run_ticker(tx, rx, period));
        Self {
            control,
            generation: 0,
        }
    }

    /// Starts a fresh phase: the next tick arrives one full period from now.
    pub fn restart(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if self.control.send(self.generation).is_err() {
            tracing::warn!("ticker thread has stopped");
        }
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }
}

/// Sends one tick per `period` until either side hangs up.
fn run_ticker(tx: Sender<AppEvent>, control: Receiver<u64>, period: Duration) {
    let mut generation = 0;
    let mut next = Instant::now() + period;
    loop {
        let wait = next.saturating_duration_since(Instant::now());
        match control.recv_timeout(wait) {
            Ok(restarted) => {
                generation = restarted;
                next = Instant::now() + period;
            }
            Err(RecvTimeoutError::Timeout) => {
                if tx.send(AppEvent::Tick(generation)).is_err() {
                    tracing::debug!("tick receiver closed, stopping ticker");
                    break;
                }
                next += period;
            }
            Err(RecvTimeoutError::Disconnected) => {
                tracing::debug!("ticker handle dropped, stopping ticker");
                break;
            }
        }
    }
}

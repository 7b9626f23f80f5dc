//! Data models for the Pomomind application.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which kind of session the timer is counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Focused work session.
    #[default]
    Work,
    /// Break between work sessions.
    Break,
}

impl Mode {
    /// Returns the opposite mode.
    pub fn toggled(self) -> Self {
        match self {
            Self::Work => Self::Break,
            Self::Break => Self::Work,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Work => "Work",
            Self::Break => "Break",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The work/break duration pairing selected by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerProfile {
    /// 25 minutes of work, 5 minutes of break.
    #[default]
    Pomodoro,
    /// 50 minutes of work, 10 minutes of break.
    LongFocus,
    /// User-entered durations, see [`CustomTimes`].
    Custom,
}

impl TimerProfile {
    pub const ALL: [TimerProfile; 3] = [Self::Pomodoro, Self::LongFocus, Self::Custom];

    /// Maps a persisted `mode_index` to a profile. Unknown indices select Pomodoro.
    pub fn from_index(index: usize) -> Self {
        Self::ALL.get(index).copied().unwrap_or_default()
    }

    pub fn index(self) -> usize {
        match self {
            Self::Pomodoro => 0,
            Self::LongFocus => 1,
            Self::Custom => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pomodoro => "Pomodoro (25/5)",
            Self::LongFocus => "Long Focus (50/10)",
            Self::Custom => "Custom",
        }
    }

    /// Fixed minutes for the preset profiles, `None` for Custom.
    pub fn preset_minutes(self, mode: Mode) -> Option<u32> {
        match (self, mode) {
            (Self::Pomodoro, Mode::Work) => Some(25),
            (Self::Pomodoro, Mode::Break) => Some(5),
            (Self::LongFocus, Mode::Work) => Some(50),
            (Self::LongFocus, Mode::Break) => Some(10),
            (Self::Custom, _) => None,
        }
    }
}

/// Raw custom durations exactly as the user typed them.
///
/// Kept as text so that an unparseable entry can be reported when a session is
/// started explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomTimes {
    pub work: String,
    pub rest: String,
}

impl CustomTimes {
    pub fn for_mode(&self, mode: Mode) -> &str {
        match mode {
            Mode::Work => &self.work,
            Mode::Break => &self.rest,
        }
    }
}

impl Default for CustomTimes {
    fn default() -> Self {
        Self {
            work: default_work_time(),
            rest: default_break_time(),
        }
    }
}

/// Chat-completion backend behind the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenAi,
    Gemini,
}

impl Provider {
    /// Parses a user-facing provider name.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "gemini" => Some(Self::Gemini),
            _ => None,
        }
    }

    /// Chat model used for every request against this provider.
    pub fn model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-3.5-turbo",
            Self::Gemini => "gemini-pro",
        }
    }
}

/// Counters for the current day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyStats {
    /// Minutes of completed work sessions.
    pub focus_time: u32,
    pub pomodoros_completed: u32,
    pub tasks_completed: u32,
}

/// The flat settings document, merged from every component's own subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsDocument {
    pub api_key: String,
    pub model_type: Provider,
    pub base_url: Option<String>,
    pub daily_stats: DailyStats,
    pub tasks: Vec<String>,
    pub pomodoro_count: u32,
    pub work_time: String,
    pub break_time: String,
    pub mode_index: usize,
}

fn default_work_time() -> String {
    "25".to_string()
}

fn default_break_time() -> String {
    "5".to_string()
}

impl Default for SettingsDocument {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model_type: Provider::default(),
            base_url: None,
            daily_stats: DailyStats::default(),
            tasks: Vec::new(),
            pomodoro_count: 0,
            work_time: default_work_time(),
            break_time: default_break_time(),
            mode_index: 0,
        }
    }
}

//! Daily productivity counters.

use crate::models::{DailyStats, SettingsDocument};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsManager {
    daily: DailyStats,
}

impl StatsManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn daily(&self) -> DailyStats {
        self.daily
    }

    /// Records a finished work session of `minutes` length.
    pub fn record_work_completed(&mut self, minutes: u32) {
        self.daily.focus_time = self.daily.focus_time.saturating_add(minutes);
        self.daily.pomodoros_completed = self.daily.pomodoros_completed.saturating_add(1);
    }

    pub fn record_task_completed(&mut self) {
        self.daily.tasks_completed = self.daily.tasks_completed.saturating_add(1);
    }

    /// Human readable summary of today's counters.
    pub fn render(&self, current_task: &str) -> String {
        let current = if current_task.is_empty() {
            "None"
        } else {
            current_task
        };
        format!(
            "Today's Productivity Stats:\n\
             ---------------------------\n\
             Focus time: {} minutes\n\
             Pomodoros completed: {}\n\
             Tasks completed: {}\n\
             \n\
             Current task: {}\n",
            self.daily.focus_time,
            self.daily.pomodoros_completed,
            self.daily.tasks_completed,
            current
        )
    }

    pub fn export(&self, doc: &mut SettingsDocument) {
        doc.daily_stats = self.daily;
    }

    pub fn load(&mut self, doc: &SettingsDocument) {
        self.daily = doc.daily_stats;
    }
}

//! Ordered task list and the task currently in focus.

use crate::models::SettingsDocument;

const NO_TASKS: &str = "No tasks added yet.";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskManager {
    tasks: Vec<String>,
    /// Copy of the task in focus. Empty means no task is selected.
    pub current_task: String,
}

impl TaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> &[String] {
        &self.tasks
    }

    /// Appends a task. Blank descriptions are rejected.
    pub fn add(&mut self, description: &str) -> bool {
        if description.trim().is_empty() {
            return false;
        }
        self.tasks.push(description.to_string());
        true
    }

    /// Removes the first entry equal to `description`.
    pub fn complete(&mut self, description: &str) -> bool {
        if description.is_empty() {
            return false;
        }
        match self.tasks.iter().position(|task| task == description) {
            Some(index) => {
                self.tasks.remove(index);
                true
            }
            None => false,
        }
    }

    /// Numbered listing, one task per line.
    pub fn render(&self) -> String {
        if self.tasks.is_empty() {
            return NO_TASKS.to_string();
        }
        self.tasks
            .iter()
            .enumerate()
            .map(|(i, task)| format!("{}. {}\n", i + 1, task))
            .collect()
    }

    pub fn export(&self, doc: &mut SettingsDocument) {
        doc.tasks = self.tasks.clone();
    }

    pub fn load(&mut self, doc: &SettingsDocument) {
        self.tasks = doc.tasks.clone();
    }
}

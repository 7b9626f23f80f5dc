//! SQLite persistence for the flat settings document.
//!
//! Every top-level key of [`SettingsDocument`] is stored as its own row, with the
//! value JSON-encoded. Rows that fail to decode are skipped so the affected keys
//! fall back to their defaults.

use crate::models::SettingsDocument;
use directories::ProjectDirs;
use rusqlite::{params, Connection};
use serde_json::{Map, Value};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable overriding the database location.
pub const DB_PATH_ENV: &str = "POMOMIND_DB";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to create database directory")]
    DirectoryCreation,
    #[error("Settings document is not a key-value record")]
    NotARecord,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens the database at its configured location, creating it if needed.
    pub fn new() -> Result<Self, DatabaseError> {
        Self::open(&Self::db_path())
    }

    /// Opens (or creates) a database file at `path`.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|_| DatabaseError::DirectoryCreation)?;
        }

        let conn = Connection::open(path)?;
        Self::initialize_tables(&conn)?;
        tracing::debug!(path = %path.display(), "opened settings database");

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing).
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_tables(&conn)?;
        Ok(Self { conn })
    }

    fn initialize_tables(conn: &Connection) -> Result<(), DatabaseError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
        "#,
        )?;
        Ok(())
    }

    pub fn db_path() -> PathBuf {
        if let Some(path) = env::var_os(DB_PATH_ENV) {
            return PathBuf::from(path);
        }
        ProjectDirs::from("com", "pomomind", "Pomomind")
            .map(|dirs| dirs.data_dir().join("pomomind.db"))
            .unwrap_or_else(|| PathBuf::from("pomomind.db"))
    }

    /// Loads the settings document. Missing keys take their defaults.
    pub fn load_settings(&self) -> Result<SettingsDocument, DatabaseError> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM settings")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut record = Map::new();
        for row in rows {
            let (key, raw) = row?;
            match serde_json::from_str::<Value>(&raw) {
                Ok(value) => {
                    record.insert(key, value);
                }
                Err(e) => tracing::warn!(%key, error = %e, "ignoring unreadable setting"),
            }
        }

        let mut doc = SettingsDocument::default();
        for (key, value) in record {
            // Decode key by key so one bad value only resets that key.
            let single = Value::Object(Map::from_iter([(key.clone(), value)]));
            match serde_json::from_value::<SettingsDocument>(single) {
                Ok(partial) => merge_key(&mut doc, &key, partial),
                Err(e) => tracing::warn!(%key, error = %e, "ignoring invalid setting"),
            }
        }
        Ok(doc)
    }

    /// Replaces the stored settings with `doc`.
    pub fn save_settings(&mut self, doc: &SettingsDocument) -> Result<(), DatabaseError> {
        let Value::Object(record) = serde_json::to_value(doc)? else {
            return Err(DatabaseError::NotARecord);
        };

        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM settings", [])?;
        for (key, value) in &record {
            tx.execute(
                "INSERT INTO settings (key, value) VALUES (?, ?)",
                params![key, value.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn merge_key(doc: &mut SettingsDocument, key: &str, partial: SettingsDocument) {
    match key {
        "api_key" => doc.api_key = partial.api_key,
        "model_type" => doc.model_type = partial.model_type,
        "base_url" => doc.base_url = partial.base_url,
        "daily_stats" => doc.daily_stats = partial.daily_stats,
        "tasks" => doc.tasks = partial.tasks,
        "pomodoro_count" => doc.pomodoro_count = partial.pomodoro_count,
        "work_time" => doc.work_time = partial.work_time,
        "break_time" => doc.break_time = partial.break_time,
        "mode_index" => doc.mode_index = partial.mode_index,
        other => tracing::debug!(key = other, "ignoring unknown setting"),
    }
}

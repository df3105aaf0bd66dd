//! Logging service - auth event log stored in DuckDB
//!
//! Records what happened to accounts (logins, merges, deletions) in
//! logs.duckdb, separate from the account database. Entries carry the
//! username and federated id involved, never passwords or email addresses.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};
use duckdb::Connection;
use serde::{Deserialize, Serialize};

use crate::domain::FederatedId;
use crate::log_migrations::LOG_MIGRATIONS;
use crate::services::MigrationService;

/// Counter for generating unique IDs within the same millisecond
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique ID based on timestamp + counter
fn generate_id() -> u64 {
    // Lower 16 bits: counter (65536 unique IDs per millisecond)
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed) & 0xFFFF;
    ((now_ms() as u64) << 16) | counter
}

/// Get current unix timestamp in milliseconds
fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Detect the current platform
fn detect_platform() -> &'static str {
    if cfg!(target_os = "macos") {
        "macos"
    } else if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else {
        "unknown"
    }
}

/// An auth event to be recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub federated_id: Option<FederatedId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl LogEvent {
    /// Create a new log event with just an event name
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            username: None,
            federated_id: None,
            error_message: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_federated_id(mut self, federated_id: FederatedId) -> Self {
        self.federated_id = Some(federated_id);
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// A log entry as stored in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: i64,
    pub app_version: String,
    pub platform: String,
    pub event: String,
    pub username: Option<String>,
    pub federated_id: Option<FederatedId>,
    pub error_message: Option<String>,
}

const ENTRY_COLUMNS: &str =
    "id, timestamp, app_version, platform, event, username, federated_id, error_message";

fn row_to_entry(row: &duckdb::Row) -> duckdb::Result<LogEntry> {
    Ok(LogEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        app_version: row.get(2)?,
        platform: row.get(3)?,
        event: row.get(4)?,
        username: row.get(5)?,
        federated_id: row.get(6)?,
        error_message: row.get(7)?,
    })
}

/// Service for the auth event log
pub struct LoggingService {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
    app_version: String,
    platform: &'static str,
}

impl LoggingService {
    /// Open or create logs.duckdb in the data directory and run any pending
    /// migrations
    pub fn new(data_dir: &Path, app_version: impl Into<String>) -> Result<Self> {
        let db_path = data_dir.join("logs.duckdb");
        let conn = Connection::open(&db_path)?;
        Self::with_connection(conn, Some(db_path), app_version.into())
    }

    /// Event log kept in memory (tests and demos)
    pub fn in_memory(app_version: impl Into<String>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, None, app_version.into())
    }

    fn with_connection(conn: Connection, db_path: Option<PathBuf>, app_version: String) -> Result<Self> {
        MigrationService::new(&conn, LOG_MIGRATIONS).run_pending()?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            app_version,
            platform: detect_platform(),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))
    }

    /// Record an event
    ///
    /// The app version and platform are added from the service configuration.
    pub fn log(&self, event: LogEvent) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sys_logs (id, timestamp, app_version, platform,
                                   event, username, federated_id, error_message)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            duckdb::params![
                generate_id(),
                now_ms(),
                &self.app_version,
                self.platform,
                &event.event,
                &event.username,
                &event.federated_id,
                &event.error_message,
            ],
        )?;
        Ok(())
    }

    /// Record a simple event with just a name
    pub fn log_event(&self, event: &str) -> Result<()> {
        self.log(LogEvent::new(event))
    }

    /// Most recent entries, newest first
    pub fn get_recent(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_logs ORDER BY timestamp DESC, id DESC LIMIT ?",
            ENTRY_COLUMNS
        ))?;
        let entries = stmt
            .query_map([limit as i64], row_to_entry)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Most recent entries that carry an error, newest first
    pub fn get_errors(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_logs WHERE error_message IS NOT NULL
             ORDER BY timestamp DESC, id DESC LIMIT ?",
            ENTRY_COLUMNS
        ))?;
        let entries = stmt
            .query_map([limit as i64], row_to_entry)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Entries recorded for one account, newest first
    pub fn get_for_username(&self, username: &str, limit: usize) -> Result<Vec<LogEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_logs WHERE username = ?
             ORDER BY timestamp DESC, id DESC LIMIT ?",
            ENTRY_COLUMNS
        ))?;
        let entries = stmt
            .query_map(duckdb::params![username, limit as i64], row_to_entry)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Get the total number of log entries
    pub fn count(&self) -> Result<u64> {
        let conn = self.conn()?;
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM sys_logs", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete logs older than the specified timestamp (unix ms)
    pub fn delete_before(&self, timestamp_ms: i64) -> Result<u64> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM sys_logs WHERE timestamp < ?", [timestamp_ms])?;
        Ok(deleted as u64)
    }

    /// Path to the logs database, `None` when kept in memory
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }
}

//! DuckDB repository implementation

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use duckdb::{params, params_from_iter, Connection};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, FederatedId, Run};
use crate::migrations::MIGRATIONS;
use crate::ports::AccountRepository;
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

const ACCOUNT_COLUMNS: &str = "username, name, password, email, fb_uid";

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

/// Raw `users` row, before domain validation
struct AccountRow {
    username: String,
    name: String,
    password: String,
    email: String,
    fb_uid: u64,
}

impl AccountRow {
    fn from_row(row: &duckdb::Row) -> duckdb::Result<Self> {
        Ok(Self {
            username: row.get(0)?,
            name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            password: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            email: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            fb_uid: row.get::<_, Option<u64>>(4)?.unwrap_or(0),
        })
    }

    fn into_account(self) -> Result<Account> {
        Ok(Account::new(self.username)?
            .with_name(self.name)
            .with_password(self.password)
            .with_email(self.email)
            .with_federated_id(self.fb_uid))
    }
}

/// DuckDB repository implementation
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbRepository {
    /// Open (or create) the account database at `db_path`
    ///
    /// Includes retry logic with exponential backoff for file locking errors,
    /// which can occur when several processes of the site open the file at
    /// the same time.
    pub fn new(db_path: &Path) -> anyhow::Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        tracing::warn!(
                            delay_ms = delay.as_millis() as u64,
                            attempt = attempt + 1,
                            max = MAX_RETRIES,
                            error = %err_msg,
                            "database busy, retrying"
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }

        Err(last_error
            .map(anyhow::Error::from)
            .unwrap_or_else(|| anyhow::anyhow!("Failed to open database after {} retries", MAX_RETRIES)))
    }

    /// Open a private in-memory database (tests and demos)
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_in_memory_with_flags(config)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    fn try_open_connection(db_path: &Path) -> duckdb::Result<Connection> {
        // Extension autoloading stays off; nothing here needs one
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Connection::open_with_flags(db_path, config)
    }

    /// Path of the database file, `None` for in-memory databases
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }

    /// Run any pending migrations
    pub fn run_migrations(&self) -> anyhow::Result<MigrationResult> {
        let conn = self.conn()?;
        MigrationService::new(&conn, MIGRATIONS).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> anyhow::Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    fn query_one_account(&self, sql: &str, params: &[&dyn duckdb::ToSql]) -> Result<Option<Account>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query_map(params, AccountRow::from_row)?;
        let first = rows.next().transpose()?;
        first.map(AccountRow::into_account).transpose()
    }

    /// Number of stored accounts
    pub fn account_count(&self) -> Result<u64> {
        let conn = self.conn()?;
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Stored email hash for an account, as written by the last upsert
    pub fn stored_email_hash(&self, username: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        match conn.query_row(
            "SELECT email_hash FROM users WHERE username = ?",
            [username],
            |row| row.get::<_, Option<String>>(0),
        ) {
            Ok(hash) => Ok(hash),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // === Run operations ===

    pub fn insert_run(&self, run: &Run) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO runs (run_id, username, date, distance, route)
             VALUES (?, ?, CAST(? AS DATE), CAST(? AS DECIMAL(8, 2)), ?)",
            params![
                run.id.to_string(),
                run.username,
                run.date.format("%Y-%m-%d").to_string(),
                run.distance.to_string(),
                run.route,
            ],
        )?;
        Ok(())
    }
}

impl AccountRepository for DuckDbRepository {
    fn find_by_username(&self, username: &str) -> Result<Option<Account>> {
        let sql = format!("SELECT {} FROM users WHERE username = ?", ACCOUNT_COLUMNS);
        self.query_one_account(&sql, &[&username])
    }

    fn find_by_federated_id(&self, federated_id: FederatedId) -> Result<Option<Account>> {
        if federated_id == 0 {
            return Ok(None);
        }
        // Lowest username first in case the one-row-per-id invariant is broken
        let sql = format!(
            "SELECT {} FROM users WHERE fb_uid = ? ORDER BY username LIMIT 1",
            ACCOUNT_COLUMNS
        );
        self.query_one_account(&sql, &[&federated_id])
    }

    fn find_by_any_email_hash(&self, email_hashes: &[String]) -> Result<Option<Account>> {
        if email_hashes.is_empty() {
            return Ok(None);
        }

        let placeholders = vec!["?"; email_hashes.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM users WHERE email_hash IN ({}) ORDER BY username LIMIT 1",
            ACCOUNT_COLUMNS, placeholders
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params_from_iter(email_hashes.iter()), AccountRow::from_row)?;
        let first = rows.next().transpose()?;
        first.map(AccountRow::into_account).transpose()
    }

    fn upsert(&self, account: &Account) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (username, name, password, email, fb_uid, email_hash)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (username) DO UPDATE SET
                name = EXCLUDED.name,
                password = EXCLUDED.password,
                email = EXCLUDED.email,
                fb_uid = EXCLUDED.fb_uid,
                email_hash = EXCLUDED.email_hash",
            params![
                account.username(),
                account.name,
                account.password,
                account.email,
                account.federated_id.unwrap_or(0),
                account.email_hash(),
            ],
        )?;
        Ok(())
    }

    fn delete(&self, username: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM users WHERE username = ?", [username])?;
        Ok(())
    }

    fn recent_runs(&self, username: &str, limit: usize) -> Result<Vec<Run>> {
        let conn = self.conn()?;
        // date and distance are read as text and parsed here to keep exact decimals
        let mut stmt = conn.prepare(
            "SELECT run_id, username, date::VARCHAR, distance::VARCHAR, route
             FROM runs
             WHERE username = ?
             ORDER BY date DESC, run_id
             LIMIT ?",
        )?;

        let rows = stmt.query_map(params![username, limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;

        let mut runs = Vec::new();
        for row in rows {
            let (id, username, date, distance, route) = row?;
            runs.push(Run {
                id: Uuid::parse_str(&id).map_err(|e| Error::database(format!("bad run id {}: {}", id, e)))?,
                username,
                date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                    .map_err(|e| Error::database(format!("bad run date {}: {}", date, e)))?,
                distance: Decimal::from_str(&distance)
                    .map_err(|e| Error::database(format!("bad run distance {}: {}", distance, e)))?,
                route,
            });
        }
        Ok(runs)
    }
}

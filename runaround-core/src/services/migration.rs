//! Migration service - manages database schema migrations
//!
//! Migrations are SQL files embedded at compile time. Each migration is
//! tracked in the sys_migrations table to ensure idempotent execution.
//! The same runner serves the account database and the event log database,
//! each with its own migration list.

use anyhow::Result;
use duckdb::Connection;

/// Name of the migration that creates the bookkeeping table
const BOOTSTRAP_MIGRATION: &str = "000_migrations.sql";

/// Result of running migrations
#[derive(Debug)]
pub struct MigrationResult {
    /// Names of newly applied migrations
    pub applied: Vec<String>,
    /// Count of migrations that were already applied
    pub already_applied: usize,
}

/// Applies an ordered list of embedded migrations to one connection
pub struct MigrationService<'a> {
    conn: &'a Connection,
    migrations: &'static [(&'static str, &'static str)],
}

impl<'a> MigrationService<'a> {
    pub fn new(conn: &'a Connection, migrations: &'static [(&'static str, &'static str)]) -> Self {
        Self { conn, migrations }
    }

    /// Run all pending migrations
    ///
    /// Bootstraps sys_migrations on a fresh database, then applies every
    /// migration not yet recorded, in list order.
    pub fn run_pending(&self) -> Result<MigrationResult> {
        let mut applied = Vec::new();

        let bootstrapped = if !self.migrations_table_exists() {
            match self.migrations.iter().find(|(n, _)| *n == BOOTSTRAP_MIGRATION) {
                Some((name, sql)) => {
                    self.apply(name, sql)?;
                    applied.push(name.to_string());
                    true
                }
                None => anyhow::bail!("migration list has no {}", BOOTSTRAP_MIGRATION),
            }
        } else {
            false
        };

        let recorded = self.get_applied()?;
        let already_applied = recorded.len() - usize::from(bootstrapped);

        for (name, sql) in self.migrations.iter() {
            if recorded.iter().any(|r| r == name) {
                continue;
            }
            self.apply(name, sql)?;
            applied.push(name.to_string());
        }

        if !applied.is_empty() {
            tracing::debug!(count = applied.len(), "applied migrations");
        }

        Ok(MigrationResult {
            applied,
            already_applied,
        })
    }

    /// Get list of already applied migration names
    pub fn get_applied(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT migration_name FROM sys_migrations ORDER BY migration_name")?;
        let names = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut result = Vec::new();
        for name in names {
            result.push(name?);
        }
        Ok(result)
    }

    /// Get list of pending migration names
    pub fn get_pending(&self) -> Result<Vec<String>> {
        if !self.migrations_table_exists() {
            return Ok(self.migrations.iter().map(|(n, _)| n.to_string()).collect());
        }
        let applied = self.get_applied()?;
        Ok(self
            .migrations
            .iter()
            .filter(|(name, _)| !applied.iter().any(|a| a == name))
            .map(|(name, _)| name.to_string())
            .collect())
    }

    fn migrations_table_exists(&self) -> bool {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = 'sys_migrations'",
                [],
                |row| row.get::<_, i64>(0),
            )
            .map(|count| count > 0)
            .unwrap_or(false)
    }

    fn apply(&self, name: &str, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        self.conn.execute(
            "INSERT INTO sys_migrations (migration_name) VALUES (?)",
            [name],
        )?;
        Ok(())
    }
}

//! Configuration management
//!
//! Settings live in `settings.json` in the data directory:
//! ```json
//! {
//!   "auth": {
//!     "cookieName": "rb_current_user",
//!     "federatedUsernamePrefix": "FacebookUser_",
//!     "maxDisplayRuns": 25,
//!     "requirePasswordToDisconnect": true
//!   },
//!   "databaseFile": "runaround.duckdb"
//! }
//! ```
//! Keys this crate does not manage are preserved when saving.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_COOKIE_NAME: &str = "rb_current_user";
pub const DEFAULT_FEDERATED_USERNAME_PREFIX: &str = "FacebookUser_";
pub const DEFAULT_MAX_DISPLAY_RUNS: usize = 25;
pub const DEFAULT_DATABASE_FILE: &str = "runaround.duckdb";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    auth: AuthSettingsFile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    database_file: Option<String>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthSettingsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cookie_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    federated_username_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_display_runs: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    require_password_to_disconnect: Option<bool>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Settings used by `AccountService`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    /// Name of the session cookie holding the username
    pub cookie_name: String,
    /// Prefix of usernames generated for new federated accounts
    pub federated_username_prefix: String,
    /// Cap on the run list loaded for an account
    pub max_display_runs: usize,
    /// Reject disconnecting an account that has no local password
    pub require_password_to_disconnect: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            federated_username_prefix: DEFAULT_FEDERATED_USERNAME_PREFIX.to_string(),
            max_display_runs: DEFAULT_MAX_DISPLAY_RUNS,
            require_password_to_disconnect: true,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub auth: AuthSettings,
    pub database_file: String,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth: AuthSettings::default(),
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            _raw_settings: SettingsFile::default(),
        }
    }
}

impl Config {
    /// Load config from the data directory
    ///
    /// A missing settings file yields the defaults. Environment variables
    /// override the file:
    /// - RUNAROUND_COOKIE_NAME
    /// - RUNAROUND_MAX_DISPLAY_RUNS
    /// - RUNAROUND_DB_FILE
    pub fn load(data_dir: &Path) -> Result<Self> {
        let settings_path = data_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)
                .with_context(|| format!("reading {}", settings_path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", settings_path.display()))?
        } else {
            SettingsFile::default()
        };

        Self::from_raw(raw, |key| std::env::var(key).ok())
    }

    fn from_raw(raw: SettingsFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = AuthSettings::default();

        let cookie_name = env("RUNAROUND_COOKIE_NAME")
            .or_else(|| raw.auth.cookie_name.clone())
            .unwrap_or(defaults.cookie_name);
        if cookie_name.is_empty() || cookie_name.contains(['=', ';', ' ']) {
            anyhow::bail!("invalid cookie name '{}'", cookie_name);
        }

        let max_display_runs = match env("RUNAROUND_MAX_DISPLAY_RUNS") {
            Some(value) => value
                .parse()
                .with_context(|| format!("RUNAROUND_MAX_DISPLAY_RUNS is not a number: {}", value))?,
            None => raw.auth.max_display_runs.unwrap_or(defaults.max_display_runs),
        };

        let auth = AuthSettings {
            cookie_name,
            federated_username_prefix: raw
                .auth
                .federated_username_prefix
                .clone()
                .unwrap_or(defaults.federated_username_prefix),
            max_display_runs,
            require_password_to_disconnect: raw
                .auth
                .require_password_to_disconnect
                .unwrap_or(defaults.require_password_to_disconnect),
        };

        let database_file = env("RUNAROUND_DB_FILE")
            .or_else(|| raw.database_file.clone())
            .unwrap_or_else(|| DEFAULT_DATABASE_FILE.to_string());

        Ok(Self {
            auth,
            database_file,
            _raw_settings: raw,
        })
    }

    /// Save config to the data directory
    /// Preserves other settings that this crate doesn't manage
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let settings_path = data_dir.join("settings.json");

        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content).unwrap_or_default()
        } else {
            self._raw_settings.clone()
        };

        settings.auth.cookie_name = Some(self.auth.cookie_name.clone());
        settings.auth.federated_username_prefix = Some(self.auth.federated_username_prefix.clone());
        settings.auth.max_display_runs = Some(self.auth.max_display_runs);
        settings.auth.require_password_to_disconnect = Some(self.auth.require_password_to_disconnect);
        settings.database_file = Some(self.database_file.clone());

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }
}

//! Run Around Core - accounts and social login for The Run Around
//!
//! This crate implements the account logic following hexagonal architecture:
//!
//! - **domain**: Core entities (Account, Run) and the error type
//! - **ports**: Trait definitions for external dependencies (AccountRepository,
//!   CookieStore, SocialSessionProvider, FederatedRegistration)
//! - **services**: Business logic orchestration (AccountService)
//! - **adapters**: Concrete implementations (DuckDB, cookie jar, demo provider)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use adapters::duckdb::DuckDbRepository;
use config::Config;
use ports::{CookieStore, FederatedRegistration, SocialSessionProvider};
use services::{AccountService, LoggingService};

// Re-export commonly used types at crate root
pub use domain::result::{Error, LoginRejection};
pub use domain::{Account, FederatedId, Run};

/// Main context for Run Around operations
///
/// Holds what lives for the whole process: configuration, the account
/// database and the event log. Per-request state lives in the
/// `AccountService` built by [`RunAroundContext::account_service`].
pub struct RunAroundContext {
    pub config: Config,
    pub repository: Arc<DuckDbRepository>,
    pub logging: Arc<LoggingService>,
}

impl RunAroundContext {
    /// Open the data directory: settings, account database, event log
    pub fn new(data_dir: &Path) -> Result<Self> {
        let config = Config::load(data_dir)?;

        let repository = Arc::new(DuckDbRepository::new(&data_dir.join(&config.database_file))?);
        repository.ensure_schema()?;

        let logging = Arc::new(LoggingService::new(data_dir, env!("CARGO_PKG_VERSION"))?);

        tracing::debug!(data_dir = %data_dir.display(), "run around context ready");

        Ok(Self {
            config,
            repository,
            logging,
        })
    }

    /// Context with default settings and nothing on disk
    pub fn in_memory() -> Result<Self> {
        let repository = Arc::new(DuckDbRepository::open_in_memory()?);
        repository.ensure_schema()?;

        Ok(Self {
            config: Config::default(),
            repository,
            logging: Arc::new(LoggingService::in_memory(env!("CARGO_PKG_VERSION"))?),
        })
    }

    /// Account service for one request
    pub fn account_service(
        &self,
        cookies: Arc<dyn CookieStore>,
        session: Arc<dyn SocialSessionProvider>,
        registration: Arc<dyn FederatedRegistration>,
    ) -> AccountService {
        AccountService::new(self.repository.clone(), cookies, session, registration)
            .with_settings(self.config.auth.clone())
            .with_event_log(Arc::clone(&self.logging))
    }
}

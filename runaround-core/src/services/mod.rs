//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod account;
pub mod logging;
pub mod migration;

pub use account::AccountService;
pub use logging::{LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};

//! Repository port - account storage abstraction

use crate::domain::result::Result;
use crate::domain::{Account, FederatedId, Run};

/// Account storage
///
/// Lookups return `Ok(None)` on a miss; `Err` is reserved for storage
/// failures. Writes are unconditional, last writer wins.
pub trait AccountRepository: Send + Sync {
    /// Get account by username
    fn find_by_username(&self, username: &str) -> Result<Option<Account>>;

    /// Get the account linked to a federated id
    fn find_by_federated_id(&self, federated_id: FederatedId) -> Result<Option<Account>>;

    /// Get an account whose email hash is one of `email_hashes`
    ///
    /// When several accounts match, the one with the lowest username wins.
    fn find_by_any_email_hash(&self, email_hashes: &[String]) -> Result<Option<Account>>;

    /// Insert or update an account keyed by username
    fn upsert(&self, account: &Account) -> Result<()>;

    /// Delete an account by username
    fn delete(&self, username: &str) -> Result<()>;

    /// Most recent runs for an account, newest first, at most `limit`
    fn recent_runs(&self, username: &str, limit: usize) -> Result<Vec<Run>>;
}

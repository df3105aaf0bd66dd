//! Federated identity ports
//!
//! The social login provider is consumed through two narrow interfaces: the
//! session of the current visitor, and the registry of site accounts the
//! provider knows about (by email hash).

use std::collections::HashMap;

use serde::Serialize;

use crate::domain::result::Result;
use crate::domain::FederatedId;

/// Federated session of the current request
pub trait SocialSessionProvider: Send + Sync {
    /// Provider user logged in for this request, if any
    fn current_subject_id(&self) -> Option<FederatedId>;

    /// Expire the provider session so the visitor is not logged straight back in
    ///
    /// Fails when the session is already gone; callers treat this as best-effort.
    fn expire_session(&self) -> Result<()>;

    /// Email hashes of site accounts the provider associates with `subject`
    fn email_hashes_for(&self, subject: FederatedId) -> Result<Vec<String>>;

    /// Profile fields for `subject` (e.g. "name"); missing fields are omitted
    fn fields_for(&self, subject: FederatedId, fields: &[&str]) -> Result<HashMap<String, String>>;
}

/// An account announced to the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountRegistration {
    pub account_id: String,
    pub email_hash: String,
}

/// Registry of site accounts held by the provider
pub trait FederatedRegistration: Send + Sync {
    fn register(&self, accounts: &[AccountRegistration]) -> Result<()>;

    fn unregister(&self, email_hashes: &[String]) -> Result<()>;
}

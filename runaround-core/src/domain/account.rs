//! Account domain model

use std::fmt;

use super::email::email_hash;
use super::result::{Error, Result};
use super::run::Run;

/// Username that marks a logged-out cookie; no account may carry it
pub const RESERVED_USERNAME: &str = "unknown";

/// Identifier of a user on the federated (social login) provider
pub type FederatedId = u64;

/// A site account
///
/// An account can be reached through a local password, through a linked
/// federated identity, or both. Accounts created from a federated login never
/// get a password.
#[derive(Clone)]
pub struct Account {
    username: String,
    /// Display name, empty when unset
    pub name: String,
    /// Contact email, empty when unset
    pub email: String,
    /// Plaintext password, empty for federated-only accounts
    pub password: String,
    /// Linked federated identity
    pub federated_id: Option<FederatedId>,

    /// Most recent runs, loaded on demand by `AccountService::runs`
    pub(crate) runs: Option<Vec<Run>>,
}

impl Account {
    /// Create an account with the given username and no other data
    pub fn new(username: impl Into<String>) -> Result<Self> {
        let username = username.into();
        if username == RESERVED_USERNAME {
            return Err(Error::ReservedUsername);
        }
        if username.trim().is_empty() {
            return Err(Error::validation("username cannot be empty"));
        }

        Ok(Self {
            username,
            name: String::new(),
            email: String::new(),
            password: String::new(),
            federated_id: None,
            runs: None,
        })
    }

    /// Create a federated-only account for a provider user
    ///
    /// The username is derived from the federated id so the same provider
    /// user always maps to the same name.
    pub fn from_federated_id(prefix: &str, federated_id: FederatedId) -> Result<Self> {
        if federated_id == 0 {
            return Err(Error::validation("federated id must be non-zero"));
        }
        let mut account = Self::new(format!("{}{}", prefix, federated_id))?;
        account.federated_id = Some(federated_id);
        Ok(account)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Link a federated id; `0` means "not linked"
    pub fn with_federated_id(mut self, federated_id: FederatedId) -> Self {
        self.federated_id = (federated_id != 0).then_some(federated_id);
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// True if the account is linked to a federated identity
    pub fn is_federated(&self) -> bool {
        matches!(self.federated_id, Some(id) if id > 0)
    }

    /// True if the account can log in with a local password
    ///
    /// Accounts without a password cannot be disconnected from the federated
    /// provider, only deleted.
    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }

    /// Public hash of the account email, `None` when there is no email
    pub fn email_hash(&self) -> Option<String> {
        email_hash(&self.email)
    }

    /// Runs loaded so far, if any
    pub fn cached_runs(&self) -> Option<&[Run]> {
        self.runs.as_deref()
    }

    pub(crate) fn clear_runs(&mut self) {
        self.runs = None;
    }
}

impl PartialEq for Account {
    /// Accounts compare by stored attributes; the run cache is ignored
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username
            && self.name == other.name
            && self.email == other.email
            && self.password == other.password
            && self.federated_id == other.federated_id
    }
}

impl Eq for Account {}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("username", &self.username)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("has_password", &self.has_password())
            .field("federated_id", &self.federated_id)
            .finish_non_exhaustive()
    }
}

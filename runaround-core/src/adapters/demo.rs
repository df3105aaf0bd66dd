//! Demo social login provider
//!
//! In-process stand-ins for the social network, used by tests and local
//! demos. Both adapters record the calls they receive and can be told to
//! fail the way the real provider does when a session has expired.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::result::{Error, Result};
use crate::domain::FederatedId;
use crate::ports::{AccountRegistration, FederatedRegistration, SocialSessionProvider};

/// Failure switches for [`DemoSocialSession`]
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoSessionConfig {
    /// `expire_session` fails as if the session were already gone
    pub fail_expire: bool,
    /// `email_hashes_for` and `fields_for` fail
    pub fail_queries: bool,
}

#[derive(Debug, Default)]
struct SessionState {
    subject: Option<FederatedId>,
    email_hashes: HashMap<FederatedId, Vec<String>>,
    names: HashMap<FederatedId, String>,
    expire_calls: usize,
}

/// Federated session held in memory
#[derive(Debug, Default)]
pub struct DemoSocialSession {
    state: Mutex<SessionState>,
    config: DemoSessionConfig,
}

impl DemoSocialSession {
    /// A visitor with no federated session
    pub fn new() -> Self {
        Self::default()
    }

    /// A visitor logged in to the provider as `subject`
    pub fn logged_in(subject: FederatedId) -> Self {
        let session = Self::new();
        session.state().subject = Some(subject);
        session
    }

    pub fn with_config(mut self, config: DemoSessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Email hashes the provider reports for `subject`
    pub fn with_email_hashes(self, subject: FederatedId, hashes: Vec<String>) -> Self {
        self.state().email_hashes.insert(subject, hashes);
        self
    }

    /// Profile name the provider reports for `subject`
    pub fn with_name(self, subject: FederatedId, name: impl Into<String>) -> Self {
        self.state().names.insert(subject, name.into());
        self
    }

    /// Number of `expire_session` calls, failed ones included
    pub fn expire_calls(&self) -> usize {
        self.state().expire_calls
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SocialSessionProvider for DemoSocialSession {
    fn current_subject_id(&self) -> Option<FederatedId> {
        self.state().subject
    }

    fn expire_session(&self) -> Result<()> {
        let mut state = self.state();
        state.expire_calls += 1;
        if self.config.fail_expire {
            return Err(Error::session("session key is invalid or no longer valid"));
        }
        state.subject = None;
        Ok(())
    }

    fn email_hashes_for(&self, subject: FederatedId) -> Result<Vec<String>> {
        if self.config.fail_queries {
            return Err(Error::session("session expired"));
        }
        Ok(self.state().email_hashes.get(&subject).cloned().unwrap_or_default())
    }

    fn fields_for(&self, subject: FederatedId, fields: &[&str]) -> Result<HashMap<String, String>> {
        if self.config.fail_queries {
            return Err(Error::session("session expired"));
        }
        let state = self.state();
        let mut result = HashMap::new();
        if fields.contains(&"name") {
            if let Some(name) = state.names.get(&subject) {
                result.insert("name".to_string(), name.clone());
            }
        }
        Ok(result)
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    /// email hash -> account id
    accounts: BTreeMap<String, String>,
    register_calls: usize,
    unregistered: Vec<String>,
}

/// Provider-side account registry held in memory
#[derive(Debug, Default)]
pub struct DemoRegistration {
    state: Mutex<RegistryState>,
    fail: bool,
}

impl DemoRegistration {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry whose every call fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Account id registered under `email_hash`
    pub fn account_for(&self, email_hash: &str) -> Option<String> {
        self.state().accounts.get(email_hash).cloned()
    }

    pub fn register_calls(&self) -> usize {
        self.state().register_calls
    }

    /// Every hash passed to `unregister`, in call order
    pub fn unregistered(&self) -> Vec<String> {
        self.state().unregistered.clone()
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FederatedRegistration for DemoRegistration {
    fn register(&self, accounts: &[AccountRegistration]) -> Result<()> {
        let mut state = self.state();
        state.register_calls += 1;
        if self.fail {
            return Err(Error::registration("registerUsers failed"));
        }
        for account in accounts {
            state
                .accounts
                .insert(account.email_hash.clone(), account.account_id.clone());
        }
        Ok(())
    }

    fn unregister(&self, email_hashes: &[String]) -> Result<()> {
        let mut state = self.state();
        state.unregistered.extend(email_hashes.iter().cloned());
        if self.fail {
            return Err(Error::registration("unregisterUsers failed"));
        }
        for hash in email_hashes {
            state.accounts.remove(hash);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_expire() {
        let session = DemoSocialSession::logged_in(42);
        assert_eq!(session.current_subject_id(), Some(42));

        session.expire_session().unwrap();
        assert_eq!(session.current_subject_id(), None);
        assert_eq!(session.expire_calls(), 1);
    }

    #[test]
    fn test_failing_expire_keeps_session() {
        let session = DemoSocialSession::logged_in(42).with_config(DemoSessionConfig {
            fail_expire: true,
            ..Default::default()
        });
        assert!(matches!(session.expire_session(), Err(Error::Session(_))));
        assert_eq!(session.current_subject_id(), Some(42));
    }

    #[test]
    fn test_fields_only_returns_requested() {
        let session = DemoSocialSession::logged_in(7).with_name(7, "Pat Runner");
        assert_eq!(session.fields_for(7, &["name"]).unwrap()["name"], "Pat Runner");
        assert!(session.fields_for(7, &["pic"]).unwrap().is_empty());
        assert!(session.fields_for(8, &["name"]).unwrap().is_empty());
    }

    #[test]
    fn test_registry_round_trip() {
        let registry = DemoRegistration::new();
        registry
            .register(&[AccountRegistration {
                account_id: "alice".to_string(),
                email_hash: "h1".to_string(),
            }])
            .unwrap();
        assert_eq!(registry.account_for("h1").as_deref(), Some("alice"));

        registry.unregister(&["h1".to_string()]).unwrap();
        assert_eq!(registry.account_for("h1"), None);
        assert_eq!(registry.unregistered(), vec!["h1".to_string()]);
    }
}

//! Account service - who is logged in, and account lifecycle
//!
//! A visitor can be identified two ways: the site's own cookie holding a
//! username, or a federated (social login) session. Being logged in to the
//! provider is enough to be logged in here, so the federated session always
//! wins. When both are present and point at different accounts, the accounts
//! are merged into the cookie's account.
//!
//! One service is built per request. Its username lookup cache lives exactly
//! as long as the service.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::AuthSettings;
use crate::domain::result::{Error, LoginRejection, Result};
use crate::domain::{Account, FederatedId, Run, RESERVED_USERNAME};
use crate::ports::{
    AccountRegistration, AccountRepository, CookieStore, FederatedRegistration,
    SocialSessionProvider,
};
use crate::services::logging::{LogEvent, LoggingService};

/// Request-scoped account resolution and lifecycle operations
pub struct AccountService {
    repository: Arc<dyn AccountRepository>,
    cookies: Arc<dyn CookieStore>,
    session: Arc<dyn SocialSessionProvider>,
    registration: Arc<dyn FederatedRegistration>,
    settings: AuthSettings,
    events: Option<Arc<LoggingService>>,
    /// username -> lookup result (misses included) for this request
    by_username: Mutex<HashMap<String, Option<Account>>>,
}

impl AccountService {
    pub fn new(
        repository: Arc<dyn AccountRepository>,
        cookies: Arc<dyn CookieStore>,
        session: Arc<dyn SocialSessionProvider>,
        registration: Arc<dyn FederatedRegistration>,
    ) -> Self {
        Self {
            repository,
            cookies,
            session,
            registration,
            settings: AuthSettings::default(),
            events: None,
            by_username: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_settings(mut self, settings: AuthSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Record auth events in `events`
    pub fn with_event_log(mut self, events: Arc<LoggingService>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    // === Resolution ===

    /// Figure out which account the current request belongs to
    ///
    /// Precedence:
    /// 1. A federated session with a native cookie: the cookie's account is
    ///    logged out natively and linked to the federated identity (any other
    ///    account holding that identity is deleted), then returned.
    /// 2. A federated session alone: the linked account, else a local account
    ///    adopted by email hash, else a newly created federated-only account.
    /// 3. A native cookie alone: its account.
    ///
    /// Storage and provider failures degrade to `None` and are logged.
    #[tracing::instrument(skip_all)]
    pub fn resolve_current_user(&self) -> Option<Account> {
        let native = self.native_account();

        let Some(subject) = self.session.current_subject_id().filter(|id| *id != 0) else {
            return native;
        };

        let federated = self.repository.find_by_federated_id(subject).unwrap_or_else(|e| {
            tracing::warn!(federated_id = subject, error = %e, "federated account lookup failed");
            None
        });

        if let Some(mut native) = native {
            self.merge(&mut native, subject);
            return Some(native);
        }

        if federated.is_some() {
            return federated;
        }

        self.adopt_or_create(subject)
    }

    /// Account named by the session cookie, if any
    pub fn native_account(&self) -> Option<Account> {
        let username = self.cookies.get(&self.settings.cookie_name)?;
        if username.is_empty() || username == RESERVED_USERNAME {
            return None;
        }
        self.find_by_username(&username)
    }

    /// Look up an account by username, at most once per request
    ///
    /// Misses are cached too; failures are not.
    pub fn find_by_username(&self, username: &str) -> Option<Account> {
        if let Some(cached) = self.cache().get(username) {
            return cached.clone();
        }

        match self.repository.find_by_username(username) {
            Ok(account) => {
                if account.is_none() {
                    tracing::debug!(username, "no account for username");
                }
                self.cache().insert(username.to_string(), account.clone());
                account
            }
            Err(e) => {
                tracing::warn!(username, error = %e, "account lookup failed");
                None
            }
        }
    }

    fn merge(&self, native: &mut Account, subject: FederatedId) {
        tracing::info!(
            username = native.username(),
            federated_id = subject,
            "linking native login to federated session"
        );

        // The federated session becomes the only way in for this visit, so a
        // later logout really logs the visitor out
        self.logout(native);

        match self.connect_with_federated_id(native, subject) {
            Ok(()) => self.record(
                LogEvent::new("account_merged")
                    .with_username(native.username())
                    .with_federated_id(subject),
            ),
            Err(e) => {
                tracing::warn!(username = native.username(), error = %e, "account merge failed");
                self.record(
                    LogEvent::new("account_merge_failed")
                        .with_username(native.username())
                        .with_federated_id(subject)
                        .with_error(e.to_string()),
                );
            }
        }
    }

    fn adopt_or_create(&self, subject: FederatedId) -> Option<Account> {
        // The provider knows the email hashes of site accounts registered
        // with it; a match means this visitor already has an account here
        let hashes = self.session.email_hashes_for(subject).unwrap_or_else(|e| {
            tracing::debug!(federated_id = subject, error = %e, "email hash query failed, treating as none");
            Vec::new()
        });

        let adopted = self.repository.find_by_any_email_hash(&hashes).unwrap_or_else(|e| {
            tracing::warn!(federated_id = subject, error = %e, "email hash lookup failed");
            None
        });

        let (mut account, event) = match adopted {
            Some(account) => (account, "account_adopted"),
            None => match self.new_federated_account(subject) {
                Ok(account) => account,
                Err(e) => {
                    tracing::warn!(federated_id = subject, error = %e, "cannot build federated account");
                    return None;
                }
            },
        };
        account.federated_id = Some(subject);

        if let Err(e) = self.save(&account) {
            self.record(
                LogEvent::new("account_create_failed")
                    .with_username(account.username())
                    .with_federated_id(subject)
                    .with_error(e.to_string()),
            );
            return None;
        }

        tracing::info!(username = account.username(), federated_id = subject, event, "resolved federated login");
        self.record(
            LogEvent::new(event)
                .with_username(account.username())
                .with_federated_id(subject),
        );
        Some(account)
    }

    /// Fresh federated-only account, or the existing row that already
    /// carries the generated username
    fn new_federated_account(&self, subject: FederatedId) -> Result<(Account, &'static str)> {
        let account = Account::from_federated_id(&self.settings.federated_username_prefix, subject)?;
        match self.find_by_username(account.username()) {
            Some(existing) => Ok((existing, "account_adopted")),
            None => Ok((account, "account_created")),
        }
    }

    // === Login ===

    /// Log in natively by setting the session cookie
    ///
    /// With `password`, it must match the stored password exactly. Federated
    /// accounts with an active federated session are already logged in and
    /// get no cookie.
    pub fn login(&self, account: &Account, password: Option<&str>) -> Result<()> {
        if account.is_federated() && self.session.current_subject_id().is_some() {
            return Err(self.reject_login(account, LoginRejection::FederatedSession));
        }

        if let Some(password) = password {
            if password.as_bytes() != account.password.as_bytes() {
                return Err(self.reject_login(account, LoginRejection::PasswordMismatch));
            }
        }

        self.cookies.set(&self.settings.cookie_name, account.username());
        self.record(LogEvent::new("login_succeeded").with_username(account.username()));
        Ok(())
    }

    fn reject_login(&self, account: &Account, reason: LoginRejection) -> Error {
        tracing::info!(username = account.username(), %reason, "login rejected");
        self.record(
            LogEvent::new("login_rejected")
                .with_username(account.username())
                .with_error(reason.to_string()),
        );
        Error::LoginRejected(reason)
    }

    /// Log out: clear the session cookie and, for federated accounts, expire
    /// the federated session so the visitor is not logged straight back in
    pub fn logout(&self, account: &Account) {
        self.cookies.set(&self.settings.cookie_name, RESERVED_USERNAME);

        if account.is_federated() {
            // Usually means the session had already expired
            if let Err(e) = self.session.expire_session() {
                tracing::debug!(username = account.username(), error = %e, "ignoring federated session expiry failure");
            }
        }

        self.record(LogEvent::new("logout").with_username(account.username()));
    }

    // === Federated linking ===

    /// Link `account` to a federated identity
    ///
    /// A different account already linked to `federated_id` is deleted first.
    /// If that delete fails, `account` is left unlinked and untouched so no
    /// two rows ever share the id.
    pub fn connect_with_federated_id(&self, account: &mut Account, federated_id: FederatedId) -> Result<()> {
        if federated_id == 0 {
            return Err(Error::validation("federated id must be non-zero"));
        }

        if let Some(mut holder) = self.repository.find_by_federated_id(federated_id)? {
            if holder.username() != account.username() {
                tracing::info!(
                    deleted = holder.username(),
                    kept = account.username(),
                    federated_id,
                    "deleting duplicate federated account"
                );
                self.delete(&mut holder)?;
            }
        }

        account.federated_id = Some(federated_id);
        self.save(account)
    }

    /// Remove the federated link, leaving a password-only account
    ///
    /// Accounts without a password are rejected: they would have no way to
    /// log in afterwards and can only be deleted.
    pub fn disconnect_federated(&self, account: &mut Account) -> Result<()> {
        if self.settings.require_password_to_disconnect && !account.has_password() {
            return Err(Error::validation(format!(
                "account '{}' has no password and cannot be disconnected",
                account.username()
            )));
        }

        if let Some(hash) = account.email_hash() {
            if let Err(e) = self.registration.unregister(&[hash]) {
                tracing::warn!(username = account.username(), error = %e, "failed to unregister email hash");
            }
        }

        let previous = account.federated_id.take();
        if let Err(e) = self.save(account) {
            account.federated_id = previous;
            return Err(e);
        }

        self.record(LogEvent::new("federated_disconnected").with_username(account.username()));
        Ok(())
    }

    // === Persistence ===

    /// Insert or update the account row
    pub fn save(&self, account: &Account) -> Result<()> {
        if let Err(e) = self.repository.upsert(account) {
            tracing::warn!(username = account.username(), error = %e, "failed to save account");
            return Err(e);
        }
        self.cache().insert(account.username().to_string(), Some(account.clone()));
        Ok(())
    }

    /// Save, then announce the account's email hash to the provider so a
    /// later federated login can find it
    pub fn save_and_register(&self, account: &Account) -> Result<()> {
        self.save(account)?;

        let Some(email_hash) = account.email_hash() else {
            return Ok(());
        };
        self.registration.register(&[AccountRegistration {
            account_id: account.username().to_string(),
            email_hash,
        }])
    }

    /// Delete the account row, then unregister its email hash (best-effort)
    pub fn delete(&self, account: &mut Account) -> Result<()> {
        if let Err(e) = self.repository.delete(account.username()) {
            tracing::warn!(username = account.username(), error = %e, "could not delete account");
            self.record(
                LogEvent::new("account_delete_failed")
                    .with_username(account.username())
                    .with_error(e.to_string()),
            );
            return Err(e);
        }

        account.clear_runs();
        self.cache().insert(account.username().to_string(), None);

        if let Some(hash) = account.email_hash() {
            if let Err(e) = self.registration.unregister(&[hash]) {
                tracing::warn!(username = account.username(), error = %e, "failed to unregister email hash");
            }
        }

        self.record(LogEvent::new("account_deleted").with_username(account.username()));
        Ok(())
    }

    // === Presentation ===

    /// Name to show for the account
    ///
    /// Federated accounts show their provider profile name when the provider
    /// returns one.
    pub fn display_name(&self, account: &Account) -> String {
        if let Some(federated_id) = account.federated_id.filter(|id| *id != 0) {
            match self.session.fields_for(federated_id, &["name"]) {
                Ok(fields) => {
                    if let Some(name) = fields.get("name").filter(|n| !n.is_empty()) {
                        return name.clone();
                    }
                }
                Err(e) => {
                    tracing::debug!(federated_id, error = %e, "profile name unavailable");
                }
            }
        }
        account.name.clone()
    }

    /// Most recent runs of the account, newest first
    ///
    /// Loaded once and kept on the account.
    pub fn runs<'a>(&self, account: &'a mut Account) -> Result<&'a [Run]> {
        if account.runs.is_none() {
            let runs = self
                .repository
                .recent_runs(account.username(), self.settings.max_display_runs)?;
            account.runs = Some(runs);
        }
        Ok(account.runs.as_deref().unwrap_or(&[]))
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<String, Option<Account>>> {
        self.by_username.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, event: LogEvent) {
        if let Some(events) = &self.events {
            if let Err(e) = events.log(event) {
                tracing::warn!(error = %e, "failed to record auth event");
            }
        }
    }
}

//! Result and error types for the core library

use std::fmt;

use thiserror::Error;

use super::account::RESERVED_USERNAME;

/// Why a login attempt was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginRejection {
    /// The account is federated and the federated session already logs it in
    FederatedSession,
    /// A password was supplied and did not match the stored one
    PasswordMismatch,
}

impl fmt::Display for LoginRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginRejection::FederatedSession => f.write_str("already logged in via federated session"),
            LoginRejection::PasswordMismatch => f.write_str("password mismatch"),
        }
    }
}

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Cannot create an account named '{}'", RESERVED_USERNAME)]
    ReservedUsername,

    #[error("Login rejected: {0}")]
    LoginRejected(LoginRejection),

    #[error("Federated session error: {0}")]
    Session(String),

    #[error("Federated registration error: {0}")]
    Registration(String),
}

impl Error {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a federated session error
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }

    /// Create a federated registration error
    pub fn registration(msg: impl Into<String>) -> Self {
        Self::Registration(msg.into())
    }
}

impl From<duckdb::Error> for Error {
    fn from(err: duckdb::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

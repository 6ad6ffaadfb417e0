//! Error taxonomy for the credential core.
//!
//! Every outcome of the gate is a typed value. Rejection reasons are kept
//! apart from [`AuthError`] because they are diagnostics only: callers see
//! a single uniform challenge no matter which one applied.

use std::fmt;

/// Failures surfaced to callers of the gate.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Empty username or password (or an unusable request body).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("username is already registered")]
    DuplicateUsername,

    /// Infrastructure fault. Never retried here; the transport decides.
    #[error("credential storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Hash generation or the hashing worker failed.
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Failures reported by a [`CredentialStore`](super::store::CredentialStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("username is already registered")]
    DuplicateUsername,

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUsername => Self::DuplicateUsername,
            StoreError::Unavailable(msg) => Self::StorageUnavailable(msg),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(err: r2d2::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Why a request ended up `Rejected`. Logged, never sent to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// No `Authorization` header, or one that is not well-formed Basic.
    MissingCredentials,
    /// Unknown username or wrong password.
    InvalidCredentials,
    /// The stored hash could not be parsed at all.
    CorruptCredential,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingCredentials => "missing_credentials",
            Self::InvalidCredentials => "invalid_credentials",
            Self::CorruptCredential => "corrupt_credential",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

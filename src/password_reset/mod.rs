//! Password reset token lifecycle.
//!
//! A reset request stores an Argon2 hash of a random secret keyed by email and
//! hands the plaintext to a [`Notifier`]. Submitting the secret within
//! [`TOKEN_TTL_MINUTES`] consumes the row and replaces the password. The
//! collaborators are traits so the lifecycle can run against Postgres in
//! production and in-memory fakes in tests.

pub mod postgres;
mod service;

#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;

use crate::models::{PasswordResetToken, User};

pub use service::PasswordResetService;

pub const TOKEN_TTL_MINUTES: i64 = 60;

#[derive(Debug)]
pub struct StoreError {
    pub message: String,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError {
            message: err.to_string(),
        }
    }
}

impl From<String> for StoreError {
    fn from(message: String) -> Self {
        StoreError { message }
    }
}

/// Account lookup and password replacement.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn update_password(&self, user: &User, password_hash: &str) -> Result<(), StoreError>;
}

/// Persistence for [`PasswordResetToken`] rows, at most one per email.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<PasswordResetToken>, StoreError>;
    async fn delete_by_email(&self, email: &str) -> Result<(), StoreError>;
    /// Insert `token`, replacing any row for the same email.
    async fn insert(&self, token: &PasswordResetToken) -> Result<(), StoreError>;
    /// Atomically delete the row for `email` if it still holds `token_hash`.
    async fn delete_if_matches(&self, email: &str, token_hash: &str) -> Result<bool, StoreError>;
}

/// Delivers the plaintext reset secret to the account owner.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_reset_link(&self, user: &User, token: &str) -> Result<(), String>;
}

#[derive(Debug, PartialEq)]
pub enum ResetError {
    UserNotFound,
    /// No pending token, or the secret does not match. Deliberately one case.
    InvalidToken,
    TokenExpired,
    NotifierFailure(String),
    StorageFailure(String),
    Hashing(String),
}

impl std::fmt::Display for ResetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResetError::UserNotFound => write!(f, "User not found"),
            ResetError::InvalidToken => write!(f, "Invalid token"),
            ResetError::TokenExpired => write!(f, "Token expired"),
            ResetError::NotifierFailure(msg) => write!(f, "Failed to send reset link: {msg}"),
            ResetError::StorageFailure(msg) => write!(f, "Storage failure: {msg}"),
            ResetError::Hashing(msg) => write!(f, "Hashing failure: {msg}"),
        }
    }
}

impl std::error::Error for ResetError {}

impl From<StoreError> for ResetError {
    fn from(err: StoreError) -> Self {
        ResetError::StorageFailure(err.message)
    }
}

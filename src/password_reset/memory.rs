//! In-memory collaborators for exercising the reset lifecycle in tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::{Notifier, StoreError, TokenStore, UserDirectory};
use crate::auth::password;
use crate::models::{PasswordResetToken, User};

pub struct MemoryTokenStore {
    rows: DashMap<String, PasswordResetToken>,
    fail_next: AtomicBool,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
            fail_next: AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn get(&self, email: &str) -> Option<PasswordResetToken> {
        self.rows.get(email).map(|r| r.value().clone())
    }

    pub fn backdate(&self, email: &str, created_at: DateTime<Utc>) {
        if let Some(mut row) = self.rows.get_mut(email) {
            row.created_at = created_at;
        }
    }

    /// Make the next store call fail.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StoreError::from("connection reset".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<PasswordResetToken>, StoreError> {
        self.check()?;
        Ok(self.get(email))
    }

    async fn delete_by_email(&self, email: &str) -> Result<(), StoreError> {
        self.check()?;
        self.rows.remove(email);
        Ok(())
    }

    async fn insert(&self, token: &PasswordResetToken) -> Result<(), StoreError> {
        self.check()?;
        self.rows.insert(token.email.clone(), token.clone());
        Ok(())
    }

    async fn delete_if_matches(&self, email: &str, token_hash: &str) -> Result<bool, StoreError> {
        self.check()?;
        Ok(self
            .rows
            .remove_if(email, |_, row| row.token_hash == token_hash)
            .is_some())
    }
}

pub struct MemoryUserDirectory {
    users: DashMap<String, User>,
}

impl MemoryUserDirectory {
    pub fn with_user(name: &str, email: &str, plain_password: &str) -> Self {
        let users = DashMap::new();
        let now = Utc::now();
        users.insert(
            email.to_string(),
            User {
                id: Uuid::now_v7(),
                name: name.to_string(),
                email: email.to_string(),
                password_hash: password::hash(plain_password).expect("hash"),
                created_at: now,
                updated_at: now,
            },
        );
        Self { users }
    }

    pub fn remove(&self, email: &str) {
        self.users.remove(email);
    }

    pub fn password_matches(&self, email: &str, plain_password: &str) -> bool {
        self.users
            .get(email)
            .map(|u| password::verify(plain_password, &u.password_hash).unwrap_or(false))
            .unwrap_or(false)
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(email).map(|u| u.value().clone()))
    }

    async fn update_password(&self, user: &User, password_hash: &str) -> Result<(), StoreError> {
        let mut entry = self
            .users
            .get_mut(&user.email)
            .ok_or_else(|| StoreError::from(format!("no user {}", user.email)))?;
        entry.password_hash = password_hash.to_string();
        Ok(())
    }
}

/// Keeps every (email, token) it was asked to deliver.
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last_token(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, token)| token.clone())
    }

    pub fn tokens_for(&self, email: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| to == email)
            .map(|(_, token)| token.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_reset_link(&self, user: &User, token: &str) -> Result<(), String> {
        self.sent
            .lock()
            .unwrap()
            .push((user.email.clone(), token.to_string()));
        Ok(())
    }
}

pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send_reset_link(&self, _user: &User, _token: &str) -> Result<(), String> {
        Err("SMTP unavailable".to_string())
    }
}

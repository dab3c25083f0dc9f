use async_trait::async_trait;
use sqlx::PgPool;

use super::{StoreError, TokenStore, UserDirectory};
use crate::db;
use crate::models::{PasswordResetToken, User};

pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<PasswordResetToken>, StoreError> {
        Ok(db::password_reset_tokens::find_by_email(&self.pool, email).await?)
    }

    async fn delete_by_email(&self, email: &str) -> Result<(), StoreError> {
        Ok(db::password_reset_tokens::delete_by_email(&self.pool, email).await?)
    }

    async fn insert(&self, token: &PasswordResetToken) -> Result<(), StoreError> {
        Ok(db::password_reset_tokens::upsert(&self.pool, token).await?)
    }

    async fn delete_if_matches(&self, email: &str, token_hash: &str) -> Result<bool, StoreError> {
        Ok(db::password_reset_tokens::delete_if_matches(&self.pool, email, token_hash).await?)
    }
}

pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(db::users::find_by_email(&self.pool, email).await?)
    }

    /// Replaces the hash and signs the user out everywhere.
    async fn update_password(&self, user: &User, password_hash: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        db::users::update_password(&mut *tx, user.id, password_hash).await?;
        let revoked = db::api_tokens::delete_all_for_user(&mut *tx, user.id).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, revoked, "Password replaced, API tokens revoked");
        Ok(())
    }
}

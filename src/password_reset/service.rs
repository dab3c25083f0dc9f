use std::sync::Arc;

use chrono::{Duration, Utc};

use super::{Notifier, ResetError, TOKEN_TTL_MINUTES, TokenStore, UserDirectory};
use crate::auth::password;
use crate::auth::tokens::generate_token;
use crate::models::PasswordResetToken;

#[derive(Clone)]
pub struct PasswordResetService {
    tokens: Arc<dyn TokenStore>,
    users: Arc<dyn UserDirectory>,
    notifier: Arc<dyn Notifier>,
    ttl: Duration,
}

impl PasswordResetService {
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        users: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            tokens,
            users,
            notifier,
            ttl: Duration::minutes(TOKEN_TTL_MINUTES),
        }
    }

    /// Issue a fresh reset secret for `email`, superseding any pending one,
    /// and deliver it through the notifier. The secret is never returned.
    ///
    /// If delivery fails the new row is removed again, so no undelivered
    /// token stays live.
    pub async fn request_reset(&self, email: &str) -> Result<(), ResetError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(ResetError::UserNotFound)?;

        self.tokens.delete_by_email(&user.email).await?;

        let token = generate_token();
        let record = PasswordResetToken {
            email: user.email.clone(),
            token_hash: password::hash(&token).map_err(ResetError::Hashing)?,
            created_at: Utc::now(),
        };
        self.tokens.insert(&record).await?;

        if let Err(e) = self.notifier.send_reset_link(&user, &token).await {
            if let Err(rollback) = self
                .tokens
                .delete_if_matches(&record.email, &record.token_hash)
                .await
            {
                tracing::error!(user_id = %user.id, "Failed to roll back reset token: {rollback}");
            }
            return Err(ResetError::NotifierFailure(e));
        }

        tracing::info!(user_id = %user.id, "Password reset link sent");
        Ok(())
    }

    /// Replace the password of `email` if `token` matches its pending,
    /// unexpired reset row. The row is consumed before the password changes,
    /// so a token can win at most once.
    pub async fn reset_password(
        &self,
        email: &str,
        token: &str,
        new_password: &str,
    ) -> Result<(), ResetError> {
        let record = self
            .tokens
            .find_by_email(email)
            .await?
            .ok_or(ResetError::InvalidToken)?;

        let matches = password::verify(token, &record.token_hash).unwrap_or_else(|e| {
            tracing::warn!("Unreadable reset token hash for pending reset: {e}");
            false
        });
        if !matches {
            return Err(ResetError::InvalidToken);
        }

        if record.is_expired(Utc::now(), self.ttl) {
            self.tokens
                .delete_if_matches(&record.email, &record.token_hash)
                .await?;
            return Err(ResetError::TokenExpired);
        }

        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(ResetError::UserNotFound)?;

        let password_hash = password::hash(new_password).map_err(ResetError::Hashing)?;

        if !self
            .tokens
            .delete_if_matches(&record.email, &record.token_hash)
            .await?
        {
            // consumed or superseded since we read it
            return Err(ResetError::InvalidToken);
        }

        self.users.update_password(&user, &password_hash).await?;

        tracing::info!(user_id = %user.id, "Password reset completed");
        Ok(())
    }
}

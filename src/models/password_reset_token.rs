use chrono::{DateTime, Duration, Utc};

/// Pending password reset for one email. `token_hash` is an Argon2 PHC string;
/// the plaintext secret is never stored.
#[derive(Clone, sqlx::FromRow)]
pub struct PasswordResetToken {
    pub email: String,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.created_at > ttl
    }
}

impl std::fmt::Debug for PasswordResetToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordResetToken")
            .field("email", &self.email)
            .field("token_hash", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .finish()
    }
}

use std::sync::Arc;

use async_trait::async_trait;

use super::SystemMailer;
use crate::models::User;
use crate::password_reset::Notifier;

/// Front-end reset page with the plaintext token and email in the query.
pub fn reset_url(frontend_url: &str, token: &str, email: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("token", token)
        .append_pair("email", email)
        .finish();
    format!("{}/reset-password?{query}", frontend_url.trim_end_matches('/'))
}

/// Emails the reset link through the system SMTP relay.
pub struct MailNotifier {
    mailer: Arc<SystemMailer>,
    frontend_url: String,
}

impl MailNotifier {
    pub fn new(mailer: Arc<SystemMailer>, frontend_url: &str) -> Self {
        Self {
            mailer,
            frontend_url: frontend_url.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for MailNotifier {
    async fn send_reset_link(&self, user: &User, token: &str) -> Result<(), String> {
        let url = reset_url(&self.frontend_url, token, &user.email);
        self.mailer
            .send_password_reset(&user.email, &user.name, &url)
            .await
    }
}

/// Development fallback when SMTP is not configured: the link goes to the log.
pub struct LogNotifier {
    frontend_url: String,
}

impl LogNotifier {
    pub fn new(frontend_url: &str) -> Self {
        Self {
            frontend_url: frontend_url.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_reset_link(&self, user: &User, token: &str) -> Result<(), String> {
        let url = reset_url(&self.frontend_url, token, &user.email);
        tracing::warn!("System SMTP not configured. Password reset link for {}: {url}", user.email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_url_encodes_query() {
        assert_eq!(
            reset_url("http://localhost:3000/", "abc123", "maria+test@example.com"),
            "http://localhost:3000/reset-password?token=abc123&email=maria%2Btest%40example.com"
        );
    }
}

pub mod notifier;
pub mod templates;

use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;

/// A rendered message ready for delivery.
pub struct Email {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Account mail sent from the configured system address over STARTTLS.
pub struct SystemMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SystemMailer {
    /// Fails on an unusable relay host or sender address; nothing is
    /// contacted until the first send.
    pub fn new(config: &SmtpConfig) -> Result<Self, String> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| format!("Invalid APP_SMTP_FROM address: {e}"))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| format!("SMTP relay {}: {e}", config.host))?
            .port(config.port)
            .credentials(Credentials::new(config.user.clone(), config.pass.clone()))
            .build();

        Ok(Self { transport, from })
    }

    pub async fn send_password_reset(
        &self,
        to_email: &str,
        to_name: &str,
        reset_url: &str,
    ) -> Result<(), String> {
        let to = recipient(to_email, to_name)?;
        let email = templates::password_reset(to_name, reset_url)
            .map_err(|e| format!("Failed to render reset email: {e}"))?;
        self.deliver(to, email).await
    }

    async fn deliver(&self, to: Mailbox, email: Email) -> Result<(), String> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject)
            .multipart(MultiPart::alternative_plain_html(email.text, email.html))
            .map_err(|e| format!("Failed to build email: {e}"))?;

        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| format!("Failed to send email: {e}"))
    }
}

fn recipient(email: &str, name: &str) -> Result<Mailbox, String> {
    let address = email
        .parse()
        .map_err(|e| format!("Invalid recipient address: {e}"))?;
    let name = Some(name.trim()).filter(|n| !n.is_empty()).map(str::to_string);
    Ok(Mailbox::new(name, address))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipient_carries_display_name() {
        let mailbox = recipient("maria@example.com", "Maria Silva").unwrap();
        assert_eq!(mailbox.name.as_deref(), Some("Maria Silva"));
        assert_eq!(mailbox.email.to_string(), "maria@example.com");

        let bare = recipient("maria@example.com", "  ").unwrap();
        assert_eq!(bare.name, None);
    }

    #[test]
    fn rejects_bad_recipient() {
        assert!(recipient("not an address", "Maria").is_err());
    }
}

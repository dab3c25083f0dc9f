use askama::Template;

use super::Email;
use crate::password_reset::TOKEN_TTL_MINUTES;

#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct PasswordResetHtml<'a> {
    name: &'a str,
    reset_url: &'a str,
    ttl_minutes: i64,
}

#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetText<'a> {
    name: &'a str,
    reset_url: &'a str,
    ttl_minutes: i64,
}

pub fn password_reset(name: &str, reset_url: &str) -> Result<Email, askama::Error> {
    let html = PasswordResetHtml {
        name,
        reset_url,
        ttl_minutes: TOKEN_TTL_MINUTES,
    }
    .render()?;
    let text = PasswordResetText {
        name,
        reset_url,
        ttl_minutes: TOKEN_TTL_MINUTES,
    }
    .render()?;

    Ok(Email {
        subject: "Password Recovery".to_string(),
        text,
        html,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_email_escapes_name_and_keeps_link() {
        let email = password_reset(
            "<Maria>",
            "http://localhost:3000/reset-password?token=abc&email=maria%40example.com",
        )
        .unwrap();
        assert_eq!(email.subject, "Password Recovery");
        assert!(email.html.contains("Hi &lt;Maria&gt;,"));
        assert!(email.html.contains("token=abc&amp;email=maria%40example.com"));
        assert!(!email.html.contains("<Maria>"));
        assert!(email.html.contains("expires in 60 minutes"));
        assert!(email.text.contains("token=abc&email=maria%40example.com"));
        assert!(email.text.starts_with("Hi <Maria>,"));
    }

    #[test]
    fn quotes_cannot_break_out_of_the_link() {
        let email = password_reset("Maria", "http://x/\" onmouseover=\"alert(1)").unwrap();
        assert!(!email.html.contains("\" onmouseover"));
    }
}

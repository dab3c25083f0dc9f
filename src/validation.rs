use std::sync::LazyLock;

use regex::Regex;

use crate::error::{AppError, FieldErrors};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 255 && EMAIL_RE.is_match(email)
}

/// Accumulates per-field messages so a request reports every problem at once.
#[derive(Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Present, non-blank and at most `max` characters.
    pub fn required(&mut self, field: &str, value: Option<&str>, max: usize) {
        match value.map(str::trim) {
            None | Some("") => self.error(field, format!("The {field} field is required.")),
            Some(v) => self.max(field, v, max),
        }
    }

    pub fn max(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.error(
                field,
                format!("The {field} may not be greater than {max} characters."),
            );
        }
    }

    pub fn email(&mut self, field: &str, value: &str) {
        if !is_valid_email(value.trim()) {
            self.error(field, format!("The {field} must be a valid email address."));
        }
    }

    pub fn has_error(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn finish(self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.errors))
        }
    }
}

/// Trimmed, lowercased email used as the account key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

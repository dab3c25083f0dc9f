mod api_token;
mod contact;
mod password_reset_token;
mod user;

pub use api_token::ApiToken;
pub use contact::Contact;
pub use password_reset_token::PasswordResetToken;
pub use user::User;

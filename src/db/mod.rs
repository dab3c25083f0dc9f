pub mod api_tokens;
pub mod contacts;
pub mod password_reset_tokens;
pub mod users;

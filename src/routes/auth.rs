use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::extractor::AuthUser;
use crate::auth::password;
use crate::auth::tokens::{generate_token, hash_token};
use crate::db;
use crate::error::AppError;
use crate::models::User;
use crate::password_reset::ResetError;
use crate::routes::{ApiJson, ApiResponse};
use crate::state::SharedState;
use crate::validation::{Validator, normalize_email};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub email: Option<String>,
    pub token: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
}

#[derive(Serialize)]
pub struct AuthPayload {
    pub user: User,
    pub token: String,
    pub token_type: &'static str,
}

const RESET_LINK_SENT: &str = "If that email is registered, a reset link has been sent.";
const INVALID_RESET_TOKEN: &str = "Invalid or expired reset token";

/// Issue a new API token for `user`. Only the SHA-256 digest is stored.
async fn issue_token(state: &SharedState, user: User) -> Result<AuthPayload, AppError> {
    let token = generate_token();
    db::api_tokens::create(&state.pool, user.id, &hash_token(&token)).await?;
    Ok(AuthPayload {
        user,
        token,
        token_type: "Bearer",
    })
}

fn check_new_password(
    v: &mut Validator,
    password: Option<&str>,
    confirmation: Option<&str>,
) {
    match password {
        None | Some("") => v.error("password", "The password field is required."),
        Some(pw) => {
            if let Err(msg) = password::check_new(pw, confirmation) {
                v.error("password", msg);
            }
        }
    }
}

pub async fn register(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthPayload>>), AppError> {
    let mut v = Validator::new();
    v.required("name", req.name.as_deref(), 255);
    v.required("email", req.email.as_deref(), 255);
    if let Some(email) = req.email.as_deref().filter(|e| !e.trim().is_empty()) {
        v.email("email", email);
    }
    check_new_password(
        &mut v,
        req.password.as_deref(),
        req.password_confirmation.as_deref(),
    );

    let email = normalize_email(req.email.as_deref().unwrap_or_default());
    if !v.has_error("email") && db::users::find_by_email(&state.pool, &email).await?.is_some() {
        v.error("email", "The email has already been taken.");
    }
    v.finish()?;

    let name = req.name.as_deref().unwrap_or_default().trim();
    let pw_hash = password::hash(req.password.as_deref().unwrap_or_default())
        .map_err(AppError::Internal)?;

    let user = db::users::create(&state.pool, name, &email, &pw_hash)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::invalid_field("email", "The email has already been taken.")
            }
            _ => AppError::Database(e),
        })?;

    tracing::info!(user_id = %user.id, "User registered");

    let payload = issue_token(&state, user).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("User registered successfully", payload),
    ))
}

pub async fn login(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<ApiResponse<AuthPayload>>, AppError> {
    let mut v = Validator::new();
    v.required("email", req.email.as_deref(), 255);
    v.required("password", req.password.as_deref(), 255);
    v.finish()?;

    let email = normalize_email(req.email.as_deref().unwrap_or_default());
    let plain = req.password.as_deref().unwrap_or_default();

    // Rate limit check
    if let Err(retry_after) = state.login_limiter.check(&email) {
        return Err(AppError::RateLimited(format!(
            "Too many login attempts. Please try again in {} minutes.",
            retry_after.div_ceil(60)
        )));
    }

    let user = db::users::find_by_email(&state.pool, &email)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

    let valid = password::verify(plain, &user.password_hash).map_err(AppError::Internal)?;

    if !valid {
        state.login_limiter.record_failure(&email);
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }
    state.login_limiter.reset(&email);

    let payload = issue_token(&state, user).await?;
    Ok(ApiResponse::with_message("Login successful", payload))
}

pub async fn logout(
    State(state): State<SharedState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<()>>, AppError> {
    db::api_tokens::delete(&state.pool, auth.token_id).await?;
    Ok(ApiResponse::message("Logged out successfully"))
}

pub async fn current_user(
    State(state): State<SharedState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let user = db::users::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;
    Ok(ApiResponse::data(user))
}

pub async fn delete_account(
    State(state): State<SharedState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let mut tx = state.pool.begin().await?;
    db::api_tokens::delete_all_for_user(&mut *tx, auth.user_id).await?;
    let contacts = db::contacts::delete_all_for_user(&mut *tx, auth.user_id).await?;
    db::users::delete(&mut *tx, auth.user_id).await?;
    tx.commit().await?;

    tracing::info!(user_id = %auth.user_id, contacts, "Account deleted");

    Ok(ApiResponse::message("Account deleted successfully"))
}

pub async fn forgot_password(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<ForgotPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let mut v = Validator::new();
    v.required("email", req.email.as_deref(), 255);
    if let Some(email) = req.email.as_deref().filter(|e| !e.trim().is_empty()) {
        v.email("email", email);
    }
    v.finish()?;

    let email = normalize_email(req.email.as_deref().unwrap_or_default());

    // Always answer the same way so the response does not reveal whether
    // the email is registered; the work happens in the background.
    let service = state.password_resets.clone();
    state.background.spawn(async move {
        match service.request_reset(&email).await {
            Ok(()) => {}
            Err(ResetError::UserNotFound) => {
                tracing::debug!("Password reset requested for unknown email");
            }
            Err(e) => tracing::error!("Password reset request failed: {e}"),
        }
    });

    Ok(ApiResponse::message(RESET_LINK_SENT))
}

pub async fn reset_password(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let mut v = Validator::new();
    v.required("token", req.token.as_deref(), 255);
    v.required("email", req.email.as_deref(), 255);
    if let Some(email) = req.email.as_deref().filter(|e| !e.trim().is_empty()) {
        v.email("email", email);
    }
    check_new_password(
        &mut v,
        req.password.as_deref(),
        req.password_confirmation.as_deref(),
    );
    v.finish()?;

    let email = normalize_email(req.email.as_deref().unwrap_or_default());
    let token = req.token.as_deref().unwrap_or_default().trim();
    let new_password = req.password.as_deref().unwrap_or_default();

    state
        .password_resets
        .reset_password(&email, token, new_password)
        .await
        .map_err(reset_error_response)?;

    Ok(ApiResponse::message("Password reset successfully"))
}

/// Expired, unknown and mismatched tokens all read the same to the caller.
fn reset_error_response(err: ResetError) -> AppError {
    match err {
        ResetError::InvalidToken | ResetError::TokenExpired | ResetError::UserNotFound => {
            AppError::BadRequest(INVALID_RESET_TOKEN.to_string())
        }
        ResetError::NotifierFailure(_) | ResetError::StorageFailure(_) | ResetError::Hashing(_) => {
            AppError::Internal(err.to_string())
        }
    }
}

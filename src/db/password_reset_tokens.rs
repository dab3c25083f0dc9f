use sqlx::PgPool;

use crate::models::PasswordResetToken;

pub async fn find_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<PasswordResetToken>, sqlx::Error> {
    sqlx::query_as::<_, PasswordResetToken>(
        "SELECT * FROM password_reset_tokens WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await
}

/// Insert or replace the token for `token.email`. The primary key on `email`
/// makes concurrent requests converge on the last writer.
pub async fn upsert(pool: &PgPool, token: &PasswordResetToken) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO password_reset_tokens (email, token_hash, created_at)
         VALUES ($1, $2, $3)
         ON CONFLICT (email) DO UPDATE
         SET token_hash = EXCLUDED.token_hash, created_at = EXCLUDED.created_at",
    )
    .bind(&token.email)
    .bind(&token.token_hash)
    .bind(token.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_by_email(pool: &PgPool, email: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM password_reset_tokens WHERE email = $1")
        .bind(email)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete the row only if it still carries `token_hash`. Returns whether a
/// row was removed, so exactly one concurrent caller wins.
pub async fn delete_if_matches(
    pool: &PgPool,
    email: &str,
    token_hash: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM password_reset_tokens WHERE email = $1 AND token_hash = $2",
    )
    .bind(email)
    .bind(token_hash)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

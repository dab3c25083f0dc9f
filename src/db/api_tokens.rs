use sqlx::PgPool;
use uuid::Uuid;

use crate::models::ApiToken;

pub async fn create(pool: &PgPool, user_id: Uuid, token_hash: &str) -> Result<ApiToken, sqlx::Error> {
    sqlx::query_as::<_, ApiToken>(
        "INSERT INTO api_tokens (id, user_id, token_hash)
         VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(user_id)
    .bind(token_hash)
    .fetch_one(pool)
    .await
}

/// Look up a token by hash and record the access in one round trip.
pub async fn touch_by_hash(
    pool: &PgPool,
    token_hash: &str,
) -> Result<Option<ApiToken>, sqlx::Error> {
    sqlx::query_as::<_, ApiToken>(
        "UPDATE api_tokens SET last_used_at = now()
         WHERE token_hash = $1 RETURNING *",
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM api_tokens WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_all_for_user<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    user_id: Uuid,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM api_tokens WHERE user_id = $1")
        .bind(user_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

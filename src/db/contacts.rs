use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::Contact;

/// Writable columns of a contact.
#[derive(Debug, Clone, Default)]
pub struct ContactFields {
    pub name: String,
    pub email: Option<String>,
    pub cpf: String,
    pub phone: String,
    pub cep: String,
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl From<Contact> for ContactFields {
    fn from(c: Contact) -> Self {
        Self {
            name: c.name,
            email: c.email,
            cpf: c.cpf,
            phone: c.phone,
            cep: c.cep,
            street: c.street,
            number: c.number,
            complement: c.complement,
            neighborhood: c.neighborhood,
            city: c.city,
            state: c.state,
            latitude: c.latitude,
            longitude: c.longitude,
        }
    }
}

pub async fn create(
    pool: &PgPool,
    user_id: Uuid,
    fields: &ContactFields,
) -> Result<Contact, sqlx::Error> {
    sqlx::query_as::<_, Contact>(
        "INSERT INTO contacts (id, user_id, name, email, cpf, phone, cep, street, number,
                               complement, neighborhood, city, state, latitude, longitude)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(user_id)
    .bind(&fields.name)
    .bind(&fields.email)
    .bind(&fields.cpf)
    .bind(&fields.phone)
    .bind(&fields.cep)
    .bind(&fields.street)
    .bind(&fields.number)
    .bind(&fields.complement)
    .bind(&fields.neighborhood)
    .bind(&fields.city)
    .bind(&fields.state)
    .bind(fields.latitude)
    .bind(fields.longitude)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
) -> Result<Option<Contact>, sqlx::Error> {
    sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
    fields: &ContactFields,
) -> Result<Option<Contact>, sqlx::Error> {
    sqlx::query_as::<_, Contact>(
        "UPDATE contacts
         SET name = $3, email = $4, cpf = $5, phone = $6, cep = $7, street = $8, number = $9,
             complement = $10, neighborhood = $11, city = $12, state = $13,
             latitude = $14, longitude = $15, updated_at = now()
         WHERE id = $1 AND user_id = $2
         RETURNING *",
    )
    .bind(id)
    .bind(user_id)
    .bind(&fields.name)
    .bind(&fields.email)
    .bind(&fields.cpf)
    .bind(&fields.phone)
    .bind(&fields.cep)
    .bind(&fields.street)
    .bind(&fields.number)
    .bind(&fields.complement)
    .bind(&fields.neighborhood)
    .bind(&fields.city)
    .bind(&fields.state)
    .bind(fields.latitude)
    .bind(fields.longitude)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM contacts WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn delete_all_for_user<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    user_id: Uuid,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM contacts WHERE user_id = $1")
        .bind(user_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortColumn {
    Name,
    Email,
    City,
    CreatedAt,
    UpdatedAt,
}

impl SortColumn {
    /// Unknown columns fall back to `created_at`.
    pub fn parse(s: &str) -> Self {
        match s {
            "name" => SortColumn::Name,
            "email" => SortColumn::Email,
            "city" => SortColumn::City,
            "updated_at" => SortColumn::UpdatedAt,
            _ => SortColumn::CreatedAt,
        }
    }

    fn as_sql(self) -> &'static str {
        match self {
            SortColumn::Name => "name",
            SortColumn::Email => "email",
            SortColumn::City => "city",
            SortColumn::CreatedAt => "created_at",
            SortColumn::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("asc") {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        }
    }

    fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

pub struct ListParams {
    pub user_id: Uuid,
    pub search: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub sort_by: SortColumn,
    pub sort_order: SortOrder,
    pub limit: i64,
    pub offset: i64,
}

const SEARCH_COLUMNS: [&str; 6] = ["name", "email", "phone", "cpf", "street", "city"];

pub async fn list(pool: &PgPool, params: &ListParams) -> Result<Vec<Contact>, sqlx::Error> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM contacts");
    push_filters(&mut qb, params);

    let order = params.sort_order.as_sql();
    qb.push(format!(
        " ORDER BY {} {order}, id {order}",
        params.sort_by.as_sql()
    ));
    qb.push(" LIMIT ").push_bind(params.limit);
    qb.push(" OFFSET ").push_bind(params.offset);

    qb.build_query_as::<Contact>().fetch_all(pool).await
}

pub async fn count(pool: &PgPool, params: &ListParams) -> Result<i64, sqlx::Error> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM contacts");
    push_filters(&mut qb, params);
    qb.build_query_scalar::<i64>().fetch_one(pool).await
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, params: &ListParams) {
    qb.push(" WHERE user_id = ").push_bind(params.user_id);

    if let Some(search) = non_empty(&params.search) {
        let pattern = like_pattern(search);
        qb.push(" AND (");
        {
            let mut clauses = qb.separated(" OR ");
            for column in SEARCH_COLUMNS {
                clauses.push(format!("{column} ILIKE "));
                clauses.push_bind_unseparated(pattern.clone());
            }
        }
        qb.push(")");
    }

    if let Some(city) = non_empty(&params.city) {
        qb.push(" AND city ILIKE ").push_bind(like_pattern(city));
    }

    if let Some(state) = non_empty(&params.state) {
        qb.push(" AND state = ").push_bind(state.to_uppercase());
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// `%term%` with LIKE metacharacters in `term` escaped.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Contacts still lacking coordinates, oldest first.
pub async fn list_missing_coordinates(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<Contact>, sqlx::Error> {
    sqlx::query_as::<_, Contact>(
        "SELECT * FROM contacts
         WHERE latitude IS NULL OR longitude IS NULL
         ORDER BY created_at ASC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn update_coordinates(
    pool: &PgPool,
    id: Uuid,
    latitude: f64,
    longitude: f64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE contacts SET latitude = $2, longitude = $3, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(latitude)
        .bind(longitude)
        .execute(pool)
        .await?;
    Ok(())
}

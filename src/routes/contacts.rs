use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::cpf;
use crate::db;
use crate::db::contacts::{ContactFields, ListParams, SortColumn, SortOrder};
use crate::error::AppError;
use crate::geocoding::AddressParts;
use crate::models::Contact;
use crate::routes::{ApiJson, ApiResponse};
use crate::state::SharedState;
use crate::validation::Validator;
use crate::via_cep::{self, CepAddress, ViaCepError};

const DEFAULT_PER_PAGE: i64 = 15;
const MAX_PER_PAGE: i64 = 100;

#[derive(Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub order_by: Option<String>,
    pub order_direction: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Serialize)]
pub struct ContactPage {
    pub contacts: Vec<Contact>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

/// Body of both create and update. On update only supplied fields change.
#[derive(Debug, Default, Deserialize)]
pub struct ContactRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub cpf: Option<String>,
    pub phone: Option<String>,
    pub cep: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

impl ContactRequest {
    fn touches_address(&self) -> bool {
        self.cep.is_some()
            || self.street.is_some()
            || self.number.is_some()
            || self.complement.is_some()
            || self.neighborhood.is_some()
            || self.city.is_some()
            || self.state.is_some()
    }
}

#[derive(Deserialize)]
pub struct ViaCepRequest {
    pub zip_code: Option<String>,
}

/// Required fields must be present when `require_all` is set; otherwise
/// only the supplied ones are checked, and they may not be blank.
fn validate(req: &ContactRequest, require_all: bool) -> Result<(), AppError> {
    let mut v = Validator::new();

    let required = [
        ("name", &req.name, 255),
        ("phone", &req.phone, 20),
        ("cpf", &req.cpf, 14),
        ("cep", &req.cep, 10),
        ("street", &req.street, 500),
        ("number", &req.number, 10),
        ("neighborhood", &req.neighborhood, 255),
        ("city", &req.city, 255),
        ("state", &req.state, 2),
    ];
    for (field, value, max) in required {
        if require_all || value.is_some() {
            v.required(field, value.as_deref(), max);
        }
    }

    if let Some(email) = req.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        v.max("email", email, 255);
        v.email("email", email);
    }
    if let Some(complement) = &req.complement {
        v.max("complement", complement.trim(), 255);
    }

    if !v.has_error("cpf") {
        if let Some(value) = &req.cpf {
            if !cpf::is_valid(value) {
                v.error("cpf", "The cpf is not a valid CPF.");
            }
        }
    }
    if !v.has_error("state") {
        if let Some(value) = &req.state {
            let value = value.trim();
            if value.len() != 2 || !value.chars().all(|c| c.is_ascii_alphabetic()) {
                v.error("state", "The state must be exactly 2 letters.");
            }
        }
    }

    v.finish()
}

fn trimmed(value: &str) -> String {
    value.trim().to_string()
}

/// Blank optional values are stored as NULL.
fn optional(value: &str) -> Option<String> {
    Some(value.trim()).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Overlay the supplied request fields onto `fields`. The request must
/// already have passed [`validate`].
fn apply(fields: &mut ContactFields, req: &ContactRequest) -> Result<(), AppError> {
    if let Some(name) = &req.name {
        fields.name = trimmed(name);
    }
    if let Some(email) = &req.email {
        fields.email = optional(email).map(|e| e.to_lowercase());
    }
    if let Some(value) = &req.cpf {
        fields.cpf = cpf::format(value)
            .ok_or_else(|| AppError::invalid_field("cpf", "The cpf is not a valid CPF."))?;
    }
    if let Some(phone) = &req.phone {
        fields.phone = trimmed(phone);
    }
    if let Some(cep) = &req.cep {
        fields.cep = trimmed(cep);
    }
    if let Some(street) = &req.street {
        fields.street = trimmed(street);
    }
    if let Some(number) = &req.number {
        fields.number = trimmed(number);
    }
    if let Some(complement) = &req.complement {
        fields.complement = optional(complement);
    }
    if let Some(neighborhood) = &req.neighborhood {
        fields.neighborhood = trimmed(neighborhood);
    }
    if let Some(city) = &req.city {
        fields.city = trimmed(city);
    }
    if let Some(state) = &req.state {
        fields.state = state.trim().to_uppercase();
    }
    Ok(())
}

/// Fill in coordinates from the configured geocoder. Without one the
/// coordinates are left empty for the backfill job.
async fn geocode(state: &SharedState, fields: &mut ContactFields) {
    let Some(geocoder) = &state.geocoder else {
        fields.latitude = None;
        fields.longitude = None;
        return;
    };

    let address = AddressParts {
        street: &fields.street,
        number: &fields.number,
        complement: fields.complement.as_deref(),
        neighborhood: &fields.neighborhood,
        city: &fields.city,
        state: &fields.state,
        cep: &fields.cep,
    };
    let coords = geocoder.locate(&address).await;
    fields.latitude = Some(coords.latitude);
    fields.longitude = Some(coords.longitude);
}

fn map_write_error(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::invalid_field("cpf", "This CPF is already registered for you.")
        }
        _ => AppError::Database(err),
    }
}

fn contact_not_found() -> AppError {
    AppError::NotFound("Contact not found".to_string())
}

pub async fn list(
    State(state): State<SharedState>,
    auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<ContactPage>>, AppError> {
    let per_page = query
        .per_page
        .unwrap_or(DEFAULT_PER_PAGE)
        .clamp(1, MAX_PER_PAGE);
    let page = query.page.unwrap_or(1).max(1);

    let params = ListParams {
        user_id: auth.user_id,
        search: query.search,
        city: query.city,
        state: query.state,
        sort_by: SortColumn::parse(query.order_by.as_deref().unwrap_or("created_at")),
        sort_order: SortOrder::parse(query.order_direction.as_deref().unwrap_or("desc")),
        limit: per_page,
        offset: (page - 1).saturating_mul(per_page),
    };

    let total = db::contacts::count(&state.pool, &params).await?;
    let contacts = db::contacts::list(&state.pool, &params).await?;

    Ok(ApiResponse::data(ContactPage {
        contacts,
        total,
        page,
        per_page,
        total_pages: total_pages(total, per_page),
    }))
}

fn total_pages(total: i64, per_page: i64) -> i64 {
    ((total + per_page - 1) / per_page).max(1)
}

pub async fn create(
    State(state): State<SharedState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<ContactRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Contact>>), AppError> {
    validate(&req, true)?;

    let mut fields = ContactFields::default();
    apply(&mut fields, &req)?;
    geocode(&state, &mut fields).await;

    let contact = db::contacts::create(&state.pool, auth.user_id, &fields)
        .await
        .map_err(map_write_error)?;

    tracing::info!(user_id = %auth.user_id, contact_id = %contact.id, "Contact created");

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Contact created successfully", contact),
    ))
}

pub async fn get(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Contact>>, AppError> {
    let contact = db::contacts::find_by_id(&state.pool, id, auth.user_id)
        .await?
        .ok_or_else(contact_not_found)?;
    Ok(ApiResponse::data(contact))
}

pub async fn update(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(req): ApiJson<ContactRequest>,
) -> Result<Json<ApiResponse<Contact>>, AppError> {
    let existing = db::contacts::find_by_id(&state.pool, id, auth.user_id)
        .await?
        .ok_or_else(contact_not_found)?;

    validate(&req, false)?;

    let mut fields = ContactFields::from(existing);
    apply(&mut fields, &req)?;
    if req.touches_address() {
        geocode(&state, &mut fields).await;
    }

    let contact = db::contacts::update(&state.pool, id, auth.user_id, &fields)
        .await
        .map_err(map_write_error)?
        .ok_or_else(contact_not_found)?;

    Ok(ApiResponse::with_message("Contact updated successfully", contact))
}

pub async fn delete(
    State(state): State<SharedState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    if !db::contacts::delete(&state.pool, id, auth.user_id).await? {
        return Err(contact_not_found());
    }
    tracing::info!(user_id = %auth.user_id, contact_id = %id, "Contact deleted");
    Ok(ApiResponse::message("Contact deleted successfully"))
}

pub async fn via_cep(
    State(state): State<SharedState>,
    _auth: AuthUser,
    ApiJson(req): ApiJson<ViaCepRequest>,
) -> Result<Json<ApiResponse<CepAddress>>, AppError> {
    let zip_code = req.zip_code.as_deref().unwrap_or_default().trim();

    let mut v = Validator::new();
    v.required("zip_code", Some(zip_code), 9);
    if !v.has_error("zip_code") && !via_cep::is_valid_zip_code(zip_code) {
        v.error("zip_code", "The zip code format is invalid.");
    }
    v.finish()?;

    match state.via_cep.lookup(zip_code).await {
        Ok(address) => Ok(ApiResponse::data(address)),
        Err(ViaCepError::NotFound) => Err(AppError::NotFound("CEP not found".to_string())),
        Err(e @ ViaCepError::Upstream(_)) => {
            tracing::warn!("{e}");
            Err(AppError::BadGateway("Error querying CEP".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_request() -> ContactRequest {
        ContactRequest {
            name: Some("Maria Silva".to_string()),
            email: Some("Maria@Example.com".to_string()),
            cpf: Some("52998224725".to_string()),
            phone: Some("(11) 98765-4321".to_string()),
            cep: Some("01310-100".to_string()),
            street: Some("Avenida Paulista".to_string()),
            number: Some("1000".to_string()),
            complement: Some("".to_string()),
            neighborhood: Some("Bela Vista".to_string()),
            city: Some("São Paulo".to_string()),
            state: Some("sp".to_string()),
        }
    }

    fn error_fields(result: Result<(), AppError>) -> Vec<String> {
        match result {
            Err(AppError::Validation(errors)) => errors.into_keys().collect(),
            Err(other) => panic!("unexpected {other}"),
            Ok(()) => Vec::new(),
        }
    }

    #[test]
    fn full_request_is_valid() {
        assert!(validate(&full_request(), true).is_ok());
    }

    #[test]
    fn create_requires_every_mandatory_field() {
        let fields = error_fields(validate(&ContactRequest::default(), true));
        assert_eq!(
            fields,
            vec![
                "cep",
                "city",
                "cpf",
                "name",
                "neighborhood",
                "number",
                "phone",
                "state",
                "street"
            ]
        );
    }

    #[test]
    fn update_checks_only_supplied_fields() {
        assert!(validate(&ContactRequest::default(), false).is_ok());

        let req = ContactRequest {
            name: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(error_fields(validate(&req, false)), vec!["name"]);
    }

    #[test]
    fn rejects_bad_cpf_state_and_email() {
        let req = ContactRequest {
            cpf: Some("123.456.789-01".to_string()),
            state: Some("S1".to_string()),
            email: Some("not-an-email".to_string()),
            ..full_request()
        };
        assert_eq!(error_fields(validate(&req, true)), vec!["cpf", "email", "state"]);
    }

    #[test]
    fn apply_normalizes_values() {
        let mut fields = ContactFields::default();
        apply(&mut fields, &full_request()).unwrap();

        assert_eq!(fields.cpf, "529.982.247-25");
        assert_eq!(fields.state, "SP");
        assert_eq!(fields.email.as_deref(), Some("maria@example.com"));
        assert_eq!(fields.complement, None);
    }

    #[test]
    fn apply_keeps_unsupplied_fields() {
        let mut fields = ContactFields::default();
        apply(&mut fields, &full_request()).unwrap();

        let patch = ContactRequest {
            phone: Some("11 5555-0000".to_string()),
            ..Default::default()
        };
        apply(&mut fields, &patch).unwrap();

        assert_eq!(fields.phone, "11 5555-0000");
        assert_eq!(fields.name, "Maria Silva");
        assert!(!patch.touches_address());
    }

    #[test]
    fn page_count() {
        assert_eq!(total_pages(0, 15), 1);
        assert_eq!(total_pages(15, 15), 1);
        assert_eq!(total_pages(16, 15), 2);
        assert_eq!(total_pages(250, 100), 3);
    }
}

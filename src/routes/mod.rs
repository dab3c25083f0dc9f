pub mod auth;
pub mod contacts;

use axum::Json;
use axum::extract::FromRequest;
use axum::routing::{delete, get, post};
use axum::Router;
use serde::Serialize;

use crate::error::AppError;
use crate::state::SharedState;

/// JSON body extractor whose rejections use the API error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Success envelope shared by every API route.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn data(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            data: Some(data),
        })
    }

    pub fn with_message(message: &str, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.to_string()),
            data: Some(data),
        })
    }
}

impl ApiResponse<()> {
    pub fn message(message: &str) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.to_string()),
            data: None,
        })
    }
}

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Auth
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .route("/api/logout", post(auth::logout))
        .route("/api/user", get(auth::current_user))
        .route("/api/account", delete(auth::delete_account))
        // Password recovery
        .route("/api/forgot-password", post(auth::forgot_password))
        .route("/api/reset-password", post(auth::reset_password))
        // Contacts
        .route("/api/contacts", get(contacts::list).post(contacts::create))
        .route("/api/contacts/via-cep", post(contacts::via_cep))
        .route(
            "/api/contacts/{id}",
            get(contacts::get)
                .put(contacts::update)
                .delete(contacts::delete),
        )
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct EmailBody {
        email: Option<String>,
    }

    fn json_request(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn malformed_body_becomes_bad_request() {
        let err = ApiJson::<EmailBody>::from_request(json_request("{not json"), &())
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().starts_with("Invalid request body"));
    }

    #[tokio::test]
    async fn well_formed_body_is_extracted() {
        let request = json_request(r#"{"email":"a@b.co"}"#);
        let ApiJson(body) = ApiJson::<EmailBody>::from_request(request, &()).await.unwrap();
        assert_eq!(body.email.as_deref(), Some("a@b.co"));
    }
}

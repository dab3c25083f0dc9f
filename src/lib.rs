pub mod config;
pub mod error;
pub mod state;
pub mod auth;
pub mod db;
pub mod models;
pub mod routes;
pub mod email;
pub mod cpf;
pub mod geocoding;
pub mod password_reset;
pub mod rate_limit;
pub mod validation;
pub mod via_cep;

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::Router;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio_util::task::TaskTracker;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::email::SystemMailer;
use crate::email::notifier::{LogNotifier, MailNotifier};
use crate::password_reset::postgres::{PgTokenStore, PgUserDirectory};
use crate::password_reset::{Notifier, PasswordResetService};
use crate::rate_limit::LoginRateLimiter;
use crate::state::{AppState, SharedState};
use crate::via_cep::ViaCepClient;

pub fn build_app(
    pool: PgPool,
    config: Config,
    background: TaskTracker,
) -> Result<Router, String> {
    // Reset links go out by email when SMTP is configured, to the log otherwise
    let notifier: Arc<dyn Notifier> = match config.smtp.as_ref().map(SystemMailer::new) {
        Some(Ok(mailer)) => {
            tracing::info!("System SMTP configured");
            Arc::new(MailNotifier::new(Arc::new(mailer), &config.frontend_url))
        }
        Some(Err(e)) => {
            tracing::warn!("System SMTP not available: {e}");
            Arc::new(LogNotifier::new(&config.frontend_url))
        }
        None => Arc::new(LogNotifier::new(&config.frontend_url)),
    };

    let password_resets = PasswordResetService::new(
        Arc::new(PgTokenStore::new(pool.clone())),
        Arc::new(PgUserDirectory::new(pool.clone())),
        notifier,
    );

    let geocoder = geocoding::from_config(&config.geocoder)?;
    match &geocoder {
        Some(g) => tracing::info!("Geocoding with {}", g.name()),
        None => tracing::info!("Geocoding disabled"),
    }

    let via_cep = ViaCepClient::new(&config.via_cep_base_url)?;

    let cors = cors_layer(&config.frontend_url)?;
    let max_body_size = config.max_body_size;

    let state: SharedState = Arc::new(AppState {
        pool,
        config,
        password_resets,
        geocoder,
        via_cep,
        login_limiter: LoginRateLimiter::new(),
        background,
    });

    let app = Router::new()
        .merge(routes::api_routes())
        .route("/health", axum::routing::get(health))
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .with_state(state);

    Ok(app)
}

/// The single-page front end is the only browser origin allowed.
fn cors_layer(frontend_url: &str) -> Result<CorsLayer, String> {
    let origin: HeaderValue = frontend_url
        .parse()
        .map_err(|e| format!("Invalid APP_FRONTEND_URL for CORS: {e}"))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]))
}

async fn health() -> &'static str {
    "ok"
}

/// Install the global `tracing` subscriber. `RUST_LOG` wins over `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Open the Postgres pool and bring the schema up to date.
pub async fn connect_database(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Migrations applied");
    Ok(pool)
}

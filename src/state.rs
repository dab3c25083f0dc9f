use std::sync::Arc;

use sqlx::PgPool;
use tokio_util::task::TaskTracker;

use crate::config::Config;
use crate::geocoding::Geocoder;
use crate::password_reset::PasswordResetService;
use crate::rate_limit::LoginRateLimiter;
use crate::via_cep::ViaCepClient;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub password_resets: PasswordResetService,
    pub geocoder: Option<Arc<dyn Geocoder>>,
    pub via_cep: ViaCepClient,
    pub login_limiter: LoginRateLimiter,
    /// Work that outlives its request; drained on shutdown.
    pub background: TaskTracker,
}

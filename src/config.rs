use std::net::IpAddr;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub frontend_url: String,
    pub max_body_size: usize,
    pub log_level: String,
    pub smtp: Option<SmtpConfig>,
    pub geocoder: GeocoderConfig,
    pub via_cep_base_url: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeocoderConfig {
    Google { api_key: String },
    OpenStreetMap,
    Disabled,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let smtp = smtp_from_env()?;
        let geocoder = parse_geocoder(
            &env_or("APP_GEOCODER", "openstreetmap"),
            std::env::var("GOOGLE_MAPS_API_KEY").ok(),
        )?;

        let via_cep_base_url = env_or("VIA_CEP_BASE_URL", "https://viacep.com.br/ws")
            .trim_end_matches('/')
            .to_string();

        Ok(Config {
            database_url: env_required("DATABASE_URL")?,
            host: env_parse("APP_HOST", "0.0.0.0")?,
            port: env_parse("APP_PORT", "8000")?,
            frontend_url: env_or("APP_FRONTEND_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
            max_body_size: env_parse("APP_MAX_BODY_SIZE", "1048576")?,
            log_level: env_or("APP_LOG_LEVEL", "info"),
            smtp,
            geocoder,
            via_cep_base_url,
        })
    }
}

/// SMTP settings, if all five `APP_SMTP_*` variables are set.
fn smtp_from_env() -> Result<Option<SmtpConfig>, String> {
    let keys = [
        "APP_SMTP_HOST",
        "APP_SMTP_PORT",
        "APP_SMTP_USER",
        "APP_SMTP_PASS",
        "APP_SMTP_FROM",
    ];
    if keys.iter().any(|k| std::env::var(k).is_err()) {
        return Ok(None);
    }

    Ok(Some(SmtpConfig {
        host: env_required("APP_SMTP_HOST")?,
        port: env_parse("APP_SMTP_PORT", "587")?,
        user: env_required("APP_SMTP_USER")?,
        pass: env_required("APP_SMTP_PASS")?,
        from: env_required("APP_SMTP_FROM")?,
    }))
}

fn parse_geocoder(kind: &str, google_key: Option<String>) -> Result<GeocoderConfig, String> {
    match kind {
        "google" => match google_key.filter(|k| !k.trim().is_empty()) {
            Some(api_key) => Ok(GeocoderConfig::Google { api_key }),
            None => Err("APP_GEOCODER=google requires GOOGLE_MAPS_API_KEY".to_string()),
        },
        "openstreetmap" | "osm" | "nominatim" => Ok(GeocoderConfig::OpenStreetMap),
        "none" => Ok(GeocoderConfig::Disabled),
        other => Err(format!("Invalid APP_GEOCODER: {other}")),
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: &str) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_or(key, default)
        .trim()
        .parse()
        .map_err(|e| format!("Invalid {key}: {e}"))
}

//! Address to coordinates lookup. Geocoders never fail: any upstream problem
//! yields [`DEFAULT_COORDINATES`] and a warning.

pub mod google;
pub mod openstreetmap;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::GeocoderConfig;

/// São Paulo city center.
pub const DEFAULT_COORDINATES: Coordinates = Coordinates {
    latitude: -23.5505,
    longitude: -46.6333,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// The address columns of a contact that feed the lookup.
#[derive(Debug, Clone, Default)]
pub struct AddressParts<'a> {
    pub street: &'a str,
    pub number: &'a str,
    pub complement: Option<&'a str>,
    pub neighborhood: &'a str,
    pub city: &'a str,
    pub state: &'a str,
    pub cep: &'a str,
}

impl AddressParts<'_> {
    /// `"street, number, complement, neighborhood, city, state, cep, Brasil"`
    /// with empty parts left out.
    pub fn to_query(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        let street = self.street.trim();
        if !street.is_empty() {
            let number = self.number.trim();
            if number.is_empty() {
                parts.push(street.to_string());
            } else {
                parts.push(format!("{street}, {number}"));
            }
        }

        let rest = [
            self.complement.unwrap_or(""),
            self.neighborhood,
            self.city,
            self.state,
            self.cep,
        ];
        parts.extend(
            rest.iter()
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        );

        parts.push("Brasil".to_string());
        parts.join(", ")
    }
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    fn name(&self) -> &str;
    async fn locate(&self, address: &AddressParts<'_>) -> Coordinates;
}

/// `None` when geocoding is disabled; contacts then keep empty coordinates
/// until the backfill job runs against a configured service.
pub fn from_config(config: &GeocoderConfig) -> Result<Option<Arc<dyn Geocoder>>, String> {
    let geocoder: Arc<dyn Geocoder> = match config {
        GeocoderConfig::Google { api_key } => {
            Arc::new(google::GoogleMapsGeocoder::new(http_client()?, api_key))
        }
        GeocoderConfig::OpenStreetMap => {
            Arc::new(openstreetmap::NominatimGeocoder::new(http_client()?))
        }
        GeocoderConfig::Disabled => return Ok(None),
    };
    Ok(Some(geocoder))
}

fn http_client() -> Result<reqwest::Client, String> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .user_agent(concat!("user-address-api/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| format!("Failed to build HTTP client: {e}"))
}

/// Accept latitude/longitude given either as JSON numbers or numeric strings.
fn coordinate(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

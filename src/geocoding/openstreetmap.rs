use async_trait::async_trait;
use serde_json::Value;

use super::{AddressParts, Coordinates, DEFAULT_COORDINATES, Geocoder, coordinate};

const SEARCH_URL: &str = "https://nominatim.openstreetmap.org/search";

/// OpenStreetMap Nominatim search, restricted to Brazil. Nominatim requires
/// an identifying User-Agent, which the shared client sets.
pub struct NominatimGeocoder {
    client: reqwest::Client,
}

impl NominatimGeocoder {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, query: &str) -> Result<Value, String> {
        let resp = self
            .client
            .get(SEARCH_URL)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("limit", "1"),
                ("countrycodes", "br"),
                ("addressdetails", "1"),
            ])
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }

        resp.json().await.map_err(|e| format!("invalid JSON: {e}"))
    }
}

/// Nominatim answers with an array of places whose `lat`/`lon` are strings.
fn parse_response(body: &Value) -> Result<Coordinates, String> {
    let first = body
        .as_array()
        .and_then(|places| places.first())
        .ok_or_else(|| "no results".to_string())?;

    match (coordinate(&first["lat"]), coordinate(&first["lon"])) {
        (Some(latitude), Some(longitude)) => Ok(Coordinates {
            latitude,
            longitude,
        }),
        _ => Err("result without coordinates".to_string()),
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    fn name(&self) -> &str {
        "openstreetmap"
    }

    async fn locate(&self, address: &AddressParts<'_>) -> Coordinates {
        let query = address.to_query();
        tracing::debug!(address = %query, "Geocoding with Nominatim");
        match self.fetch(&query).await.and_then(|body| parse_response(&body)) {
            Ok(coordinates) => coordinates,
            Err(e) => {
                tracing::warn!(address = %query, "OpenStreetMap geocoding failed: {e}");
                DEFAULT_COORDINATES
            }
        }
    }
}

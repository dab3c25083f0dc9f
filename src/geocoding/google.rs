use async_trait::async_trait;
use serde_json::Value;

use super::{AddressParts, Coordinates, DEFAULT_COORDINATES, Geocoder, coordinate};

const GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

pub struct GoogleMapsGeocoder {
    client: reqwest::Client,
    api_key: String,
}

impl GoogleMapsGeocoder {
    pub fn new(client: reqwest::Client, api_key: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
        }
    }

    async fn fetch(&self, query: &str) -> Result<Value, String> {
        let resp = self
            .client
            .get(GEOCODE_URL)
            .query(&[("address", query), ("key", self.api_key.as_str())])
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

/// First result location, provided the API reported `"status": "OK"`.
fn parse_response(body: &Value) -> Result<Coordinates, String> {
    let status = body["status"].as_str().unwrap_or("unknown");
    if status != "OK" {
        return Err(format!("status {status}"));
    }

    let location = &body["results"][0]["geometry"]["location"];
    match (coordinate(&location["lat"]), coordinate(&location["lng"])) {
        (Some(latitude), Some(longitude)) => Ok(Coordinates {
            latitude,
            longitude,
        }),
        _ => Err("no results".to_string()),
    }
}

#[async_trait]
impl Geocoder for GoogleMapsGeocoder {
    fn name(&self) -> &str {
        "google"
    }

    async fn locate(&self, address: &AddressParts<'_>) -> Coordinates {
        let query = address.to_query();
        match self.fetch(&query).await.and_then(|body| parse_response(&body)) {
            Ok(coordinates) => coordinates,
            Err(e) => {
                tracing::warn!(address = %query, "Google Maps geocoding failed: {e}");
                DEFAULT_COORDINATES
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_first_result() {
        let body = json!({
            "status": "OK",
            "results": [
                { "geometry": { "location": { "lat": -23.5613, "lng": -46.6565 } } },
                { "geometry": { "location": { "lat": 0.0, "lng": 0.0 } } }
            ]
        });
        assert_eq!(
            parse_response(&body).unwrap(),
            Coordinates {
                latitude: -23.5613,
                longitude: -46.6565
            }
        );
    }

    #[test]
    fn non_ok_status_is_an_error() {
        let body = json!({ "status": "ZERO_RESULTS", "results": [] });
        assert!(parse_response(&body).unwrap_err().contains("ZERO_RESULTS"));
    }

    #[test]
    fn ok_without_results_is_an_error() {
        let body = json!({ "status": "OK", "results": [] });
        assert!(parse_response(&body).is_err());
    }
}

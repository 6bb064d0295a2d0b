//! Google Places Autocomplete / Details client.
//!
//! Autocomplete returns label-only predictions scoped to one country and
//! language. Exact coordinates need a second Details call per selected
//! place id.
//!
//! Autocomplete and the Details call that follows share a session token
//! so the pair is billed as one session. The token is rotated after
//! every Details lookup.
//!
//! See <https://developers.google.com/maps/documentation/places/web-service/autocomplete>

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use locator_geocoder_models::{Candidate, CandidateSource, Coordinates, GeocodeResult};
use locator_normalizer::sanitize_short;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::guard::{guarded, settle};
use crate::{CandidateProvider, GeocodeError, ProviderResponse};

const PROVIDER: &str = "Google Places";

/// Connection settings for the Places API.
#[derive(Debug, Clone)]
pub struct GooglePlacesConfig {
    /// Autocomplete endpoint.
    pub autocomplete_url: String,
    /// Details endpoint.
    pub details_url: String,
    /// ISO country code used in the `components` filter (e.g., `"cl"`).
    pub country: String,
    /// Response language (e.g., `"es"`).
    pub language: String,
    /// Maximum number of predictions kept.
    pub max_results: usize,
    /// API key.
    pub api_key: String,
    /// Bound on every request.
    pub timeout: Duration,
}

/// Places API client.
pub struct GooglePlacesClient {
    client: reqwest::Client,
    config: GooglePlacesConfig,
    session_token: Mutex<Uuid>,
}

#[derive(Deserialize)]
struct AutocompleteResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
    status: String,
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct Prediction {
    description: String,
    place_id: String,
}

#[derive(Deserialize)]
struct DetailsResponse {
    result: Option<PlaceResult>,
    status: String,
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct PlaceResult {
    geometry: Geometry,
    formatted_address: Option<String>,
    place_id: Option<String>,
}

#[derive(Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl GooglePlacesClient {
    /// Creates a new client.
    #[must_use]
    pub fn new(client: reqwest::Client, config: GooglePlacesConfig) -> Self {
        Self {
            client,
            config,
            session_token: Mutex::new(Uuid::new_v4()),
        }
    }

    fn session_token(&self) -> String {
        self.session_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .to_string()
    }

    fn rotate_session_token(&self) {
        *self
            .session_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Uuid::new_v4();
    }

    /// Fetches up to `max_results` label-only candidates for `input`.
    ///
    /// Failures and cancellation resolve to an unavailable (empty) response.
    pub async fn fetch_primary_autocomplete(
        &self,
        input: &str,
        cancel: &CancellationToken,
    ) -> ProviderResponse {
        let input = input.trim();
        if input.is_empty() {
            return ProviderResponse::answered(Vec::new());
        }

        let result = guarded(PROVIDER, self.config.timeout, cancel, self.autocomplete(input)).await;

        settle(PROVIDER, input, result)
            .map_or_else(ProviderResponse::unavailable, ProviderResponse::answered)
    }

    /// Resolves one place id to exact coordinates.
    ///
    /// Returns `None` on failure, cancellation, or an unknown id.
    pub async fn fetch_primary_details(
        &self,
        place_id: &str,
        cancel: &CancellationToken,
    ) -> Option<GeocodeResult> {
        let result = guarded(PROVIDER, self.config.timeout, cancel, self.details(place_id)).await;
        self.rotate_session_token();
        settle(PROVIDER, place_id, result).flatten()
    }

    async fn autocomplete(&self, input: &str) -> Result<Vec<Candidate>, GeocodeError> {
        let components = format!("country:{}", self.config.country);
        let session = self.session_token();

        let resp = self
            .client
            .get(&self.config.autocomplete_url)
            .query(&[
                ("input", input),
                ("components", components.as_str()),
                ("language", self.config.language.as_str()),
                ("sessiontoken", session.as_str()),
                ("key", self.config.api_key.as_str()),
            ])
            .send()
            .await?;

        check_http_status(&resp)?;

        let body: AutocompleteResponse = resp.json().await?;
        parse_autocomplete(body, self.config.max_results)
    }

    async fn details(&self, place_id: &str) -> Result<Option<GeocodeResult>, GeocodeError> {
        let session = self.session_token();

        let resp = self
            .client
            .get(&self.config.details_url)
            .query(&[
                ("place_id", place_id),
                ("fields", "geometry,formatted_address,place_id"),
                ("language", self.config.language.as_str()),
                ("sessiontoken", session.as_str()),
                ("key", self.config.api_key.as_str()),
            ])
            .send()
            .await?;

        check_http_status(&resp)?;

        let body: DetailsResponse = resp.json().await?;
        parse_details(body, place_id)
    }
}

fn check_http_status(resp: &reqwest::Response) -> Result<(), GeocodeError> {
    if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(GeocodeError::RateLimited);
    }

    if !resp.status().is_success() {
        return Err(GeocodeError::Status {
            provider: PROVIDER,
            status: resp.status().to_string(),
        });
    }

    Ok(())
}

/// Maps the Places API status field onto an error.
///
/// `ZERO_RESULTS` and `NOT_FOUND` are answers, not failures.
fn check_api_status(status: &str, error_message: Option<&str>) -> Result<bool, GeocodeError> {
    match status {
        "OK" => Ok(true),
        "ZERO_RESULTS" | "NOT_FOUND" => Ok(false),
        "OVER_QUERY_LIMIT" => Err(GeocodeError::RateLimited),
        other => Err(GeocodeError::Status {
            provider: PROVIDER,
            status: error_message.map_or_else(|| other.to_string(), |m| format!("{other}: {m}")),
        }),
    }
}

fn parse_autocomplete(
    body: AutocompleteResponse,
    max_results: usize,
) -> Result<Vec<Candidate>, GeocodeError> {
    if !check_api_status(&body.status, body.error_message.as_deref())? {
        return Ok(Vec::new());
    }

    Ok(body
        .predictions
        .into_iter()
        .take(max_results)
        .map(|prediction| {
            let label = sanitize_short(&prediction.description);
            let label = if label.is_empty() {
                prediction.description
            } else {
                label
            };
            Candidate::primary(label, prediction.place_id)
        })
        .collect())
}

fn parse_details(
    body: DetailsResponse,
    place_id: &str,
) -> Result<Option<GeocodeResult>, GeocodeError> {
    if !check_api_status(&body.status, body.error_message.as_deref())? {
        return Ok(None);
    }

    let result = body.result.ok_or_else(|| GeocodeError::Parse {
        message: "Places details response missing 'result'".to_string(),
    })?;

    let formatted = result
        .formatted_address
        .as_deref()
        .map(sanitize_short)
        .unwrap_or_default();

    Ok(Some(GeocodeResult {
        coordinates: Coordinates::new(result.geometry.location.lat, result.geometry.location.lng),
        formatted,
        external_id: Some(result.place_id.unwrap_or_else(|| place_id.to_string())),
    }))
}

#[async_trait]
impl CandidateProvider for GooglePlacesClient {
    fn source(&self) -> CandidateSource {
        CandidateSource::Primary
    }

    async fn search(&self, query: &str, cancel: &CancellationToken) -> ProviderResponse {
        self.fetch_primary_autocomplete(query, cancel).await
    }

    async fn details(&self, external_id: &str, cancel: &CancellationToken) -> Option<GeocodeResult> {
        self.fetch_primary_details(external_id, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn autocomplete(body: serde_json::Value) -> AutocompleteResponse {
        serde_json::from_value(body).unwrap()
    }

    fn details(body: serde_json::Value) -> DetailsResponse {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn parses_predictions_in_provider_order() {
        let body = autocomplete(serde_json::json!({
            "status": "OK",
            "predictions": [
                {
                    "description": "Avenida Providencia 1234, Providencia, Región Metropolitana, Chile",
                    "place_id": "ChIJ-first"
                },
                {
                    "description": "Providencia 1234, Ñuñoa, Región Metropolitana, Chile",
                    "place_id": "ChIJ-second"
                }
            ]
        }));
        let candidates = parse_autocomplete(body, 12).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].label, "Avenida Providencia 1234, Providencia");
        assert_eq!(candidates[0].external_id.as_deref(), Some("ChIJ-first"));
        assert_eq!(candidates[0].source, CandidateSource::Primary);
        assert!(candidates[0].coordinates.is_none());
        assert!(candidates[0].score.is_none());
        assert_eq!(candidates[1].label, "Providencia 1234, Ñuñoa");
    }

    #[test]
    fn caps_predictions() {
        let predictions: Vec<serde_json::Value> = (0..20)
            .map(|i| {
                serde_json::json!({
                    "description": format!("Calle {i}"),
                    "place_id": i.to_string(),
                })
            })
            .collect();
        let body = autocomplete(serde_json::json!({"status": "OK", "predictions": predictions}));
        assert_eq!(parse_autocomplete(body, 12).unwrap().len(), 12);
    }

    #[test]
    fn zero_results_is_an_answer() {
        let body = autocomplete(serde_json::json!({"status": "ZERO_RESULTS", "predictions": []}));
        assert!(parse_autocomplete(body, 12).unwrap().is_empty());
    }

    #[test]
    fn denied_request_is_an_error() {
        let body = autocomplete(serde_json::json!({
            "status": "REQUEST_DENIED",
            "error_message": "The provided API key is invalid.",
            "predictions": []
        }));
        let err = parse_autocomplete(body, 12).unwrap_err();
        assert!(matches!(err, GeocodeError::Status { .. }));
        assert!(err.to_string().contains("REQUEST_DENIED"));
    }

    #[test]
    fn over_query_limit_is_rate_limited() {
        let body = autocomplete(serde_json::json!({"status": "OVER_QUERY_LIMIT"}));
        assert!(matches!(
            parse_autocomplete(body, 12),
            Err(GeocodeError::RateLimited)
        ));
    }

    #[test]
    fn parses_details_coordinates() {
        let body = details(serde_json::json!({
            "status": "OK",
            "result": {
                "geometry": {"location": {"lat": -33.4263, "lng": -70.6170}},
                "formatted_address": "Av. Providencia 1234, 7500000 Providencia, Región Metropolitana, Chile",
                "place_id": "ChIJ-first"
            }
        }));
        let result = parse_details(body, "ChIJ-first").unwrap().unwrap();
        assert!((result.coordinates.latitude - -33.4263).abs() < 1e-6);
        assert!((result.coordinates.longitude - -70.6170).abs() < 1e-6);
        assert_eq!(result.formatted, "Av. Providencia 1234, 7500000 Providencia");
        assert_eq!(result.external_id.as_deref(), Some("ChIJ-first"));
    }

    #[test]
    fn details_not_found_is_none() {
        let body = details(serde_json::json!({"status": "NOT_FOUND"}));
        assert!(parse_details(body, "gone").unwrap().is_none());
    }

    #[test]
    fn details_missing_result_is_parse_error() {
        let body = details(serde_json::json!({"status": "OK"}));
        assert!(matches!(
            parse_details(body, "x"),
            Err(GeocodeError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn blank_input_skips_the_network() {
        let client = GooglePlacesClient::new(
            reqwest::Client::new(),
            GooglePlacesConfig {
                autocomplete_url: "http://127.0.0.1:9/unreachable".to_string(),
                details_url: "http://127.0.0.1:9/unreachable".to_string(),
                country: "cl".to_string(),
                language: "es".to_string(),
                max_results: 12,
                api_key: "test".to_string(),
                timeout: Duration::from_secs(1),
            },
        );
        let response = client
            .fetch_primary_autocomplete("   ", &CancellationToken::new())
            .await;
        assert!(response.is_answered());
        assert!(response.is_empty());
    }

    #[tokio::test]
    async fn cancelled_autocomplete_is_unavailable() {
        let client = GooglePlacesClient::new(
            reqwest::Client::new(),
            GooglePlacesConfig {
                autocomplete_url: "http://127.0.0.1:9/unreachable".to_string(),
                details_url: "http://127.0.0.1:9/unreachable".to_string(),
                country: "cl".to_string(),
                language: "es".to_string(),
                max_results: 12,
                api_key: "test".to_string(),
                timeout: Duration::from_secs(1),
            },
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        let response = client.fetch_primary_autocomplete("Providencia", &cancel).await;
        assert_eq!(response, ProviderResponse::unavailable());
    }
}

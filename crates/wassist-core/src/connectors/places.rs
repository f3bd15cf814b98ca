use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{check_status, http_client, ConnectorResult, PlaceSearch};
use crate::config::PlacesConfig;
use crate::error::ConnectorError;

const PLACES_API_BASE: &str = "https://maps.googleapis.com/maps/api/place";
const MAX_RESULTS: usize = 5;
const DETAIL_FIELDS: &str =
    "name,formatted_address,formatted_phone_number,website,rating,opening_hours";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceResult {
    pub name: String,
    pub address: Option<String>,
    pub rating: Option<f64>,
    pub place_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceDetails {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub rating: Option<f64>,
    pub opening_hours: Vec<String>,
}

/// Locations that add nothing to a text query.
fn is_vague_location(location: &str) -> bool {
    matches!(
        location.trim().to_lowercase().as_str(),
        "" | "near me" | "null" | "none"
    )
}

/// `"{query} in {location}"`, or just the query for vague locations.
pub fn place_search_query(query: &str, location: Option<&str>) -> String {
    match location {
        Some(loc) if !is_vague_location(loc) => format!("{query} in {}", loc.trim()),
        _ => query.to_string(),
    }
}

#[derive(Deserialize)]
struct TextSearchResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<TextSearchResult>,
}

#[derive(Deserialize)]
struct TextSearchResult {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    formatted_address: Option<String>,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    place_id: Option<String>,
}

#[derive(Deserialize)]
struct DetailsResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    result: Option<DetailsResult>,
}

#[derive(Deserialize)]
struct DetailsResult {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    formatted_address: Option<String>,
    #[serde(default)]
    formatted_phone_number: Option<String>,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    opening_hours: Option<OpeningHours>,
}

#[derive(Deserialize)]
struct OpeningHours {
    #[serde(default)]
    weekday_text: Vec<String>,
}

/// The Places API reports failures in a 200 body.
fn check_api_status(status: &str, message: Option<String>) -> ConnectorResult<()> {
    let detail = || match &message {
        Some(m) => format!("{status}: {m}"),
        None => status.to_string(),
    };
    match status {
        "OK" | "ZERO_RESULTS" => Ok(()),
        "REQUEST_DENIED" => Err(ConnectorError::PermissionDenied(detail())),
        "NOT_FOUND" => Err(ConnectorError::NotFound(detail())),
        _ => Err(ConnectorError::Other(detail())),
    }
}

pub struct GooglePlaces {
    api_key: String,
    radius_m: u32,
    api_base: String,
    client: reqwest::Client,
}

impl GooglePlaces {
    pub fn new(api_key: impl Into<String>, radius_m: u32, timeout: Duration) -> Self {
        Self {
            api_key: api_key.into(),
            radius_m,
            api_base: PLACES_API_BASE.to_string(),
            client: http_client(timeout),
        }
    }

    pub fn from_config(config: &PlacesConfig, timeout: Duration) -> Self {
        let places = Self::new(&config.api_key, config.radius_m, timeout);
        match &config.api_base {
            Some(base) => places.with_api_base(base),
            None => places,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    async fn text_search(&self, query: &str) -> ConnectorResult<Vec<TextSearchResult>> {
        let resp = self
            .client
            .get(format!("{}/textsearch/json", self.api_base))
            .query(&[
                ("query", query.to_string()),
                ("key", self.api_key.clone()),
                ("radius", self.radius_m.to_string()),
            ])
            .send()
            .await?;
        let parsed: TextSearchResponse = check_status(resp).await?.json().await?;
        check_api_status(&parsed.status, parsed.error_message)?;
        Ok(parsed.results)
    }
}

#[async_trait]
impl PlaceSearch for GooglePlaces {
    async fn search(
        &self,
        query: &str,
        location: Option<&str>,
    ) -> ConnectorResult<Vec<PlaceResult>> {
        let query = place_search_query(query, location);
        tracing::debug!(query = %query, "places text search");
        let results = self.text_search(&query).await?;
        Ok(results
            .into_iter()
            .take(MAX_RESULTS)
            .map(|r| PlaceResult {
                name: r.name.unwrap_or_else(|| "Unknown".to_string()),
                address: r.formatted_address,
                rating: r.rating,
                place_id: r.place_id,
            })
            .collect())
    }

    async fn details(&self, query: &str) -> ConnectorResult<Option<PlaceDetails>> {
        let best = self.text_search(query).await?.into_iter().next();
        let Some(place_id) = best.and_then(|r| r.place_id) else {
            return Ok(None);
        };
        let resp = self
            .client
            .get(format!("{}/details/json", self.api_base))
            .query(&[
                ("place_id", place_id.as_str()),
                ("fields", DETAIL_FIELDS),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;
        let parsed: DetailsResponse = check_status(resp).await?.json().await?;
        check_api_status(&parsed.status, parsed.error_message)?;
        Ok(parsed.result.map(|r| PlaceDetails {
            name: r.name.unwrap_or_else(|| "Unknown".to_string()),
            address: r.formatted_address,
            phone: r.formatted_phone_number,
            website: r.website,
            rating: r.rating,
            opening_hours: r.opening_hours.map(|h| h.weekday_text).unwrap_or_default(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn query_combines_specific_locations_only() {
        assert_eq!(
            place_search_query("best pizza", Some("Downtown Dubai")),
            "best pizza in Downtown Dubai"
        );
        assert_eq!(place_search_query("sushi spots", Some("Near Me")), "sushi spots");
        assert_eq!(place_search_query("sushi spots", Some("null")), "sushi spots");
        assert_eq!(place_search_query("sushi spots", None), "sushi spots");
    }

    fn places(server: &MockServer) -> GooglePlaces {
        GooglePlaces::new("key", 5000, Duration::from_secs(5)).with_api_base(server.uri())
    }

    fn results(n: usize) -> serde_json::Value {
        let items: Vec<_> = (0..n)
            .map(|i| {
                serde_json::json!({
                    "name": format!("Cafe {i}"),
                    "formatted_address": format!("{i} Marina Walk"),
                    "rating": 4.5,
                    "place_id": format!("p{i}")
                })
            })
            .collect();
        serde_json::json!({ "status": "OK", "results": items })
    }

    #[tokio::test]
    async fn search_returns_top_five() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/textsearch/json"))
            .and(query_param("query", "coffee shops in Dubai Marina"))
            .and(query_param("radius", "5000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(results(8)))
            .expect(1)
            .mount(&server)
            .await;

        let found = places(&server)
            .search("coffee shops", Some("Dubai Marina"))
            .await
            .unwrap();
        assert_eq!(found.len(), 5);
        assert_eq!(found[0].name, "Cafe 0");
        assert_eq!(found[0].rating, Some(4.5));
    }

    #[tokio::test]
    async fn zero_results_is_empty_not_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": "ZERO_RESULTS", "results": []})),
            )
            .mount(&server)
            .await;

        assert!(places(&server).search("x", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn denied_key_is_permission_denied() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "REQUEST_DENIED",
                "error_message": "The provided API key is invalid."
            })))
            .mount(&server)
            .await;

        let err = places(&server).search("x", None).await.unwrap_err();
        assert!(matches!(err, ConnectorError::PermissionDenied(ref d) if d.contains("invalid")));
    }

    #[tokio::test]
    async fn details_follow_best_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/textsearch/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(results(2)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/details/json"))
            .and(query_param("place_id", "p0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OK",
                "result": {
                    "name": "Cafe 0",
                    "formatted_address": "0 Marina Walk",
                    "formatted_phone_number": "04 123 4567",
                    "website": "https://cafe0.example",
                    "rating": 4.5,
                    "opening_hours": {"weekday_text": ["Monday: 8:00 AM – 10:00 PM"]}
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let details = places(&server).details("Cafe 0").await.unwrap().unwrap();
        assert_eq!(details.phone.as_deref(), Some("04 123 4567"));
        assert_eq!(details.opening_hours.len(), 1);
    }
}

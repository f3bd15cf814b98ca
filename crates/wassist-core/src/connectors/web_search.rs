use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{check_status, http_client, ConnectorResult, WebSearch};
use crate::config::WebSearchConfig;

const BRAVE_SEARCH_URL: &str = "https://api.search.brave.com/res/v1/web/search";
const DEFAULT_COUNT: u32 = 5;

pub struct BraveWebSearch {
    api_key: String,
    endpoint: String,
    count: u32,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct BraveSearchResponse {
    web: Option<BraveWebResults>,
}

#[derive(Deserialize)]
struct BraveWebResults {
    results: Vec<BraveWebResult>,
}

#[derive(Deserialize)]
struct BraveWebResult {
    title: String,
    url: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    age: Option<String>,
}

impl BraveWebSearch {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: BRAVE_SEARCH_URL.to_string(),
            count: DEFAULT_COUNT,
            client: http_client(timeout),
        }
    }

    /// `None` when search is disabled or has no key.
    pub fn from_config(config: &WebSearchConfig, timeout: Duration) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let key = config.api_key.as_deref().filter(|k| !k.trim().is_empty())?;
        let search = Self::new(key, timeout);
        Some(match &config.api_base {
            Some(endpoint) => search.with_endpoint(endpoint),
            None => search,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

// Brave highlights matches with <strong> tags.
fn strip_markup(text: &str) -> String {
    text.replace("<strong>", "").replace("</strong>", "")
}

fn format_results(query: &str, results: &[BraveWebResult]) -> String {
    if results.is_empty() {
        return format!("🔍 No results found for: {query}");
    }
    let mut output = format!("🔍 Search results for: {query}\n\n");
    for (i, r) in results.iter().enumerate() {
        output.push_str(&format!("{}. {}\n", i + 1, strip_markup(&r.title)));
        if !r.description.is_empty() {
            output.push_str(&format!("{}\n", strip_markup(&r.description)));
        }
        if let Some(age) = &r.age {
            output.push_str(&format!("🕐 {age}\n"));
        }
        output.push_str(&format!("🔗 {}\n\n", r.url));
    }
    output.trim_end().to_string()
}

#[async_trait]
impl WebSearch for BraveWebSearch {
    async fn search(&self, query: &str) -> ConnectorResult<String> {
        let resp = self
            .client
            .get(&self.endpoint)
            .header("X-Subscription-Token", &self.api_key)
            .header("Accept", "application/json")
            .query(&[("q", query.to_string()), ("count", self.count.to_string())])
            .send()
            .await?;
        let parsed: BraveSearchResponse = check_status(resp).await?.json().await?;
        let results = parsed.web.map(|w| w.results).unwrap_or_default();
        Ok(format_results(query, &results))
    }
}

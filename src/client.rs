//! WorldCat HTTP client with transparent request caching.
//!
//! Every request goes through the [`RequestCache`]: a cached key is never
//! requested again, and every fresh response is written to the cache file
//! before it is returned.

use crate::cache::{unique_request_key, CachedResponse, RequestCache, PRIVATE_KEYS};
use crate::error::{HoldingsError, Result};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info, warn};

/// WorldCat service root
pub const DEFAULT_BASE_URL: &str = "http://www.worldcat.org";

/// User agent string for requests
const USER_AGENT: &str = "worldcat-holdings/0.1";

/// Response fragments known to break JSON parsing: personal names wrapped in
/// unescaped double quotes inside string values.
pub const PROBLEMATIC_JSON_SNIPPETS: &[&str] = &[
    "\"Mario Gattullo\"",
    "\"Lucian Blaga\"",
    "\"Antonio Pigliaru\"",
    "\"Walter Bigiavi\"",
    "\"Roberto Ruffilli\"",
];

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WorldCat Search API key (never cached)
    pub wskey: String,
    /// Service root, e.g. `http://www.worldcat.org`
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(wskey: impl Into<String>) -> Self {
        Self {
            wskey: wskey.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// WorldCat client owning the request cache
pub struct WorldCatClient {
    client: reqwest::Client,
    wskey: String,
    base_url: String,
    cache: RequestCache,
}

impl WorldCatClient {
    /// Create a new WorldCatClient
    pub fn new(config: ClientConfig, cache: RequestCache) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| HoldingsError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            wskey: config.wskey,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cache,
        })
    }

    /// Absolute URL for a service path
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn cache(&self) -> &RequestCache {
        &self.cache
    }

    /// Query a WorldCat web service, using the cache when possible.
    ///
    /// The API key is added here and kept out of the cache key. Responses
    /// requested with `format=json` are repaired and stored parsed; anything
    /// else is stored as text.
    ///
    /// # Errors
    ///
    /// Returns [`HoldingsError::ApiLimit`] on HTTP 403. Nothing is cached in that case.
    pub async fn get_cached(&mut self, url: &str, params: &[(&str, String)]) -> Result<CachedResponse> {
        let mut full_params: Vec<(&str, String)> = Vec::with_capacity(params.len() + 1);
        full_params.push(("wskey", self.wskey.clone()));
        full_params.extend(params.iter().cloned());

        let key = unique_request_key(url, &full_params, PRIVATE_KEYS);
        if let Some(cached) = self.cache.get(&key) {
            debug!(key = %key, "Cache hit");
            return Ok(cached.clone());
        }

        debug!(key = %key, "Requesting new data");
        let response = self.client.get(url).query(&full_params).send().await?;
        let status = response.status();

        if status == StatusCode::FORBIDDEN {
            warn!(url = url, "Reached API limit");
            return Err(HoldingsError::ApiLimit);
        }

        let body = response.text().await?;
        let wants_json = params.iter().any(|(_, value)| value == "json");

        let data = if wants_json {
            match serde_json::from_str(&repair_json(&body)) {
                Ok(value) => CachedResponse::Json(value),
                Err(e) if status.is_success() => {
                    return Err(HoldingsError::Parse(format!("Invalid JSON from {}: {}", url, e)));
                }
                Err(_) => return Err(api_error(status)),
            }
        } else if status.is_success() {
            CachedResponse::Text(body)
        } else {
            return Err(api_error(status));
        };

        self.cache.insert(key, data.clone())?;
        Ok(data)
    }

    /// Fetch a plain web page (no API key, no parameters), using the cache when possible
    pub async fn get_page(&mut self, url: &str) -> Result<String> {
        if let Some(cached) = self.cache.get(url) {
            debug!(url = url, "Cache hit");
            if let Some(text) = cached.as_text() {
                return Ok(text.to_string());
            }
        }

        info!(url = url, "Fetching page");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status));
        }

        let body = response.text().await?;
        self.cache.insert(url.to_string(), CachedResponse::Text(body.clone()))?;
        Ok(body)
    }
}

fn api_error(status: StatusCode) -> HoldingsError {
    HoldingsError::Api {
        code: status.as_u16(),
        message: format!("WorldCat request failed: {}", status),
    }
}

/// Strip the inner quotes from known malformed snippets so the body parses
pub fn repair_json(body: &str) -> String {
    let mut repaired = body.to_string();
    for snippet in PROBLEMATIC_JSON_SNIPPETS {
        if repaired.contains(snippet) {
            repaired = repaired.replace(snippet, &snippet.replace('"', ""));
        }
    }
    repaired
}

//! Persistent request/response cache.
//!
//! Every WorldCat response and scraped page is stored in a flat JSON file keyed
//! by a normalized request string, so a run can be repeated or resumed after
//! hitting the API limit without re-requesting anything already seen. The file
//! is rewritten in full on every insert, through a sibling temp file that is
//! renamed over it, so an interrupted write never leaves a truncated cache.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default cache file name, relative to the working directory
pub const DEFAULT_CACHE_FILE: &str = "worldcat_search_cache.json";

/// Parameter names left out of cache keys
pub const PRIVATE_KEYS: &[&str] = &["wskey"];

/// A cached response body.
///
/// JSON API responses are stored parsed; XML and HTML bodies are stored as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CachedResponse {
    Text(String),
    Json(serde_json::Value),
}

impl CachedResponse {
    /// Borrow the body as text, if it was stored as text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CachedResponse::Text(s) => Some(s),
            CachedResponse::Json(_) => None,
        }
    }

    /// Borrow the body as parsed JSON, if it was stored as JSON
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            CachedResponse::Json(v) => Some(v),
            CachedResponse::Text(_) => None,
        }
    }
}

/// Build the cache key for a request.
///
/// Parameters are sorted by name, private ones (the API key) are dropped, and
/// the rest are rendered `name-value`, joined with `&` and appended to the base
/// URL after a `?`. A request without parameters is keyed by its bare URL.
pub fn unique_request_key(base_url: &str, params: &[(&str, String)], private_keys: &[&str]) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by_key(|(name, _)| *name);

    let fields = sorted
        .into_iter()
        .filter(|(name, _)| !private_keys.contains(name))
        .map(|(name, value)| format!("{}-{}", name, value))
        .collect::<Vec<_>>()
        .join("&");

    if fields.is_empty() {
        base_url.to_string()
    } else {
        format!("{}?{}", base_url, fields)
    }
}

/// Flat-file request cache
pub struct RequestCache {
    path: PathBuf,
    entries: BTreeMap<String, CachedResponse>,
}

impl RequestCache {
    /// Load the cache from `path`.
    ///
    /// Returns an empty cache if the file doesn't exist or is invalid
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = if !path.exists() {
            debug!("Cache file not found: {:?}", path);
            BTreeMap::new()
        } else {
            match std::fs::read_to_string(&path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(entries) => entries,
                    Err(e) => {
                        warn!("Failed to parse cache file: {}", e);
                        BTreeMap::new()
                    }
                },
                Err(e) => {
                    warn!("Failed to read cache file: {}", e);
                    BTreeMap::new()
                }
            }
        };

        info!(entries = entries.len(), path = ?path, "Loaded request cache");
        Self { path, entries }
    }

    /// Get the cache file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&CachedResponse> {
        self.entries.get(key)
    }

    /// Store a response and rewrite the cache file
    pub fn insert(&mut self, key: String, value: CachedResponse) -> Result<()> {
        self.entries.insert(key, value);
        self.save()
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.entries)?;
        let temp = self.temp_path();
        std::fs::write(&temp, content)?;
        std::fs::rename(&temp, &self.path)?;
        debug!(entries = self.entries.len(), "Saved request cache");
        Ok(())
    }

    /// Drop all entries and remove the cache file
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            info!("Cleared cache at {:?}", self.path);
        }
        Ok(())
    }

    /// Count entries stored as JSON and as text
    pub fn stats(&self) -> (usize, usize) {
        let json = self.entries.values().filter(|v| v.as_json().is_some()).count();
        (json, self.entries.len() - json)
    }
}

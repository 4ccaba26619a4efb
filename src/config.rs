use std::path::PathBuf;
use std::time::Duration;

use crate::constants::fetch::{
    DEFAULT_BATCH_COUNT, DEFAULT_BATCH_DELAY_MS, DEFAULT_ORDINARY_URL,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SOURCE_HEADERS, DEFAULT_SPECIAL_URL,
};
use crate::constants::{env, location};
use crate::data::Category;
use crate::errors::PoolError;
use crate::store::FileBlobStore;

/// Runtime settings for fetching, enrichment, persistence, and the update trigger.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Sequential requests per category and cycle.
    pub batch_count: usize,
    /// Pause between consecutive requests of one category.
    pub batch_delay: Duration,
    /// Timeout applied to every outbound HTTP call.
    pub request_timeout: Duration,
    /// Listing URL for the ordinary category.
    pub ordinary_url: String,
    /// Listing URL for the special category.
    pub special_url: String,
    /// Headers sent with every listing request.
    pub source_headers: Vec<(String, String)>,
    /// Session cookie for ordinary listing requests.
    pub ordinary_cookie: Option<String>,
    /// Session cookie for special listing requests.
    pub special_cookie: Option<String>,
    /// Location lookup endpoint.
    pub location_endpoint: String,
    /// Credential for the location lookup service; required to enrich.
    pub location_app_code: Option<String>,
    /// Expected bearer token for the update trigger; `None` is a server misconfiguration.
    pub update_token: Option<String>,
    /// File-backed blob store location.
    pub store_path: PathBuf,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            batch_count: DEFAULT_BATCH_COUNT,
            batch_delay: Duration::from_millis(DEFAULT_BATCH_DELAY_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            ordinary_url: DEFAULT_ORDINARY_URL.to_string(),
            special_url: DEFAULT_SPECIAL_URL.to_string(),
            source_headers: DEFAULT_SOURCE_HEADERS
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            ordinary_cookie: None,
            special_cookie: None,
            location_endpoint: location::DEFAULT_LOOKUP_ENDPOINT.to_string(),
            location_app_code: None,
            update_token: None,
            store_path: FileBlobStore::default_path(),
        }
    }
}

impl PoolConfig {
    /// Defaults overlaid with `NUMBER_POOL_*` environment variables.
    pub fn from_env() -> Result<Self, PoolError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`. Blank values are ignored.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PoolError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = get(env::ORDINARY_URL) {
            config.ordinary_url = url;
        }
        if let Some(url) = get(env::SPECIAL_URL) {
            config.special_url = url;
        }
        if let Some(endpoint) = get(env::LOCATION_ENDPOINT) {
            config.location_endpoint = endpoint;
        }
        if let Some(path) = get(env::STORE_PATH) {
            config.store_path = PathBuf::from(path);
        }
        if let Some(raw) = get(env::BATCH_COUNT) {
            config.batch_count = parse_number(env::BATCH_COUNT, &raw)?;
        }
        if let Some(raw) = get(env::BATCH_DELAY_MS) {
            config.batch_delay = Duration::from_millis(parse_number(env::BATCH_DELAY_MS, &raw)?);
        }
        config.ordinary_cookie = get(env::ORDINARY_COOKIE);
        config.special_cookie = get(env::SPECIAL_COOKIE);
        config.location_app_code = get(env::LOCATION_APP_CODE);
        config.update_token = get(env::UPDATE_TOKEN);
        Ok(config)
    }

    /// Listing URL for `category`.
    pub fn url_for(&self, category: Category) -> &str {
        match category {
            Category::Ordinary => &self.ordinary_url,
            Category::Special => &self.special_url,
        }
    }

    /// Session cookie for `category`, when configured.
    pub fn cookie_for(&self, category: Category) -> Option<&str> {
        match category {
            Category::Ordinary => self.ordinary_cookie.as_deref(),
            Category::Special => self.special_cookie.as_deref(),
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, PoolError> {
    raw.trim()
        .parse()
        .map_err(|_| PoolError::Configuration(format!("{key} must be a non-negative integer, got '{raw}'")))
}

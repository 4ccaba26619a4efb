use std::time::Duration;

use serde_json::Value;
use tracing::debug;
use ureq::Agent;

use crate::constants::fetch::{DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SOURCE_HEADERS};
use crate::data::RawCandidate;
use crate::errors::PoolError;
use crate::source::CandidateSource;
use crate::types::SourceId;

/// Settings for one upstream listing endpoint.
#[derive(Clone, Debug)]
pub struct HttpSourceConfig {
    /// Identifier used in logs and errors.
    pub source_id: SourceId,
    /// Full listing URL, query string included.
    pub url: String,
    /// Session cookie sent with every request, when set.
    pub cookie: Option<String>,
    /// Headers attached to every request.
    pub headers: Vec<(String, String)>,
    /// Timeout for each request.
    pub timeout: Duration,
}

impl HttpSourceConfig {
    /// Config with the default browser-like headers and request timeout.
    pub fn new(source_id: impl Into<SourceId>, url: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            url: url.into(),
            cookie: None,
            headers: DEFAULT_SOURCE_HEADERS
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Attach `cookie` unless it is blank.
    pub fn with_cookie(mut self, cookie: Option<String>) -> Self {
        self.cookie = cookie.filter(|value| !value.trim().is_empty());
        self
    }
}

/// Listing source that GETs a JSON envelope `{"data": [...]}`.
pub struct HttpCandidateSource {
    config: HttpSourceConfig,
    agent: Agent,
}

impl HttpCandidateSource {
    /// Source issuing requests per `config`.
    pub fn new(config: HttpSourceConfig) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .build()
            .into();
        Self { config, agent }
    }

    /// Settings this source was built with.
    pub fn config(&self) -> &HttpSourceConfig {
        &self.config
    }

    fn unavailable(&self, reason: String) -> PoolError {
        PoolError::SourceUnavailable {
            source_id: self.config.source_id.clone(),
            reason,
        }
    }

    /// Extract candidates from a listing body.
    ///
    /// A missing or non-array `data` field is an empty batch; non-object
    /// entries are dropped.
    pub fn parse_listing(&self, body: &str) -> Result<Vec<RawCandidate>, PoolError> {
        let json: Value = serde_json::from_str(body)
            .map_err(|err| self.unavailable(format!("failed parsing listing response: {err}")))?;
        let items = match json.get("data") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        Ok(items
            .into_iter()
            .filter_map(RawCandidate::from_value)
            .collect())
    }
}

impl CandidateSource for HttpCandidateSource {
    fn id(&self) -> &str {
        &self.config.source_id
    }

    fn fetch_batch(&self) -> Result<Vec<RawCandidate>, PoolError> {
        let mut request = self.agent.get(&self.config.url);
        for (name, value) in &self.config.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(cookie) = &self.config.cookie {
            request = request.header("Cookie", cookie.as_str());
        }

        let response = request
            .call()
            .map_err(|err| self.unavailable(format!("failed querying listing endpoint: {err}")))?;
        let body = response
            .into_body()
            .read_to_string()
            .map_err(|err| self.unavailable(format!("failed reading listing body: {err}")))?;

        let candidates = self.parse_listing(&body)?;
        debug!(
            source = self.id(),
            count = candidates.len(),
            "listing response parsed"
        );
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_one_shot_http;

    #[test]
    fn fetch_batch_parses_envelope_and_sends_headers() {
        let (url, handle) = spawn_one_shot_http(
            200,
            r#"{"data":[{"number":"85290001111","mcNumber":"13800001111"},"junk"]}"#,
        );
        let source = HttpCandidateSource::new(
            HttpSourceConfig::new("ordinary", format!("{url}/list?queryFlag=4"))
                .with_cookie(Some("JSESSIONID=abc".into())),
        );
        let batch = source.fetch_batch().unwrap();
        let request = handle.join().unwrap();

        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].fields()["number"], "85290001111");
        assert!(request.starts_with("GET /list?queryFlag=4 "));
        assert!(request.to_ascii_lowercase().contains("cookie: jsessionid=abc"));
        assert!(request.to_ascii_lowercase().contains("referer: "));
    }

    #[test]
    fn http_error_status_is_source_unavailable() {
        let (url, handle) = spawn_one_shot_http(503, "{}");
        let source = HttpCandidateSource::new(HttpSourceConfig::new("special", url));
        let err = source.fetch_batch().unwrap_err();
        handle.join().unwrap();
        assert!(matches!(
            err,
            PoolError::SourceUnavailable { ref source_id, .. } if source_id == "special"
        ));
    }

    #[test]
    fn parse_listing_tolerates_missing_data() {
        let source = HttpCandidateSource::new(HttpSourceConfig::new("ordinary", "http://unused"));
        assert!(source.parse_listing(r#"{"code":0}"#).unwrap().is_empty());
        assert!(source.parse_listing(r#"{"data":null}"#).unwrap().is_empty());
        assert!(source.parse_listing("not json").is_err());
    }

    #[test]
    fn blank_cookie_is_dropped() {
        let config = HttpSourceConfig::new("ordinary", "http://unused").with_cookie(Some("  ".into()));
        assert!(config.cookie.is_none());
    }
}

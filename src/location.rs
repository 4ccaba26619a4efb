//! Area-prefix location lookup with a persisted, lazily loaded memo.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use ureq::Agent;

use crate::constants::location::{APPCODE_SCHEME, AREA_PREFIX_LEN, LOOKUP_SUCCESS_RET};
use crate::constants::store::LOCATION_CACHE_KEY;
use crate::data::LocationEntry;
use crate::errors::PoolError;
use crate::store::BlobStore;
use crate::types::AreaPrefix;

const LOOKUP_SOURCE_ID: &str = "location";

/// First seven characters of `secondary_id`, or `None` when it is shorter.
pub fn area_prefix(secondary_id: &str) -> Option<AreaPrefix> {
    let prefix: String = secondary_id.chars().take(AREA_PREFIX_LEN).collect();
    (prefix.chars().count() == AREA_PREFIX_LEN).then_some(prefix)
}

/// External province/city resolver.
pub trait LocationLookup: Send + Sync {
    /// Resolve the location of `secondary_id`. Any failure is an error.
    fn lookup(&self, secondary_id: &str) -> Result<LocationEntry, PoolError>;
}

/// Lookup against the HTTP mobile-number location endpoint.
pub struct HttpLocationLookup {
    endpoint: String,
    app_code: String,
    agent: Agent,
}

impl HttpLocationLookup {
    /// Build a lookup client. A missing or blank app code is a configuration error.
    pub fn new(
        endpoint: impl Into<String>,
        app_code: Option<String>,
        timeout: Duration,
    ) -> Result<Self, PoolError> {
        let app_code = app_code
            .filter(|code| !code.trim().is_empty())
            .ok_or_else(|| {
                PoolError::Configuration("location lookup app code is not set".into())
            })?;
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Ok(Self {
            endpoint: endpoint.into(),
            app_code,
            agent,
        })
    }

    fn unavailable(reason: String) -> PoolError {
        PoolError::SourceUnavailable {
            source_id: LOOKUP_SOURCE_ID.into(),
            reason,
        }
    }

    /// Decode a lookup response envelope `{"ret": 200, "data": {"prov", "city"}}`.
    pub fn parse_response(secondary_id: &str, body: &str) -> Result<LocationEntry, PoolError> {
        let json: Value = serde_json::from_str(body)
            .map_err(|err| Self::unavailable(format!("failed parsing lookup response: {err}")))?;
        let ret = json.get("ret").and_then(Value::as_i64);
        if ret != Some(LOOKUP_SUCCESS_RET) {
            return Err(Self::unavailable(format!(
                "lookup returned non-success ret {ret:?}"
            )));
        }
        let field = |name: &str| {
            json.get("data")
                .and_then(|data| data.get(name))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let (Some(province), Some(city)) = (field("prov"), field("city")) else {
            return Err(Self::unavailable(
                "lookup response missing prov or city".into(),
            ));
        };
        let area_prefix = area_prefix(secondary_id).unwrap_or_else(|| secondary_id.to_string());
        Ok(LocationEntry {
            area_prefix,
            province,
            city,
        })
    }
}

impl LocationLookup for HttpLocationLookup {
    fn lookup(&self, secondary_id: &str) -> Result<LocationEntry, PoolError> {
        let authorization = format!("{APPCODE_SCHEME} {}", self.app_code);
        let response = self
            .agent
            .get(&self.endpoint)
            .query("number", secondary_id)
            .header("Authorization", authorization.as_str())
            .call()
            .map_err(|err| Self::unavailable(format!("failed querying lookup endpoint: {err}")))?;
        let body = response
            .into_body()
            .read_to_string()
            .map_err(|err| Self::unavailable(format!("failed reading lookup body: {err}")))?;
        Self::parse_response(secondary_id, &body)
    }
}

/// Lookup used when no credential is configured; every call fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnconfiguredLookup;

impl LocationLookup for UnconfiguredLookup {
    fn lookup(&self, _secondary_id: &str) -> Result<LocationEntry, PoolError> {
        Err(PoolError::Configuration(
            "location lookup app code is not set".into(),
        ))
    }
}

/// Persisted shape of one cache entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct CachedLocation {
    prov: String,
    city: String,
}

type LocationMap = BTreeMap<AreaPrefix, CachedLocation>;

/// Memoizes lookups per area prefix and persists the whole map on every new entry.
pub struct LocationCache {
    blobs: Arc<dyn BlobStore>,
    lookup: Arc<dyn LocationLookup>,
    entries: OnceLock<RwLock<LocationMap>>,
}

impl LocationCache {
    /// Cache backed by `blobs`, resolving misses through `lookup`.
    pub fn new(blobs: Arc<dyn BlobStore>, lookup: Arc<dyn LocationLookup>) -> Self {
        Self {
            blobs,
            lookup,
            entries: OnceLock::new(),
        }
    }

    /// Resolve the location for `secondary_id`.
    ///
    /// Returns `None` for ids shorter than the area prefix and for failed
    /// lookups; failures leave the cache untouched.
    pub fn get(&self, secondary_id: &str) -> Option<LocationEntry> {
        let prefix = area_prefix(secondary_id)?;
        let entries = self.entries.get_or_init(|| RwLock::new(self.load_persisted()));

        if let Some(hit) = entries.read().ok()?.get(&prefix) {
            return Some(LocationEntry {
                area_prefix: prefix,
                province: hit.prov.clone(),
                city: hit.city.clone(),
            });
        }

        debug!(area_prefix = %prefix, "location cache miss");
        let resolved = match self.lookup.lookup(secondary_id) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(area_prefix = %prefix, error = %err, "location lookup failed");
                return None;
            }
        };

        let mut guard = entries.write().ok()?;
        // A concurrent miss on the same prefix may have filled it meanwhile.
        if let Some(hit) = guard.get(&prefix) {
            return Some(LocationEntry {
                area_prefix: prefix,
                province: hit.prov.clone(),
                city: hit.city.clone(),
            });
        }
        guard.insert(
            prefix.clone(),
            CachedLocation {
                prov: resolved.province.clone(),
                city: resolved.city.clone(),
            },
        );
        if let Err(err) = self.persist(&guard) {
            warn!(key = LOCATION_CACHE_KEY, error = %err, "location cache write failed");
        }
        Some(LocationEntry {
            area_prefix: prefix,
            ..resolved
        })
    }

    /// Number of prefixes currently memoized.
    pub fn len(&self) -> usize {
        self.entries
            .get()
            .and_then(|entries| entries.read().ok().map(|map| map.len()))
            .unwrap_or(0)
    }

    /// `true` when nothing is memoized yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn load_persisted(&self) -> LocationMap {
        let bytes = match self.blobs.get(LOCATION_CACHE_KEY) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return LocationMap::new(),
            Err(err) => {
                warn!(key = LOCATION_CACHE_KEY, error = %err, "location cache read failed");
                return LocationMap::new();
            }
        };
        match serde_json::from_slice::<LocationMap>(&bytes) {
            Ok(map) => {
                debug!(entries = map.len(), "location cache loaded");
                map
            }
            Err(err) => {
                warn!(key = LOCATION_CACHE_KEY, error = %err, "location cache decode failed");
                LocationMap::new()
            }
        }
    }

    fn persist(&self, map: &LocationMap) -> Result<(), PoolError> {
        let bytes = serde_json::to_vec_pretty(map)?;
        self.blobs.put(LOCATION_CACHE_KEY, &bytes)
    }
}

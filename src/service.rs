//! Update trigger and read surfaces over the persisted snapshot.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use chrono::{DateTime, Utc};
use chrono::serde::ts_milliseconds;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::PoolConfig;
use crate::constants::auth::BEARER_PREFIX;
use crate::constants::fetch::{ORDINARY_SOURCE_ID, SPECIAL_SOURCE_ID};
use crate::data::{Category, NumberRecord, RawCandidate, Snapshot, now_millis};
use crate::enrichment::{enrich_active, enrich_active_category};
use crate::errors::PoolError;
use crate::location::{HttpLocationLookup, LocationCache, LocationLookup, UnconfiguredLookup};
use crate::merge::merge;
use crate::metrics::{UpdateStats, category_stats};
use crate::source::{BatchFetcher, CandidateSource, HttpCandidateSource, HttpSourceConfig};
use crate::store::{BlobStore, FileBlobStore, SnapshotStore};

/// Collaborators wired into a [`NumberService`].
pub struct ServiceComponents {
    /// Source for the ordinary category.
    pub ordinary_source: Arc<dyn CandidateSource>,
    /// Source for the special category.
    pub special_source: Arc<dyn CandidateSource>,
    /// Blob store for the snapshot and the location cache.
    pub blobs: Arc<dyn BlobStore>,
    /// Location lookup used on cache misses.
    pub lookup: Arc<dyn LocationLookup>,
    /// Batch settings for both sources.
    pub fetcher: BatchFetcher,
    /// Expected bearer token for the update trigger.
    pub update_token: Option<String>,
}

/// Structured result of an update trigger. Never an error.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UpdateResponse {
    /// `true` when the cycle completed and was persisted.
    pub success: bool,
    /// Cycle time on success, response time on failure.
    #[serde(with = "ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Wall time of the cycle, e.g. `1520ms`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    /// Per-category counts of a successful cycle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<UpdateStats>,
    /// Failure message of an unsuccessful request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// HTTP-style status: 200, 401 for bad credentials, 500 otherwise.
    #[serde(skip)]
    pub status: u16,
}

impl UpdateResponse {
    fn failure(status: u16, error: impl Into<String>) -> Self {
        Self {
            success: false,
            timestamp: now_millis(),
            duration: None,
            stats: None,
            error: Some(error.into()),
            status,
        }
    }
}

/// Active records of one category plus the snapshot's cycle time.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadResponse {
    /// Active records of the requested category.
    pub data: Vec<NumberRecord>,
    /// Time of the last successful update cycle.
    #[serde(with = "ts_milliseconds")]
    pub last_updated: DateTime<Utc>,
}

/// Owns the sources, stores, and location cache for both categories.
pub struct NumberService {
    ordinary_source: Arc<dyn CandidateSource>,
    special_source: Arc<dyn CandidateSource>,
    fetcher: BatchFetcher,
    snapshots: SnapshotStore,
    locations: Arc<LocationCache>,
    update_token: Option<String>,
    write_backs: Mutex<Vec<JoinHandle<()>>>,
}

impl NumberService {
    /// Service over explicitly supplied components.
    pub fn new(components: ServiceComponents) -> Self {
        let ServiceComponents {
            ordinary_source,
            special_source,
            blobs,
            lookup,
            fetcher,
            update_token,
        } = components;
        Self {
            ordinary_source,
            special_source,
            fetcher,
            snapshots: SnapshotStore::new(blobs.clone()),
            locations: Arc::new(LocationCache::new(blobs, lookup)),
            update_token,
            write_backs: Mutex::new(Vec::new()),
        }
    }

    /// HTTP sources and lookup from `config`, persisted in a file-backed store.
    pub fn from_config(config: &PoolConfig) -> Result<Self, PoolError> {
        let blobs: Arc<dyn BlobStore> = Arc::new(FileBlobStore::open(&config.store_path)?);
        Ok(Self::with_blob_store(config, blobs))
    }

    /// HTTP sources and lookup from `config` over an arbitrary blob store.
    ///
    /// Without a lookup credential, enrichment is disabled rather than failing.
    pub fn with_blob_store(config: &PoolConfig, blobs: Arc<dyn BlobStore>) -> Self {
        let source_for = |category: Category| -> Arc<dyn CandidateSource> {
            let source_id = match category {
                Category::Ordinary => ORDINARY_SOURCE_ID,
                Category::Special => SPECIAL_SOURCE_ID,
            };
            let mut source_config = HttpSourceConfig::new(source_id, config.url_for(category))
                .with_cookie(config.cookie_for(category).map(str::to_string));
            source_config.headers = config.source_headers.clone();
            source_config.timeout = config.request_timeout;
            Arc::new(HttpCandidateSource::new(source_config))
        };

        let lookup: Arc<dyn LocationLookup> = match HttpLocationLookup::new(
            config.location_endpoint.clone(),
            config.location_app_code.clone(),
            config.request_timeout,
        ) {
            Ok(lookup) => Arc::new(lookup),
            Err(err) => {
                warn!(error = %err, "location enrichment disabled");
                Arc::new(UnconfiguredLookup)
            }
        };

        Self::new(ServiceComponents {
            ordinary_source: source_for(Category::Ordinary),
            special_source: source_for(Category::Special),
            blobs,
            lookup,
            fetcher: BatchFetcher::new(config.batch_count, config.batch_delay),
            update_token: config.update_token.clone(),
        })
    }

    /// Location cache shared by the update and read paths.
    pub fn locations(&self) -> &LocationCache {
        &self.locations
    }

    /// Check an `Authorization` header value against the configured token.
    ///
    /// A missing configured token is a `Configuration` error, distinct from a
    /// missing or wrong credential (`Unauthorized`).
    pub fn authorize(&self, authorization: Option<&str>) -> Result<(), PoolError> {
        let Some(expected) = self.update_token.as_deref() else {
            return Err(PoolError::Configuration(
                "update token is not configured".into(),
            ));
        };
        let Some(token) = authorization.and_then(|header| header.strip_prefix(BEARER_PREFIX))
        else {
            return Err(PoolError::Unauthorized("Bearer token required".into()));
        };
        if token != expected {
            return Err(PoolError::Unauthorized("Invalid token".into()));
        }
        Ok(())
    }

    /// Authorize, run one update cycle, and report the outcome.
    pub fn trigger_update(&self, authorization: Option<&str>) -> UpdateResponse {
        let started = Instant::now();
        match self.authorize(authorization) {
            Ok(()) => {}
            Err(PoolError::Unauthorized(reason)) => {
                warn!(reason = %reason, "update trigger rejected");
                return UpdateResponse::failure(401, format!("Unauthorized: {reason}"));
            }
            Err(err) => {
                error!(error = %err, "update trigger misconfigured");
                return UpdateResponse::failure(500, "Server configuration error");
            }
        }

        match self.run_update_cycle() {
            Ok((snapshot, stats)) => {
                let duration = format!("{}ms", started.elapsed().as_millis());
                info!(
                    duration = %duration,
                    ordinary_active = stats.ordinary.active,
                    special_active = stats.special.active,
                    location_enriched = stats.location_enriched,
                    "update cycle complete"
                );
                UpdateResponse {
                    success: true,
                    timestamp: snapshot.last_updated,
                    duration: Some(duration),
                    stats: Some(stats),
                    error: None,
                    status: 200,
                }
            }
            Err(err) => {
                error!(error = %err, "update cycle failed");
                UpdateResponse::failure(500, err.to_string())
            }
        }
    }

    /// Fetch, merge, enrich, and persist both categories without authorization.
    ///
    /// Only a failed snapshot write fails the cycle.
    pub fn run_update_cycle(&self) -> Result<(Snapshot, UpdateStats), PoolError> {
        info!("update cycle starting");
        let mut snapshot = self.snapshots.load().unwrap_or_else(|| {
            info!("no prior snapshot; starting empty");
            Snapshot::empty()
        });
        let previous_ordinary = snapshot.ordinary.len();
        let previous_special = snapshot.special.len();
        let update_time = now_millis();

        let (ordinary_raw, special_raw) = self.fetch_categories();

        snapshot.ordinary = merge(
            std::mem::take(&mut snapshot.ordinary),
            &ordinary_raw,
            update_time,
        );
        snapshot.special = merge(
            std::mem::take(&mut snapshot.special),
            &special_raw,
            update_time,
        );
        snapshot.last_updated = update_time;

        let enrichment = enrich_active(&mut snapshot, &self.locations);
        self.snapshots.save(&snapshot)?;

        let stats = UpdateStats {
            ordinary: category_stats(previous_ordinary, &snapshot, Category::Ordinary),
            special: category_stats(previous_special, &snapshot, Category::Special),
            location_enriched: enrichment.enriched,
        };
        Ok((snapshot, stats))
    }

    fn fetch_categories(&self) -> (Vec<RawCandidate>, Vec<RawCandidate>) {
        let fetcher = self.fetcher;
        thread::scope(|scope| {
            let ordinary = scope.spawn(|| fetcher.fetch_all(self.ordinary_source.as_ref()));
            let special = scope.spawn(|| fetcher.fetch_all(self.special_source.as_ref()));
            (
                join_fetch(ordinary, self.ordinary_source.id()),
                join_fetch(special, self.special_source.id()),
            )
        })
    }

    /// Active records of `category`, enriched where possible.
    ///
    /// Never fails: a missing snapshot yields no records and an epoch
    /// `last_updated`. New location data is written back on a detached thread.
    pub fn read(&self, category: Category) -> ReadResponse {
        let Some(mut snapshot) = self.snapshots.load() else {
            debug!(category = %category, "read before first update; returning empty");
            return ReadResponse {
                data: Vec::new(),
                last_updated: DateTime::<Utc>::UNIX_EPOCH,
            };
        };

        let outcome = enrich_active_category(&mut snapshot, category, &self.locations);
        let response = ReadResponse {
            data: snapshot.active(category),
            last_updated: snapshot.last_updated,
        };
        if outcome.has_updates() {
            self.spawn_write_back(snapshot);
        }
        response
    }

    fn spawn_write_back(&self, snapshot: Snapshot) {
        let snapshots = self.snapshots.clone();
        let spawned = thread::Builder::new()
            .name("snapshot-write-back".into())
            .spawn(move || {
                if let Err(err) = snapshots.save(&snapshot) {
                    error!(error = %err, "snapshot write-back failed");
                }
            });
        match spawned {
            Ok(handle) => match self.write_backs.lock() {
                Ok(mut handles) => {
                    handles.retain(|handle| !handle.is_finished());
                    handles.push(handle);
                }
                Err(_) => warn!("write-back handle list poisoned; write-back left detached"),
            },
            Err(err) => error!(error = %err, "failed spawning snapshot write-back"),
        }
    }

    /// Wait for every pending background write-back.
    pub fn flush_write_backs(&self) {
        let handles = match self.write_backs.lock() {
            Ok(mut handles) => std::mem::take(&mut *handles),
            Err(_) => return,
        };
        for handle in handles {
            if handle.join().is_err() {
                warn!("snapshot write-back thread panicked");
            }
        }
    }
}

fn join_fetch(
    handle: thread::ScopedJoinHandle<'_, Vec<RawCandidate>>,
    source_id: &str,
) -> Vec<RawCandidate> {
    handle.join().unwrap_or_else(|_| {
        warn!(source = source_id, "fetch thread panicked; treating as empty");
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::LocationEntry;
    use crate::store::MemoryBlobStore;
    use serde_json::json;
    use std::time::Duration;

    struct FixedSource {
        id: &'static str,
        ids: Vec<&'static str>,
    }

    impl CandidateSource for FixedSource {
        fn id(&self) -> &str {
            self.id
        }

        fn fetch_batch(&self) -> Result<Vec<RawCandidate>, PoolError> {
            Ok(self
                .ids
                .iter()
                .map(|id| {
                    RawCandidate::from_value(json!({"number": id, "mcNumber": format!("1380000{id}")}))
                        .unwrap()
                })
                .collect())
        }
    }

    struct StaticLookup;

    impl LocationLookup for StaticLookup {
        fn lookup(&self, secondary_id: &str) -> Result<LocationEntry, PoolError> {
            Ok(LocationEntry {
                area_prefix: secondary_id.chars().take(7).collect(),
                province: "Guangdong".into(),
                city: "Shenzhen".into(),
            })
        }
    }

    fn service(token: Option<&str>, blobs: Arc<dyn BlobStore>) -> NumberService {
        NumberService::new(ServiceComponents {
            ordinary_source: Arc::new(FixedSource {
                id: "ordinary",
                ids: vec!["1001", "1002"],
            }),
            special_source: Arc::new(FixedSource {
                id: "special",
                ids: vec!["2001"],
            }),
            blobs,
            lookup: Arc::new(StaticLookup),
            fetcher: BatchFetcher::new(2, Duration::ZERO),
            update_token: token.map(str::to_string),
        })
    }

    #[test]
    fn authorize_distinguishes_misconfiguration_from_bad_credentials() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let unconfigured = service(None, blobs.clone());
        assert!(matches!(
            unconfigured.authorize(Some("Bearer x")),
            Err(PoolError::Configuration(_))
        ));

        let configured = service(Some("secret"), blobs);
        assert!(configured.authorize(Some("Bearer secret")).is_ok());
        assert!(matches!(
            configured.authorize(None),
            Err(PoolError::Unauthorized(_))
        ));
        assert!(matches!(
            configured.authorize(Some("secret")),
            Err(PoolError::Unauthorized(_))
        ));
        assert!(matches!(
            configured.authorize(Some("Bearer wrong")),
            Err(PoolError::Unauthorized(_))
        ));
    }

    #[test]
    fn rejected_trigger_does_no_work() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let svc = service(Some("secret"), blobs.clone());
        let response = svc.trigger_update(Some("Bearer nope"));
        assert!(!response.success);
        assert_eq!(response.status, 401);
        assert_eq!(response.error.as_deref(), Some("Unauthorized: Invalid token"));
        assert!(blobs.get(crate::constants::store::SNAPSHOT_KEY).unwrap().is_none());

        let misconfigured = service(None, blobs).trigger_update(Some("Bearer secret"));
        assert_eq!(misconfigured.status, 500);
        assert_eq!(misconfigured.error.as_deref(), Some("Server configuration error"));
    }

    #[test]
    fn trigger_reports_stats_and_persists() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let svc = service(Some("secret"), blobs);
        let response = svc.trigger_update(Some("Bearer secret"));
        assert!(response.success);
        assert_eq!(response.status, 200);
        let stats = response.stats.unwrap();
        assert_eq!(stats.ordinary.previous, 0);
        assert_eq!(stats.ordinary.current, 2);
        assert_eq!(stats.ordinary.new, 2);
        assert_eq!(stats.special.active, 1);
        assert_eq!(stats.location_enriched, 3);

        let read = svc.read(Category::Ordinary);
        assert_eq!(read.last_updated, response.timestamp);
        assert_eq!(read.data.len(), 2);
        assert!(read.data.iter().all(|r| r.city.as_deref() == Some("Shenzhen")));
    }

    #[test]
    fn read_before_any_update_is_empty_at_epoch() {
        let svc = service(None, Arc::new(MemoryBlobStore::new()));
        let read = svc.read(Category::Special);
        assert!(read.data.is_empty());
        assert_eq!(read.last_updated.timestamp_millis(), 0);
        let value = serde_json::to_value(&read).unwrap();
        assert_eq!(value["lastUpdated"], 0);
    }

    #[test]
    fn failure_response_serializes_without_stats() {
        let value = serde_json::to_value(UpdateResponse::failure(500, "boom")).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "boom");
        assert!(value.get("stats").is_none());
        assert!(value.get("status").is_none());
    }
}

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use number_pool::constants::store::{LOCATION_CACHE_KEY, SNAPSHOT_KEY};
use number_pool::{
    BatchFetcher, BlobStore, CandidateSource, Category, FileBlobStore, LocationEntry,
    LocationLookup, MemoryBlobStore, NumberService, PoolError, RawCandidate, ServiceComponents,
    SnapshotStore,
};
use serde_json::{Value, json};
use tempfile::tempdir;

/// Returns whatever payload is currently loaded, on every call.
#[derive(Default)]
struct SwitchableSource {
    payload: Mutex<Vec<Value>>,
    calls: AtomicUsize,
}

impl SwitchableSource {
    fn load(&self, payload: Vec<Value>) {
        *self.payload.lock().unwrap() = payload;
    }
}

impl CandidateSource for SwitchableSource {
    fn id(&self) -> &str {
        "switchable"
    }

    fn fetch_batch(&self) -> Result<Vec<RawCandidate>, PoolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .payload
            .lock()
            .unwrap()
            .iter()
            .cloned()
            .filter_map(RawCandidate::from_value)
            .collect())
    }
}

struct CountingLookup {
    calls: AtomicUsize,
}

impl LocationLookup for CountingLookup {
    fn lookup(&self, secondary_id: &str) -> Result<LocationEntry, PoolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(LocationEntry {
            area_prefix: secondary_id.chars().take(7).collect(),
            province: "Guangdong".into(),
            city: "Shenzhen".into(),
        })
    }
}

/// Accepts location cache writes but refuses snapshot writes.
#[derive(Default)]
struct SnapshotWriteFails {
    inner: MemoryBlobStore,
}

impl BlobStore for SnapshotWriteFails {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PoolError> {
        self.inner.get(key)
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), PoolError> {
        if key == SNAPSHOT_KEY {
            return Err(PoolError::Store("disk full".into()));
        }
        self.inner.put(key, bytes)
    }
}

struct Harness {
    ordinary: Arc<SwitchableSource>,
    special: Arc<SwitchableSource>,
    lookup: Arc<CountingLookup>,
    service: NumberService,
}

fn harness(blobs: Arc<dyn BlobStore>) -> Harness {
    let ordinary = Arc::new(SwitchableSource::default());
    let special = Arc::new(SwitchableSource::default());
    let lookup = Arc::new(CountingLookup {
        calls: AtomicUsize::new(0),
    });
    let service = NumberService::new(ServiceComponents {
        ordinary_source: ordinary.clone(),
        special_source: special.clone(),
        blobs,
        lookup: lookup.clone(),
        fetcher: BatchFetcher::new(3, Duration::ZERO),
        update_token: Some("secret".into()),
    });
    Harness {
        ordinary,
        special,
        lookup,
        service,
    }
}

fn pause() {
    thread::sleep(Duration::from_millis(5));
}

#[test]
fn records_keep_history_across_cycles() {
    let dir = tempdir().unwrap();
    let blobs: Arc<dyn BlobStore> = Arc::new(FileBlobStore::open(dir.path()).unwrap());
    let h = harness(blobs.clone());

    h.ordinary.load(vec![
        json!({"number": "85290000001", "mcNumber": "13800000001", "price": 1}),
        json!({"number": "85290000002", "mainlandNumber": "13900000002"}),
    ]);
    h.special.load(vec![json!({"hkNumber": "85299999999"})]);
    let first = h.service.trigger_update(Some("Bearer secret"));
    assert!(first.success, "{:?}", first.error);
    assert_eq!(h.ordinary.calls.load(Ordering::SeqCst), 3);
    assert_eq!(h.special.calls.load(Ordering::SeqCst), 3);

    pause();
    h.ordinary.load(vec![
        json!({"number": "85290000001"}),
        json!({"number": "85290000003", "mainland": "13700000003"}),
    ]);
    h.special.load(Vec::new());
    let second = h.service.trigger_update(Some("Bearer secret"));
    assert!(second.success, "{:?}", second.error);
    assert!(second.timestamp > first.timestamp);

    let stats = second.stats.unwrap();
    assert_eq!(stats.ordinary.previous, 2);
    assert_eq!(stats.ordinary.current, 3);
    assert_eq!(stats.ordinary.active, 2);
    assert_eq!(stats.ordinary.new, 1);
    assert_eq!(stats.special.previous, 1);
    assert_eq!(stats.special.current, 1);
    assert_eq!(stats.special.active, 0);

    let snapshot = SnapshotStore::new(blobs).load().unwrap();
    assert_eq!(snapshot.last_updated, second.timestamp);
    let kept = &snapshot.ordinary[0];
    assert_eq!(kept.primary_id, "85290000001");
    assert_eq!(kept.secondary_id, "13800000001");
    assert_eq!(kept.added_at, first.timestamp);
    assert_eq!(kept.last_seen_at, second.timestamp);
    assert_eq!(kept.extra.get("price"), Some(&json!(1)));

    let stale = &snapshot.ordinary[1];
    assert_eq!(stale.primary_id, "85290000002");
    assert_eq!(stale.last_seen_at, first.timestamp);
    assert!(!snapshot.is_active(stale));

    for record in snapshot.ordinary.iter().chain(snapshot.special.iter()) {
        assert!(record.added_at <= record.last_seen_at);
    }

    let read = h.service.read(Category::Ordinary);
    let ids: Vec<&str> = read.data.iter().map(|r| r.primary_id.as_str()).collect();
    assert_eq!(ids, vec!["85290000001", "85290000003"]);
    assert!(h.service.read(Category::Special).data.is_empty());
}

#[test]
fn location_cache_is_shared_and_persisted() {
    let blobs: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
    let h = harness(blobs.clone());
    h.ordinary.load(vec![
        json!({"number": "1", "mcNumber": "13800001111"}),
        json!({"number": "2", "mcNumber": "13800002222"}),
        json!({"number": "3", "mcNumber": "139"}),
    ]);
    let response = h.service.trigger_update(Some("Bearer secret"));
    assert!(response.success);
    assert_eq!(response.stats.unwrap().location_enriched, 2);
    assert!(h.lookup.calls.load(Ordering::SeqCst) >= 1);
    assert!(blobs.get(LOCATION_CACHE_KEY).unwrap().is_some());

    pause();
    let fresh = harness(blobs);
    fresh.ordinary.load(vec![json!({"number": "4", "mcNumber": "13800004444"})]);
    assert!(fresh.service.trigger_update(Some("Bearer secret")).success);
    assert_eq!(fresh.lookup.calls.load(Ordering::SeqCst), 0);
    let read = fresh.service.read(Category::Ordinary);
    assert_eq!(read.data.len(), 1);
    assert_eq!(read.data[0].province.as_deref(), Some("Guangdong"));
}

#[test]
fn snapshot_write_failure_fails_the_cycle() {
    let h = harness(Arc::new(SnapshotWriteFails::default()));
    h.ordinary.load(vec![json!({"number": "1", "mcNumber": "13800001111"})]);
    let response = h.service.trigger_update(Some("Bearer secret"));
    assert!(!response.success);
    assert_eq!(response.status, 500);
    assert!(response.error.unwrap().contains("disk full"));
}

#[test]
fn read_enriches_and_writes_back_in_background() {
    let blobs: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
    let snapshots = SnapshotStore::new(blobs.clone());

    let h = harness(blobs.clone());
    h.ordinary.load(vec![json!({"number": "1", "mcNumber": "13800001111"})]);
    assert!(h.service.trigger_update(Some("Bearer secret")).success);

    // Strip the location to simulate a record persisted before enrichment worked.
    let mut snapshot = snapshots.load().unwrap();
    snapshot.ordinary[0].province = None;
    snapshot.ordinary[0].city = None;
    snapshots.save(&snapshot).unwrap();

    let reader = harness(blobs);
    let read = reader.service.read(Category::Ordinary);
    assert_eq!(read.data[0].city.as_deref(), Some("Shenzhen"));
    reader.service.flush_write_backs();

    let persisted = snapshots.load().unwrap();
    assert_eq!(persisted.ordinary[0].city.as_deref(), Some("Shenzhen"));
    assert_eq!(persisted.last_updated, snapshot.last_updated);
}

#[test]
fn unauthorized_trigger_leaves_store_untouched() {
    let blobs: Arc<dyn BlobStore> = Arc::new(MemoryBlobStore::new());
    let h = harness(blobs.clone());
    h.ordinary.load(vec![json!({"number": "1"})]);
    let response = h.service.trigger_update(None);
    assert_eq!(response.status, 401);
    assert_eq!(
        response.error.as_deref(),
        Some("Unauthorized: Bearer token required")
    );
    assert_eq!(h.ordinary.calls.load(Ordering::SeqCst), 0);
    assert!(blobs.get(SNAPSHOT_KEY).unwrap().is_none());
}

//! Upstream candidate sources and the sequential multi-batch fetcher.
//!
//! Ownership model:
//! - `CandidateSource` performs one upstream request and returns raw objects.
//! - `BatchFetcher` owns the repeat/delay discipline and the first-seen union.

use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::data::RawCandidate;
use crate::errors::PoolError;
use crate::merge::CandidateUnion;

/// HTTP listing source.
pub mod http;
pub use http::{HttpCandidateSource, HttpSourceConfig};

/// One upstream listing endpoint.
///
/// Each call is an independent request; repeated calls may return different
/// subsets of the upstream pool.
pub trait CandidateSource: Send + Sync {
    /// Stable source identifier used in logs and errors.
    fn id(&self) -> &str;
    /// Fetch one batch of raw candidates.
    fn fetch_batch(&self) -> Result<Vec<RawCandidate>, PoolError>;
}

/// Issues a fixed number of sequential requests with a pause between them.
#[derive(Clone, Copy, Debug)]
pub struct BatchFetcher {
    batch_count: usize,
    delay: Duration,
}

impl BatchFetcher {
    /// Fetcher issuing `batch_count` requests spaced by `delay`.
    pub fn new(batch_count: usize, delay: Duration) -> Self {
        Self { batch_count, delay }
    }

    /// Requests per call to [`BatchFetcher::fetch_all`].
    pub fn batch_count(&self) -> usize {
        self.batch_count
    }

    /// Pause between consecutive requests.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run every batch and return the first-seen union of their candidates.
    ///
    /// A failed batch counts as empty; the loop never stops early. The delay
    /// is applied between requests, not after the last one.
    pub fn fetch_all(&self, source: &dyn CandidateSource) -> Vec<RawCandidate> {
        let mut union = CandidateUnion::new();
        info!(
            source = source.id(),
            batches = self.batch_count,
            "starting batch fetch"
        );

        for batch_idx in 0..self.batch_count {
            let batch = match source.fetch_batch() {
                Ok(batch) => batch,
                Err(err) => {
                    warn!(
                        source = source.id(),
                        batch = batch_idx + 1,
                        error = %err,
                        "batch fetch failed; treating as empty"
                    );
                    Vec::new()
                }
            };
            let fetched = batch.len();
            let new_unique = union.push_batch(batch);
            debug!(
                source = source.id(),
                batch = batch_idx + 1,
                of = self.batch_count,
                fetched,
                new_unique,
                "batch fetched"
            );

            if batch_idx + 1 < self.batch_count && !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
        }

        info!(
            source = source.id(),
            unique = union.len(),
            "batch fetch complete"
        );
        union.into_candidates()
    }
}

//! Concurrent location enrichment of active records.

use rayon::prelude::*;
use tracing::debug;

use crate::data::{Category, NumberRecord, Snapshot};
use crate::location::LocationCache;

/// Result of one enrichment pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EnrichmentOutcome {
    /// Records that were missing a location and needed a lookup.
    pub attempted: usize,
    /// Records that received a location.
    pub enriched: usize,
}

impl EnrichmentOutcome {
    /// `true` when at least one record gained location data.
    pub fn has_updates(&self) -> bool {
        self.enriched > 0
    }
}

fn needs_lookup(record: &NumberRecord) -> bool {
    !record.secondary_id.is_empty() && record.needs_location()
}

/// Look up every pending record in parallel and wait for all of them.
///
/// Failed lookups leave their record unchanged and do not affect the others.
pub fn enrich_records(pending: Vec<&mut NumberRecord>, cache: &LocationCache) -> EnrichmentOutcome {
    let mut pending: Vec<&mut NumberRecord> = pending
        .into_iter()
        .filter(|record| needs_lookup(record))
        .collect();
    let attempted = pending.len();
    if attempted == 0 {
        return EnrichmentOutcome::default();
    }

    let enriched = pending
        .par_iter_mut()
        .map(|record| match cache.get(&record.secondary_id) {
            Some(entry) => {
                record.apply_location(&entry);
                true
            }
            None => false,
        })
        .filter(|updated| *updated)
        .count();

    debug!(attempted, enriched, "enrichment pass complete");
    EnrichmentOutcome {
        attempted,
        enriched,
    }
}

/// Enrich the active records of both categories.
pub fn enrich_active(snapshot: &mut Snapshot, cache: &LocationCache) -> EnrichmentOutcome {
    let last_updated = snapshot.last_updated;
    let Snapshot {
        ordinary, special, ..
    } = snapshot;
    let pending = ordinary
        .iter_mut()
        .chain(special.iter_mut())
        .filter(|record| record.last_seen_at >= last_updated)
        .collect();
    enrich_records(pending, cache)
}

/// Enrich the active records of one category.
pub fn enrich_active_category(
    snapshot: &mut Snapshot,
    category: Category,
    cache: &LocationCache,
) -> EnrichmentOutcome {
    let last_updated = snapshot.last_updated;
    let pending = snapshot
        .records_mut(category)
        .iter_mut()
        .filter(|record| record.last_seen_at >= last_updated)
        .collect();
    enrich_records(pending, cache)
}

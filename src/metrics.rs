use serde::Serialize;

use crate::data::{Category, Snapshot};

/// Per-category counts reported by an update cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CategoryStats {
    /// Records held before the merge.
    pub previous: usize,
    /// Records held after the merge, stale ones included.
    pub current: usize,
    /// Records seen in this cycle.
    pub active: usize,
    /// Records first added in this cycle.
    pub new: usize,
}

/// Counts for both categories plus enrichment totals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStats {
    /// Ordinary category counts.
    pub ordinary: CategoryStats,
    /// Special category counts.
    pub special: CategoryStats,
    /// Records that gained a location this cycle.
    pub location_enriched: usize,
}

/// Compute stats for `category` of a freshly merged snapshot.
///
/// A record is new when its `added_at` equals the snapshot's `last_updated`.
pub fn category_stats(previous: usize, snapshot: &Snapshot, category: Category) -> CategoryStats {
    let records = snapshot.records(category);
    CategoryStats {
        previous,
        current: records.len(),
        active: snapshot.active_count(category),
        new: records
            .iter()
            .filter(|record| record.added_at == snapshot.last_updated)
            .count(),
    }
}

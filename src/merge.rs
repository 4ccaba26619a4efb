//! Merge raw upstream candidates into the persisted record collection.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::constants::fields::{PRIMARY_ID_ALIASES, RESERVED_FIELDS, SECONDARY_ID_ALIASES};
use crate::data::{NumberRecord, RawCandidate};
use crate::types::{PrimaryId, SecondaryId};
use crate::utils::first_present;

/// A raw candidate reduced to its identifiers plus pass-through fields.
#[derive(Clone, Debug, PartialEq)]
pub struct CanonicalCandidate {
    /// Canonical primary id.
    pub primary_id: PrimaryId,
    /// Empty when none of the secondary aliases carried a value.
    pub secondary_id: SecondaryId,
    /// Every field that is neither an id alias nor owned by the record.
    pub extra: Map<String, Value>,
}

/// Resolve identifier aliases. Returns `None` when no primary id is present.
pub fn canonicalize(candidate: &RawCandidate) -> Option<CanonicalCandidate> {
    let fields = candidate.fields();
    let primary_id = first_present(fields, &PRIMARY_ID_ALIASES)?;
    let secondary_id = first_present(fields, &SECONDARY_ID_ALIASES).unwrap_or_default();
    let extra = fields
        .iter()
        .filter(|(key, _)| {
            let key = key.as_str();
            !PRIMARY_ID_ALIASES.contains(&key)
                && !SECONDARY_ID_ALIASES.contains(&key)
                && !RESERVED_FIELDS.contains(&key)
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Some(CanonicalCandidate {
        primary_id,
        secondary_id,
        extra,
    })
}

/// Merge `incoming` into `existing` at `update_time`.
///
/// Existing records keep their position and `added_at`; records seen again get
/// `last_seen_at = update_time` and a secondary id only when the incoming one
/// is non-empty. Unknown ids are appended in first-seen order. Records absent
/// from `incoming` are returned unchanged. Within one batch the last
/// occurrence of a new id supplies its pass-through fields.
pub fn merge(
    existing: Vec<NumberRecord>,
    incoming: &[RawCandidate],
    update_time: DateTime<Utc>,
) -> Vec<NumberRecord> {
    let mut by_id: IndexMap<PrimaryId, NumberRecord> = existing
        .into_iter()
        .map(|record| (record.primary_id.clone(), record))
        .collect();
    let mut created: HashSet<PrimaryId> = HashSet::new();
    let mut skipped = 0usize;

    for candidate in incoming {
        let Some(canonical) = canonicalize(candidate) else {
            skipped += 1;
            continue;
        };
        let CanonicalCandidate {
            primary_id,
            secondary_id,
            extra,
        } = canonical;

        match by_id.get_mut(&primary_id) {
            Some(record) => {
                record.last_seen_at = update_time;
                if !secondary_id.is_empty() {
                    record.secondary_id = secondary_id;
                }
                if created.contains(&primary_id) {
                    record.extra = extra;
                }
            }
            None => {
                let mut record = NumberRecord::new(primary_id.clone(), secondary_id, update_time);
                record.extra = extra;
                created.insert(primary_id.clone());
                by_id.insert(primary_id, record);
            }
        }
    }

    if skipped > 0 {
        debug!(skipped, "merge skipped candidates without a primary id");
    }
    debug!(
        total = by_id.len(),
        created = created.len(),
        "merge complete"
    );

    by_id.into_values().collect()
}

/// Incremental first-seen-wins union of candidate batches, keyed by primary id.
#[derive(Debug, Default)]
pub struct CandidateUnion {
    seen: HashSet<PrimaryId>,
    candidates: Vec<RawCandidate>,
}

impl CandidateUnion {
    /// Empty union.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one batch and return how many previously unseen ids it contributed.
    ///
    /// Candidates without a primary id are dropped here.
    pub fn push_batch(&mut self, batch: Vec<RawCandidate>) -> usize {
        let mut added = 0;
        for candidate in batch {
            let Some(primary_id) = first_present(candidate.fields(), &PRIMARY_ID_ALIASES) else {
                continue;
            };
            if self.seen.insert(primary_id) {
                self.candidates.push(candidate);
                added += 1;
            }
        }
        added
    }

    /// Unique candidates collected so far.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// `true` when nothing has been collected.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Collected candidates in first-seen order.
    pub fn into_candidates(self) -> Vec<RawCandidate> {
        self.candidates
    }
}

/// Union several batches, keeping the first candidate seen for each primary id.
pub fn union_batches<I>(batches: I) -> Vec<RawCandidate>
where
    I: IntoIterator<Item = Vec<RawCandidate>>,
{
    let mut union = CandidateUnion::new();
    for batch in batches {
        union.push_batch(batch);
    }
    union.into_candidates()
}

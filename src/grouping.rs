//! Suffix grouping: find records whose numbers share trailing digits.

use std::collections::{BTreeSet, HashMap};

use crate::data::NumberRecord;

/// Which identifiers of a record participate in matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchTargets {
    /// Match against the primary id.
    pub primary: bool,
    /// Match against the secondary id.
    pub secondary: bool,
}

impl Default for MatchTargets {
    fn default() -> Self {
        Self {
            primary: true,
            secondary: true,
        }
    }
}

impl MatchTargets {
    /// Enabled, non-empty identifiers of `record` in primary/secondary order.
    pub fn targets<'a>(&self, record: &'a NumberRecord) -> Vec<&'a str> {
        let mut out = Vec::with_capacity(2);
        if self.primary && !record.primary_id.is_empty() {
            out.push(record.primary_id.as_str());
        }
        if self.secondary && !record.secondary_id.is_empty() {
            out.push(record.secondary_id.as_str());
        }
        out
    }
}

/// Map each `digits`-long suffix to the record indices carrying it.
///
/// A record contributes one entry per enabled identifier long enough to have
/// such a suffix. When both of a record's identifiers end in the same suffix,
/// the record is listed twice under it.
pub fn suffix_index(
    records: &[NumberRecord],
    digits: usize,
    targets: MatchTargets,
) -> HashMap<String, Vec<usize>> {
    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    if digits == 0 {
        return index;
    }
    for (idx, record) in records.iter().enumerate() {
        for number in targets.targets(record) {
            if let Some(suffix) = suffix_of(number, digits) {
                index.entry(suffix.to_string()).or_default().push(idx);
            }
        }
    }
    index
}

/// Indices of records that share a `digits`-long suffix with another entry.
///
/// Returns an empty set when `digits` is zero.
pub fn find_suffix_groups(
    records: &[NumberRecord],
    digits: usize,
    targets: MatchTargets,
) -> BTreeSet<usize> {
    suffix_index(records, digits, targets)
        .into_values()
        .filter(|indices| indices.len() > 1)
        .flatten()
        .collect()
}

fn suffix_of(number: &str, digits: usize) -> Option<&str> {
    let count = number.chars().count();
    if count < digits {
        return None;
    }
    let skip = count - digits;
    let (offset, _) = number.char_indices().nth(skip)?;
    Some(&number[offset..])
}

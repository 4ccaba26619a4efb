use std::fmt;
use std::str::FromStr;

use chrono::serde::ts_milliseconds;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::PoolError;
pub use crate::types::{AreaPrefix, PrimaryId, SecondaryId};

/// Current time at the millisecond precision used by persisted timestamps.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// One tracked number pair plus its history and location metadata.
///
/// Serialized with the field names of the persisted snapshot blob. Fields not
/// owned by the record travel through `extra` untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NumberRecord {
    /// Home-network number; unique within a category.
    #[serde(rename = "hkNumber")]
    pub primary_id: PrimaryId,
    /// Paired secondary-network number, empty when unknown.
    #[serde(rename = "mainlandNumber", default)]
    pub secondary_id: SecondaryId,
    /// First time the record was seen. Never changes after creation.
    #[serde(rename = "addedAt", with = "ts_milliseconds", default)]
    pub added_at: DateTime<Utc>,
    /// Most recent cycle in which the record was present upstream.
    #[serde(rename = "lastSeenAt", with = "ts_milliseconds", default)]
    pub last_seen_at: DateTime<Utc>,
    /// Province of the secondary id, once resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    /// City of the secondary id, once resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Opaque upstream fields carried through unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NumberRecord {
    /// Build a record first seen at `seen_at`.
    pub fn new(
        primary_id: impl Into<PrimaryId>,
        secondary_id: impl Into<SecondaryId>,
        seen_at: DateTime<Utc>,
    ) -> Self {
        Self {
            primary_id: primary_id.into(),
            secondary_id: secondary_id.into(),
            added_at: seen_at,
            last_seen_at: seen_at,
            province: None,
            city: None,
            extra: Map::new(),
        }
    }

    /// Returns `true` when either location field is still missing.
    pub fn needs_location(&self) -> bool {
        self.province.is_none() || self.city.is_none()
    }

    /// Fill location fields. Existing values are only ever replaced, never cleared.
    pub fn apply_location(&mut self, entry: &LocationEntry) {
        self.province = Some(entry.province.clone());
        self.city = Some(entry.city.clone());
    }
}

/// The two independent record collections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Regular-priced offers.
    Ordinary,
    /// Premium offers.
    Special,
}

impl Category {
    /// Canonical iteration order.
    pub const ALL: [Category; 2] = [Category::Ordinary, Category::Special];

    /// Lowercase name used in logs and CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Ordinary => "ordinary",
            Category::Special => "special",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = PoolError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "ordinary" => Ok(Category::Ordinary),
            "special" => Ok(Category::Special),
            other => Err(PoolError::Configuration(format!(
                "unknown category '{other}' (expected 'ordinary' or 'special')"
            ))),
        }
    }
}

/// Persisted state of both categories plus the last completed cycle time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Ordinary category records, stale ones included.
    #[serde(default)]
    pub ordinary: Vec<NumberRecord>,
    /// Special category records, stale ones included.
    #[serde(default)]
    pub special: Vec<NumberRecord>,
    /// Time of the most recent completed merge; the active/stale partition point.
    #[serde(rename = "lastUpdated", with = "ts_milliseconds", default)]
    pub last_updated: DateTime<Utc>,
}

impl Snapshot {
    /// Cold-start snapshot: no records, `last_updated` at the epoch.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Records of `category`.
    pub fn records(&self, category: Category) -> &[NumberRecord] {
        match category {
            Category::Ordinary => &self.ordinary,
            Category::Special => &self.special,
        }
    }

    /// Mutable records of `category`.
    pub fn records_mut(&mut self, category: Category) -> &mut Vec<NumberRecord> {
        match category {
            Category::Ordinary => &mut self.ordinary,
            Category::Special => &mut self.special,
        }
    }

    /// A record is active when it was seen in the latest completed cycle.
    pub fn is_active(&self, record: &NumberRecord) -> bool {
        record.last_seen_at >= self.last_updated
    }

    /// Clone the active records of `category`, preserving order.
    pub fn active(&self, category: Category) -> Vec<NumberRecord> {
        self.records(category)
            .iter()
            .filter(|record| self.is_active(record))
            .cloned()
            .collect()
    }

    /// Count active records of `category`.
    pub fn active_count(&self, category: Category) -> usize {
        self.records(category)
            .iter()
            .filter(|record| self.is_active(record))
            .count()
    }
}

/// Province/city resolved for one area prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocationEntry {
    /// First seven characters of the secondary id.
    pub area_prefix: AreaPrefix,
    /// Province name.
    pub province: String,
    /// City name.
    pub city: String,
}

/// Raw upstream object before canonicalization.
///
/// Only the id aliases are interpreted; all other fields are opaque.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawCandidate(pub Map<String, Value>);

impl RawCandidate {
    /// Wrap a JSON value; non-object values are not candidates.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Raw JSON fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for RawCandidate {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn record_serializes_with_snapshot_field_names_and_extra() {
        let mut record = NumberRecord::new("85290001111", "13800001111", at(1_700_000_000_000));
        record.extra.insert("price".into(), json!(88));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["hkNumber"], "85290001111");
        assert_eq!(value["mainlandNumber"], "13800001111");
        assert_eq!(value["addedAt"], 1_700_000_000_000i64);
        assert_eq!(value["lastSeenAt"], 1_700_000_000_000i64);
        assert_eq!(value["price"], 88);
        assert!(value.get("province").is_none());
    }

    #[test]
    fn record_deserializes_missing_optional_fields() {
        let record: NumberRecord =
            serde_json::from_value(json!({"hkNumber": "852", "lastSeenAt": 5, "tag": "x"}))
                .unwrap();
        assert_eq!(record.secondary_id, "");
        assert_eq!(record.added_at, at(0));
        assert_eq!(record.last_seen_at, at(5));
        assert_eq!(record.extra.get("tag"), Some(&json!("x")));
        assert!(record.needs_location());
    }

    #[test]
    fn active_partition_uses_last_updated() {
        let mut snapshot = Snapshot::empty();
        snapshot.last_updated = at(100);
        let mut stale = NumberRecord::new("1", "", at(50));
        stale.last_seen_at = at(99);
        let fresh = NumberRecord::new("2", "", at(100));
        snapshot.ordinary = vec![stale, fresh];

        let active = snapshot.active(Category::Ordinary);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].primary_id, "2");
        assert_eq!(snapshot.active_count(Category::Ordinary), 1);
        assert_eq!(snapshot.active_count(Category::Special), 0);
    }

    #[test]
    fn category_parses_and_displays() {
        assert_eq!("special".parse::<Category>().unwrap(), Category::Special);
        assert_eq!(Category::Ordinary.to_string(), "ordinary");
        assert!(matches!(
            "gold".parse::<Category>(),
            Err(PoolError::Configuration(msg)) if msg.contains("gold")
        ));
    }

    #[test]
    fn now_millis_survives_a_serialization_round_trip() {
        let mut snapshot = Snapshot::empty();
        snapshot.last_updated = now_millis();
        let restored: Snapshot =
            serde_json::from_str(&serde_json::to_string(&snapshot).unwrap()).unwrap();
        assert_eq!(restored.last_updated, snapshot.last_updated);
    }

    #[test]
    fn raw_candidate_rejects_non_objects() {
        assert!(RawCandidate::from_value(json!("852")).is_none());
        let candidate = RawCandidate::from_value(json!({"number": "852"})).unwrap();
        assert_eq!(candidate.fields().len(), 1);
    }
}

#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// clap runners behind the `update_numbers` and `query_numbers` binaries.
pub mod apps;
/// Runtime configuration with environment overrides.
pub mod config;
/// Centralized constants used across fetching, lookup, and persistence.
pub mod constants;
/// Record, snapshot, and candidate types.
pub mod data;
/// Concurrent location enrichment of active records.
pub mod enrichment;
/// Record filtering and per-option result counts.
pub mod filter;
/// Suffix grouping of records sharing trailing digits.
pub mod grouping;
/// Location lookup and the persisted area-prefix cache.
pub mod location;
/// Candidate canonicalization, merge, and multi-batch union.
pub mod merge;
/// Update cycle statistics.
pub mod metrics;
/// Lucky-pattern detection and highlighting.
pub mod pattern;
/// Update trigger and read surfaces.
pub mod service;
/// Upstream candidate sources and the batch fetcher.
pub mod source;
/// Blob stores and snapshot persistence.
pub mod store;
/// Shared type aliases.
pub mod types;
/// JSON scalar helpers.
pub mod utils;

mod errors;
#[cfg(test)]
mod test_support;

pub use config::PoolConfig;
pub use data::{Category, LocationEntry, NumberRecord, RawCandidate, Snapshot};
pub use enrichment::{EnrichmentOutcome, enrich_active};
pub use errors::PoolError;
pub use filter::{FilterCriteria, FilterSettings, filter_records};
pub use grouping::MatchTargets;
pub use location::{HttpLocationLookup, LocationCache, LocationLookup};
pub use merge::{merge, union_batches};
pub use metrics::{CategoryStats, UpdateStats};
pub use pattern::{HighlightRange, HighlightSegment, LuckyPattern, RangeRole};
pub use service::{NumberService, ReadResponse, ServiceComponents, UpdateResponse};
pub use source::{BatchFetcher, CandidateSource, HttpCandidateSource, HttpSourceConfig};
pub use store::{BlobStore, FileBlobStore, MemoryBlobStore, SnapshotStore};
pub use types::{AreaPrefix, PrimaryId, SecondaryId, SourceId, Token};

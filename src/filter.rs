//! Record filtering: suffix groups, include/exclude tokens, lucky patterns, location.

use std::collections::BTreeSet;

use crate::data::NumberRecord;
use crate::errors::PoolError;
use crate::grouping::{MatchTargets, find_suffix_groups};
use crate::pattern::{LuckyPattern, matches};
use crate::types::Token;

/// Textual filter settings as entered by a user.
#[derive(Clone, Debug)]
pub struct FilterSettings {
    /// Include tokens, comma or whitespace separated.
    pub include: String,
    /// Exclude tokens, comma or whitespace separated.
    pub exclude: String,
    /// Suffix length for sibling grouping.
    pub suffix: String,
    /// Lucky pattern id; blank for none.
    pub lucky_pattern: String,
    /// Match against the primary id.
    pub match_primary: bool,
    /// Match against the secondary id.
    pub match_secondary: bool,
    /// Province or city substring.
    pub location: String,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            include: String::new(),
            exclude: String::new(),
            suffix: String::new(),
            lucky_pattern: String::new(),
            match_primary: true,
            match_secondary: true,
            location: String::new(),
        }
    }
}

/// Parsed filter criteria applied by [`filter_records`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterCriteria {
    /// At least one target must contain one of these.
    pub include_tokens: Vec<Token>,
    /// No target may contain any of these.
    pub exclude_tokens: Vec<Token>,
    /// Suffix length for sibling grouping; `0` disables the stage.
    pub suffix_digits: usize,
    /// At least one target must contain this pattern.
    pub lucky_pattern: Option<LuckyPattern>,
    /// Identifiers that take part in matching.
    pub targets: MatchTargets,
    /// Literal, case-sensitive substring of province or city; empty disables the stage.
    pub location_substring: String,
}

impl FilterCriteria {
    /// Parse textual settings.
    ///
    /// A suffix that is not a non-negative integer disables grouping. An
    /// unknown lucky-pattern id is rejected.
    pub fn parse(settings: &FilterSettings) -> Result<Self, PoolError> {
        Ok(Self {
            include_tokens: parse_tokens(&settings.include),
            exclude_tokens: parse_tokens(&settings.exclude),
            suffix_digits: settings.suffix.trim().parse().unwrap_or(0),
            lucky_pattern: LuckyPattern::parse_optional(&settings.lucky_pattern)?,
            targets: MatchTargets {
                primary: settings.match_primary,
                secondary: settings.match_secondary,
            },
            location_substring: settings.location.trim().to_string(),
        })
    }
}

/// Split user text on commas (ASCII or full-width) and whitespace into tokens.
pub fn parse_tokens(value: &str) -> Vec<Token> {
    value
        .split(|ch: char| ch == ',' || ch == '，' || ch.is_whitespace())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Returns `true` when `target` contains any of `tokens`.
pub fn matches_any<S: AsRef<str>>(target: &str, tokens: &[S]) -> bool {
    tokens.iter().any(|token| target.contains(token.as_ref()))
}

/// Token/pattern stage for a single record.
///
/// A record with no enabled, non-empty identifiers passes unconditionally.
pub fn should_include(record: &NumberRecord, criteria: &FilterCriteria) -> bool {
    let targets = criteria.targets.targets(record);
    if targets.is_empty() {
        return true;
    }

    if let Some(pattern) = criteria.lucky_pattern
        && !targets.iter().any(|value| matches(value, pattern))
    {
        return false;
    }

    if !criteria.exclude_tokens.is_empty()
        && targets
            .iter()
            .any(|value| matches_any(value, &criteria.exclude_tokens))
    {
        return false;
    }

    if !criteria.include_tokens.is_empty()
        && !targets
            .iter()
            .any(|value| matches_any(value, &criteria.include_tokens))
    {
        return false;
    }

    true
}

fn matches_location(record: &NumberRecord, needle: &str) -> bool {
    let province = record.province.as_deref().unwrap_or("");
    let city = record.city.as_deref().unwrap_or("");
    province.contains(needle) || city.contains(needle)
}

/// Indices of `records` passing every stage, in input order.
///
/// Suffix grouping is computed over the whole input, not over the records
/// left after the other stages.
pub fn filter_indices(records: &[NumberRecord], criteria: &FilterCriteria) -> Vec<usize> {
    if records.is_empty() {
        return Vec::new();
    }

    let siblings = (criteria.suffix_digits > 0)
        .then(|| find_suffix_groups(records, criteria.suffix_digits, criteria.targets));

    records
        .iter()
        .enumerate()
        .filter(|(idx, _)| siblings.as_ref().is_none_or(|set| set.contains(idx)))
        .filter(|(_, record)| should_include(record, criteria))
        .filter(|(_, record)| {
            criteria.location_substring.is_empty()
                || matches_location(record, &criteria.location_substring)
        })
        .map(|(idx, _)| idx)
        .collect()
}

/// Records passing every stage, cloned in input order.
pub fn filter_records(records: &[NumberRecord], criteria: &FilterCriteria) -> Vec<NumberRecord> {
    filter_indices(records, criteria)
        .into_iter()
        .map(|idx| records[idx].clone())
        .collect()
}

/// Result count for every lucky pattern with the remaining criteria held fixed.
///
/// Patterns are counted over the records that pass without a pattern, so
/// suffix grouping is recomputed on that narrowed set.
pub fn lucky_pattern_counts(
    records: &[NumberRecord],
    criteria: &FilterCriteria,
) -> Vec<(LuckyPattern, usize)> {
    let unpatterned = FilterCriteria {
        lucky_pattern: None,
        ..criteria.clone()
    };
    let base = filter_records(records, &unpatterned);
    LuckyPattern::VOCABULARY
        .into_iter()
        .map(|pattern| {
            let variant = FilterCriteria {
                lucky_pattern: Some(pattern),
                ..unpatterned.clone()
            };
            (pattern, filter_indices(&base, &variant).len())
        })
        .collect()
}

/// Per-city result counts with the location stage disabled.
///
/// Cities are the distinct non-empty `city` values of `records`, sorted. A
/// record counts toward a city when its city or province equals it exactly.
pub fn location_counts(
    records: &[NumberRecord],
    criteria: &FilterCriteria,
) -> Vec<(String, usize)> {
    let cities: BTreeSet<&str> = records
        .iter()
        .filter_map(|record| record.city.as_deref())
        .filter(|city| !city.is_empty())
        .collect();
    let unlocated = FilterCriteria {
        location_substring: String::new(),
        ..criteria.clone()
    };
    let passing: Vec<&NumberRecord> = filter_indices(records, &unlocated)
        .into_iter()
        .map(|idx| &records[idx])
        .collect();

    cities
        .into_iter()
        .map(|city| {
            let count = passing
                .iter()
                .filter(|record| {
                    record.city.as_deref() == Some(city) || record.province.as_deref() == Some(city)
                })
                .count();
            (city.to_string(), count)
        })
        .collect()
}

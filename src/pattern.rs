//! Lucky-pattern detection and highlight range computation.
//!
//! Detection is anchored at any offset of the digit string. Ranges are
//! reported in character offsets (`start..end`, end exclusive) so callers can
//! slice or colorize the original string directly.

use std::fmt;
use std::str::FromStr;

use crate::errors::PoolError;

/// Fixed vocabulary of structural digit patterns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LuckyPattern {
    /// Four or more identical consecutive digits.
    Aaaa,
    /// `d1 d1 d2 d2` with `d1 != d2`.
    Aabb,
    /// Two-digit unit immediately repeated.
    Abab,
    /// Three identical digits followed by a different one.
    Aaab,
    /// One digit followed by three identical different digits.
    Abbb,
    /// `d1 d1 x d2 d2` with `d1 != d2` and `x` distinct from both.
    Aaxbb,
    /// Run of 3+ digits each one greater than the previous.
    Ascending,
    /// Run of 3+ digits each one less than the previous.
    Descending,
    /// Any of the above.
    Any,
}

impl LuckyPattern {
    /// Every pattern, in presentation order.
    pub const VOCABULARY: [LuckyPattern; 9] = [
        LuckyPattern::Aaaa,
        LuckyPattern::Aabb,
        LuckyPattern::Abab,
        LuckyPattern::Aaab,
        LuckyPattern::Abbb,
        LuckyPattern::Aaxbb,
        LuckyPattern::Ascending,
        LuckyPattern::Descending,
        LuckyPattern::Any,
    ];

    /// Concrete patterns that `Any` is the disjunction of.
    pub const CONCRETE: [LuckyPattern; 8] = [
        LuckyPattern::Aaaa,
        LuckyPattern::Aabb,
        LuckyPattern::Abab,
        LuckyPattern::Aaab,
        LuckyPattern::Abbb,
        LuckyPattern::Aaxbb,
        LuckyPattern::Ascending,
        LuckyPattern::Descending,
    ];

    /// Stable textual id used in filters and persisted settings.
    pub fn id(self) -> &'static str {
        match self {
            LuckyPattern::Aaaa => "AAAA",
            LuckyPattern::Aabb => "AABB",
            LuckyPattern::Abab => "ABAB",
            LuckyPattern::Aaab => "AAAB",
            LuckyPattern::Abbb => "ABBB",
            LuckyPattern::Aaxbb => "AAXBB",
            LuckyPattern::Ascending => "ascending",
            LuckyPattern::Descending => "descending",
            LuckyPattern::Any => "any",
        }
    }

    /// Parse an optional pattern id; blank input means "no constraint".
    pub fn parse_optional(raw: &str) -> Result<Option<Self>, PoolError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        trimmed.parse().map(Some)
    }

    /// Returns `true` when `digits` contains this pattern.
    pub fn matches(self, digits: &str) -> bool {
        matches(digits, self)
    }

    /// Highlight ranges justifying a match of this pattern.
    pub fn ranges(self, digits: &str) -> Vec<HighlightRange> {
        ranges(digits, self)
    }
}

impl fmt::Display for LuckyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for LuckyPattern {
    type Err = PoolError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        LuckyPattern::VOCABULARY
            .into_iter()
            .find(|pattern| pattern.id().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| PoolError::InvalidPattern(trimmed.to_string()))
    }
}

/// Which part of a match a highlighted range covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RangeRole {
    /// Whole run (`AAAA`, ascending, descending).
    Run,
    /// First repeated group (the `A` part).
    First,
    /// Second repeated group (the `B` part).
    Second,
    /// Separator digit between groups (`X` in `AAXBB`).
    Filler,
    /// Occurrence of an include token.
    Include,
}

/// Character range `start..end` with the role it plays in a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HighlightRange {
    /// First character index.
    pub start: usize,
    /// One past the last character index.
    pub end: usize,
    /// Role of the covered characters.
    pub role: RangeRole,
}

impl HighlightRange {
    fn new(start: usize, end: usize, role: RangeRole) -> Self {
        Self { start, end, role }
    }
}

/// Contiguous slice of a number sharing one highlight role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HighlightSegment {
    /// Characters of the segment.
    pub text: String,
    /// Shared role, or `None` for plain text.
    pub role: Option<RangeRole>,
}

/// Returns `true` when `digits` contains `pattern`. Empty input imposes no constraint.
pub fn matches(digits: &str, pattern: LuckyPattern) -> bool {
    if digits.is_empty() {
        return true;
    }
    let chars: Vec<char> = digits.chars().collect();
    matches_chars(&chars, pattern)
}

/// Textual variant used by filter settings: blank or unknown ids impose no constraint.
pub fn has_lucky_pattern(digits: &str, pattern_id: &str) -> bool {
    match LuckyPattern::parse_optional(pattern_id) {
        Ok(Some(pattern)) => matches(digits, pattern),
        Ok(None) | Err(_) => true,
    }
}

fn matches_chars(chars: &[char], pattern: LuckyPattern) -> bool {
    match pattern {
        LuckyPattern::Aaaa => chars.windows(4).any(is_aaaa),
        LuckyPattern::Aabb => chars.windows(4).any(is_aabb),
        LuckyPattern::Abab => chars.windows(4).any(is_abab),
        LuckyPattern::Aaab => chars.windows(4).any(is_aaab),
        LuckyPattern::Abbb => chars.windows(4).any(is_abbb),
        LuckyPattern::Aaxbb => chars.windows(5).any(is_aaxbb),
        LuckyPattern::Ascending => chars.windows(3).any(|w| is_step_run(w, 1)),
        LuckyPattern::Descending => chars.windows(3).any(|w| is_step_run(w, -1)),
        LuckyPattern::Any => LuckyPattern::CONCRETE
            .into_iter()
            .any(|concrete| matches_chars(chars, concrete)),
    }
}

fn is_aaaa(w: &[char]) -> bool {
    w[0] == w[1] && w[1] == w[2] && w[2] == w[3]
}

fn is_aabb(w: &[char]) -> bool {
    w[0] == w[1] && w[2] == w[3] && w[0] != w[2]
}

fn is_abab(w: &[char]) -> bool {
    w[0] == w[2] && w[1] == w[3]
}

fn is_aaab(w: &[char]) -> bool {
    w[0] == w[1] && w[1] == w[2] && w[3] != w[0]
}

fn is_abbb(w: &[char]) -> bool {
    w[1] == w[2] && w[2] == w[3] && w[0] != w[1]
}

fn is_aaxbb(w: &[char]) -> bool {
    let (a, a2, x, b, b2) = (w[0], w[1], w[2], w[3], w[4]);
    a == a2 && b == b2 && a != b && x != a && x != b
}

fn steps_by(current: char, next: char, step: i32) -> bool {
    match (current.to_digit(10), next.to_digit(10)) {
        (Some(current), Some(next)) => next as i32 - current as i32 == step,
        _ => false,
    }
}

fn is_step_run(w: &[char], step: i32) -> bool {
    w.windows(2).all(|pair| steps_by(pair[0], pair[1], step))
}

/// Character ranges justifying `pattern` in `digits`.
///
/// Fixed-width patterns report every offset that matches, overlapping or not.
/// `AAAA`, ascending and descending report maximal non-overlapping runs.
/// `Any` concatenates the ranges of every concrete pattern.
pub fn ranges(digits: &str, pattern: LuckyPattern) -> Vec<HighlightRange> {
    if digits.is_empty() {
        return Vec::new();
    }
    let chars: Vec<char> = digits.chars().collect();
    ranges_chars(&chars, pattern)
}

fn ranges_chars(chars: &[char], pattern: LuckyPattern) -> Vec<HighlightRange> {
    let mut out = Vec::new();
    match pattern {
        LuckyPattern::Aaaa => {
            for (start, end) in maximal_runs(chars, 4, |a, b| a == b) {
                out.push(HighlightRange::new(start, end, RangeRole::Run));
            }
        }
        LuckyPattern::Aabb => {
            for i in window_offsets(chars, 4, is_aabb) {
                out.push(HighlightRange::new(i, i + 2, RangeRole::First));
                out.push(HighlightRange::new(i + 2, i + 4, RangeRole::Second));
            }
        }
        LuckyPattern::Abab => {
            for i in window_offsets(chars, 4, is_abab) {
                out.push(HighlightRange::new(i, i + 1, RangeRole::First));
                out.push(HighlightRange::new(i + 1, i + 2, RangeRole::Second));
                out.push(HighlightRange::new(i + 2, i + 3, RangeRole::First));
                out.push(HighlightRange::new(i + 3, i + 4, RangeRole::Second));
            }
        }
        LuckyPattern::Aaab => {
            for i in window_offsets(chars, 4, is_aaab) {
                out.push(HighlightRange::new(i, i + 3, RangeRole::First));
                out.push(HighlightRange::new(i + 3, i + 4, RangeRole::Second));
            }
        }
        LuckyPattern::Abbb => {
            for i in window_offsets(chars, 4, is_abbb) {
                out.push(HighlightRange::new(i, i + 1, RangeRole::First));
                out.push(HighlightRange::new(i + 1, i + 4, RangeRole::Second));
            }
        }
        LuckyPattern::Aaxbb => {
            for i in window_offsets(chars, 5, is_aaxbb) {
                out.push(HighlightRange::new(i, i + 2, RangeRole::First));
                out.push(HighlightRange::new(i + 2, i + 3, RangeRole::Filler));
                out.push(HighlightRange::new(i + 3, i + 5, RangeRole::Second));
            }
        }
        LuckyPattern::Ascending => {
            for (start, end) in maximal_runs(chars, 3, |a, b| steps_by(a, b, 1)) {
                out.push(HighlightRange::new(start, end, RangeRole::Run));
            }
        }
        LuckyPattern::Descending => {
            for (start, end) in maximal_runs(chars, 3, |a, b| steps_by(a, b, -1)) {
                out.push(HighlightRange::new(start, end, RangeRole::Run));
            }
        }
        LuckyPattern::Any => {
            for concrete in LuckyPattern::CONCRETE {
                out.extend(ranges_chars(chars, concrete));
            }
        }
    }
    out
}

fn window_offsets(
    chars: &[char],
    width: usize,
    predicate: fn(&[char]) -> bool,
) -> impl Iterator<Item = usize> + '_ {
    chars
        .windows(width)
        .enumerate()
        .filter(move |(_, window)| predicate(window))
        .map(|(idx, _)| idx)
}

/// Scan left to right for runs where every adjacent pair satisfies `link`.
/// Runs shorter than `min_len` are dropped; a kept run is skipped over entirely.
fn maximal_runs(
    chars: &[char],
    min_len: usize,
    link: impl Fn(char, char) -> bool,
) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start = 0usize;
    while start < chars.len() {
        let mut end = start + 1;
        while end < chars.len() && link(chars[end - 1], chars[end]) {
            end += 1;
        }
        if end - start >= min_len {
            runs.push((start, end));
            start = end;
        } else {
            start += 1;
        }
    }
    runs
}

/// Every occurrence (overlapping included) of every non-empty include token.
pub fn include_ranges<S: AsRef<str>>(digits: &str, tokens: &[S]) -> Vec<HighlightRange> {
    let chars: Vec<char> = digits.chars().collect();
    let mut out = Vec::new();
    for token in tokens {
        let token: Vec<char> = token.as_ref().chars().collect();
        if token.is_empty() || token.len() > chars.len() {
            continue;
        }
        for (idx, window) in chars.windows(token.len()).enumerate() {
            if window == token.as_slice() {
                out.push(HighlightRange::new(idx, idx + token.len(), RangeRole::Include));
            }
        }
    }
    out
}

/// Split `digits` into contiguous segments for display.
///
/// Pattern ranges win over include ranges; among pattern ranges the one
/// starting later overwrites earlier ones on shared characters.
pub fn highlight_segments<S: AsRef<str>>(
    digits: &str,
    pattern: Option<LuckyPattern>,
    include_tokens: &[S],
) -> Vec<HighlightSegment> {
    let chars: Vec<char> = digits.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let mut all = Vec::new();
    if let Some(pattern) = pattern {
        all.extend(ranges_chars(&chars, pattern));
    }
    all.extend(include_ranges(digits, include_tokens));
    all.sort_by_key(|range| range.start);

    let mut roles: Vec<Option<RangeRole>> = vec![None; chars.len()];
    for range in &all {
        for slot in roles.iter_mut().take(range.end).skip(range.start) {
            if range.role != RangeRole::Include {
                *slot = Some(range.role);
            } else if slot.is_none() {
                *slot = Some(RangeRole::Include);
            }
        }
    }

    let mut segments: Vec<HighlightSegment> = Vec::new();
    for (ch, role) in chars.into_iter().zip(roles) {
        match segments.last_mut() {
            Some(last) if last.role == role => last.text.push(ch),
            _ => segments.push(HighlightSegment {
                text: ch.to_string(),
                role,
            }),
        }
    }
    segments
}

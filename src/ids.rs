//! Conversions between base gene ids and transcript ids, and parsing of the
//! subgenome/chromosome tag embedded in cotton gene ids.
//!
//! A *transcript* id is a base gene id followed by `.` and an integer
//! suffix (`Gh_A01G0001.1`). Every function here is pure and total.

use once_cell::sync::Lazy;
use regex_lite::Regex;

/// Suffix appended by [`to_transcript`] when an id carries none.
pub const DEFAULT_TRANSCRIPT_SUFFIX: &str = ".1";

static TRANSCRIPT_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\.\d+)+$").expect("valid transcript regex"));

static SUBGENOME_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[_.\s]([AD])(\d{2})G").expect("valid subgenome regex")
});

// ZJU ids put the tag right after a `GH_` prefix.
static SUBGENOME_TAG_ZJU: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^GH_([AD])(\d{2})G").expect("valid subgenome regex")
});

/// Strips trailing `.<digits>` suffixes; the result never ends in one.
pub fn to_base_gene(id: &str) -> String {
    TRANSCRIPT_SUFFIX.replace(id, "").into_owned()
}

/// Returns `id` unchanged when it already ends in `.<digits>`, otherwise
/// appends [`DEFAULT_TRANSCRIPT_SUFFIX`].
pub fn to_transcript(id: &str) -> String {
    to_transcript_with(id, DEFAULT_TRANSCRIPT_SUFFIX)
}

pub fn to_transcript_with(
    id: &str,
    suffix: &str,
) -> String {
    if has_transcript_suffix(id) {
        id.to_string()
    }
    else {
        format!("{id}{suffix}")
    }
}

pub fn has_transcript_suffix(id: &str) -> bool { TRANSCRIPT_SUFFIX.is_match(id) }

/// Subgenome letter and two-digit chromosome number of a cotton gene id,
/// e.g. `('A', "05")` for `Gh_A05G001234`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubgenomeTag {
    pub subgenome:  char,
    pub chromosome: String,
}

impl SubgenomeTag {
    pub fn parse(gene_id: &str) -> Option<Self> {
        let captures = SUBGENOME_TAG
            .captures(gene_id)
            .or_else(|| SUBGENOME_TAG_ZJU.captures(gene_id))?;
        let subgenome = captures
            .get(1)?
            .as_str()
            .chars()
            .next()?
            .to_ascii_uppercase();
        let chromosome = captures.get(2)?.as_str().to_string();
        Some(Self {
            subgenome,
            chromosome,
        })
    }
}

/// Normalises a raw annotation id with an assembly's id pattern.
///
/// Without a pattern the trimmed id is returned. With a pattern, the first
/// capture group (or the whole match when the pattern has no groups) is
/// returned; ids the pattern does not match yield `None`.
pub fn apply_id_pattern(
    raw_id: &str,
    pattern: Option<&Regex>,
) -> Option<String> {
    let raw_id = raw_id.trim();
    if raw_id.is_empty() {
        return None;
    }
    let Some(pattern) = pattern
    else {
        return Some(raw_id.to_string());
    };
    let captures = pattern.captures(raw_id)?;
    captures
        .get(1)
        .or_else(|| captures.get(0))
        .map(|m| m.as_str().to_string())
        .filter(|id| !id.is_empty())
}

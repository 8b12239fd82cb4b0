//! Homology hit rows and their tabular form.
//!
//! Hits travel between the search collaborator and the orchestrator as
//! [`DataFrame`]s with the column set below, in this order.

use itertools::Itertools;
use polars::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};

pub const QUERY_ID: &str = "Query_ID";
pub const QUERY_LENGTH: &str = "Query_Length";
pub const HIT_ID: &str = "Hit_ID";
pub const HIT_DESCRIPTION: &str = "Hit_Description";
pub const HIT_LENGTH: &str = "Hit_Length";
pub const EVALUE: &str = "E-value";
pub const BIT_SCORE: &str = "Bit_Score";
pub const IDENTITY: &str = "Identity (%)";
pub const POSITIVES: &str = "Positives (%)";
pub const GAPS: &str = "Gaps";
pub const ALIGNMENT_LENGTH: &str = "Alignment_Length";
pub const QUERY_START: &str = "Query_Start";
pub const QUERY_END: &str = "Query_End";
pub const HIT_START: &str = "Hit_Start";
pub const HIT_END: &str = "Hit_End";
pub const QUERY_STRAND: &str = "Query_Strand";
pub const HIT_STRAND: &str = "Hit_Strand";
pub const QUERY_SEQUENCE: &str = "Query_Sequence";
pub const HIT_SEQUENCE: &str = "Hit_Sequence";
pub const ALIGNMENT_MIDLINE: &str = "Alignment_Midline";

/// Loci columns added by [`LocusStitcher`](crate::locus::LocusStitcher).
pub const QUERY_LOCI: &str = "Query_Loci";
pub const HIT_LOCI: &str = "Hit_Loci";

pub const HIT_COLUMNS: [&str; 20] = [
    QUERY_ID,
    QUERY_LENGTH,
    HIT_ID,
    HIT_DESCRIPTION,
    HIT_LENGTH,
    EVALUE,
    BIT_SCORE,
    IDENTITY,
    POSITIVES,
    GAPS,
    ALIGNMENT_LENGTH,
    QUERY_START,
    QUERY_END,
    HIT_START,
    HIT_END,
    QUERY_STRAND,
    HIT_STRAND,
    QUERY_SEQUENCE,
    HIT_SEQUENCE,
    ALIGNMENT_MIDLINE,
];

/// One high-scoring pair reported by the alignment search.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HomologyHit {
    pub query_id:          String,
    pub query_length:      u64,
    pub hit_id:            String,
    pub hit_description:   String,
    pub hit_length:        u64,
    pub evalue:            f64,
    pub bit_score:         f64,
    pub identity:          f64,
    pub positives:         f64,
    pub gaps:              u64,
    pub alignment_length:  u64,
    pub query_start:       u64,
    pub query_end:         u64,
    pub hit_start:         u64,
    pub hit_end:           u64,
    /// `1` for plus, `-1` for minus.
    pub query_strand:      i32,
    pub hit_strand:        i32,
    pub query_sequence:    String,
    pub hit_sequence:      String,
    pub alignment_midline: String,
}

impl HomologyHit {
    pub fn new(
        query_id: &str,
        hit_id: &str,
    ) -> Self {
        Self {
            query_id: query_id.to_string(),
            hit_id: hit_id.to_string(),
            query_strand: 1,
            hit_strand: 1,
            ..Default::default()
        }
    }

    crate::with_field_fn!(evalue, f64);

    crate::with_field_fn!(bit_score, f64);

    crate::with_field_fn!(identity, f64);
}

/// `1` when the span runs forward, `-1` when `end < start`.
pub fn strand_from_span(
    start: u64,
    end: u64,
) -> i32 {
    if end < start {
        -1
    }
    else {
        1
    }
}

/// `|` where both aligned residues are identical, a space elsewhere.
pub fn alignment_midline(
    query: &str,
    hit: &str,
) -> String {
    query
        .chars()
        .zip(hit.chars())
        .map(|(q, h)| {
            if q.eq_ignore_ascii_case(&h) && q != '-' {
                '|'
            }
            else {
                ' '
            }
        })
        .collect()
}

/// Builds a hit table with the [`HIT_COLUMNS`] schema.
pub fn hits_to_frame(hits: Vec<HomologyHit>) -> PolarsResult<DataFrame> {
    macro_rules! hit_column {
        ($name:expr, $field:ident) => {
            Column::new(
                $name.into(),
                hits.iter()
                    .map(|hit| hit.$field.clone())
                    .collect_vec(),
            )
        };
    }

    DataFrame::new(vec![
        hit_column!(QUERY_ID, query_id),
        hit_column!(QUERY_LENGTH, query_length),
        hit_column!(HIT_ID, hit_id),
        hit_column!(HIT_DESCRIPTION, hit_description),
        hit_column!(HIT_LENGTH, hit_length),
        hit_column!(EVALUE, evalue),
        hit_column!(BIT_SCORE, bit_score),
        hit_column!(IDENTITY, identity),
        hit_column!(POSITIVES, positives),
        hit_column!(GAPS, gaps),
        hit_column!(ALIGNMENT_LENGTH, alignment_length),
        hit_column!(QUERY_START, query_start),
        hit_column!(QUERY_END, query_end),
        hit_column!(HIT_START, hit_start),
        hit_column!(HIT_END, hit_end),
        hit_column!(QUERY_STRAND, query_strand),
        hit_column!(HIT_STRAND, hit_strand),
        hit_column!(QUERY_SEQUENCE, query_sequence),
        hit_column!(HIT_SEQUENCE, hit_sequence),
        hit_column!(ALIGNMENT_MIDLINE, alignment_midline),
    ])
}

/// Zero-row table with the hit schema: "searched, found nothing".
pub fn empty_hit_frame() -> PolarsResult<DataFrame> { hits_to_frame(Vec::new()) }

//! Read-only access to per-assembly sequence and coordinate records.
//!
//! The engine only relies on the [`SequenceStore`] contract. Two adapters
//! are provided: [`memory::MemoryStore`] for fixtures and small datasets and
//! [`sqlite::SqliteStore`] for the preprocessed genome database.

use std::fmt;

use serde::{
    Deserialize,
    Serialize,
};

pub mod memory;
pub mod sqlite;

/// Which per-assembly table an id lookup targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Cds,
    Protein,
    Coordinates,
}

impl TableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableKind::Cds => "cds",
            TableKind::Protein => "protein",
            TableKind::Coordinates => "coordinates",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Genomic span of one gene in one assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocusRecord {
    pub assembly: String,
    pub gene_id:  String,
    pub seqid:    String,
    pub start:    u64,
    pub end:      u64,
}

impl LocusRecord {
    /// `seqid:start-end`
    pub fn locus_string(&self) -> String {
        format!("{}:{}-{}", self.seqid, self.start, self.end)
    }
}

/// FASTA text for the ids that were found plus the ids that were not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedSequences {
    pub fasta:     String,
    pub not_found: Vec<String>,
}

impl FetchedSequences {
    pub fn is_empty(&self) -> bool { self.fasta.trim().is_empty() }
}

/// Keyed, read-only lookup of sequence and coordinate records.
///
/// Implementations must be safe to call concurrently from several search
/// workers.
pub trait SequenceStore: Send + Sync {
    /// FASTA records for `gene_ids`, headed by the id stored in the
    /// database, in caller order and each id at most once.
    fn sequences_by_ids(
        &self,
        assembly: &str,
        kind: TableKind,
        gene_ids: &[String],
    ) -> anyhow::Result<FetchedSequences>;

    /// Loci for the ids present in the assembly's coordinate table.
    /// Missing ids are simply absent from the result.
    fn coordinates_by_ids(
        &self,
        assembly: &str,
        gene_ids: &[String],
    ) -> anyhow::Result<Vec<LocusRecord>>;

    fn id_exists(
        &self,
        assembly: &str,
        kind: TableKind,
        id: &str,
    ) -> anyhow::Result<bool>;
}

/// Candidate database ids for a caller id, in preference order:
/// transcript form, base form, then the id as given.
pub(crate) fn id_variants(id: &str) -> Vec<String> {
    crate::utils::dedup_preserving_order([
        crate::ids::to_transcript(id),
        crate::ids::to_base_gene(id),
        id.to_string(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_prefer_transcript_form() {
        assert_eq!(id_variants("GeneA"), vec!["GeneA.1", "GeneA"]);
        assert_eq!(id_variants("GeneA.2"), vec!["GeneA.2", "GeneA"]);
    }

    #[test]
    fn locus_string_format() {
        let locus = LocusRecord {
            assembly: "X".into(),
            gene_id:  "GeneA".into(),
            seqid:    "A01".into(),
            start:    100,
            end:      250,
        };
        assert_eq!(locus.locus_string(), "A01:100-250");
    }
}

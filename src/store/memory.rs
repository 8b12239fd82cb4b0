use std::sync::atomic::{
    AtomicUsize,
    Ordering,
};

use hashbrown::{
    HashMap,
    HashSet,
};
use indexmap::IndexMap;

use super::{
    id_variants,
    FetchedSequences,
    LocusRecord,
    SequenceStore,
    TableKind,
};

/// In-memory [`SequenceStore`], filled through builder-style methods.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sequences:   HashMap<(String, TableKind), IndexMap<String, String>>,
    coordinates: HashMap<String, HashMap<String, LocusRecord>>,
    lookups:     AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn with_sequence(
        mut self,
        assembly: &str,
        kind: TableKind,
        id: &str,
        sequence: &str,
    ) -> Self {
        self.sequences
            .entry((assembly.to_string(), kind))
            .or_default()
            .insert(id.to_string(), sequence.to_string());
        self
    }

    pub fn with_locus(
        mut self,
        assembly: &str,
        id: &str,
        seqid: &str,
        start: u64,
        end: u64,
    ) -> Self {
        self.coordinates
            .entry(assembly.to_string())
            .or_default()
            .insert(id.to_string(), LocusRecord {
                assembly: assembly.to_string(),
                gene_id:  id.to_string(),
                seqid:    seqid.to_string(),
                start,
                end,
            });
        self
    }

    /// Number of [`SequenceStore::id_exists`] calls served so far.
    pub fn lookup_count(&self) -> usize { self.lookups.load(Ordering::Relaxed) }

    fn table(
        &self,
        assembly: &str,
        kind: TableKind,
    ) -> Option<&IndexMap<String, String>> {
        self.sequences
            .get(&(assembly.to_string(), kind))
    }
}

impl SequenceStore for MemoryStore {
    fn sequences_by_ids(
        &self,
        assembly: &str,
        kind: TableKind,
        gene_ids: &[String],
    ) -> anyhow::Result<FetchedSequences> {
        let Some(table) = self.table(assembly, kind)
        else {
            anyhow::bail!("no {} table for assembly '{}'", kind, assembly)
        };

        let mut emitted = HashSet::new();
        let mut records = Vec::new();
        let mut not_found = Vec::new();
        for id in gene_ids {
            match id_variants(id)
                .into_iter()
                .find(|variant| table.contains_key(variant))
            {
                Some(db_id) => {
                    if emitted.insert(db_id.clone()) {
                        records.push(format!(">{}\n{}", db_id, table[&db_id]));
                    }
                },
                None => not_found.push(id.clone()),
            }
        }

        Ok(FetchedSequences {
            fasta: records.join("\n"),
            not_found,
        })
    }

    fn coordinates_by_ids(
        &self,
        assembly: &str,
        gene_ids: &[String],
    ) -> anyhow::Result<Vec<LocusRecord>> {
        let Some(loci) = self.coordinates.get(assembly)
        else {
            return Ok(Vec::new());
        };
        Ok(gene_ids
            .iter()
            .filter_map(|id| loci.get(id).cloned())
            .collect())
    }

    fn id_exists(
        &self,
        assembly: &str,
        kind: TableKind,
        id: &str,
    ) -> anyhow::Result<bool> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        Ok(match kind {
            TableKind::Coordinates => {
                self.coordinates
                    .get(assembly)
                    .is_some_and(|loci| loci.contains_key(id))
            },
            _ => {
                self.table(assembly, kind)
                    .is_some_and(|table| table.contains_key(id))
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_sequence("X", TableKind::Cds, "GeneA.1", "ATG")
            .with_sequence("X", TableKind::Cds, "GeneB", "TTT")
            .with_locus("X", "GeneA", "A01", 10, 20)
    }

    #[test]
    fn sequences_use_database_ids_once() {
        let ids = vec![
            "GeneA".to_string(),
            "GeneA.1".to_string(),
            "GeneB.1".to_string(),
            "GeneC".to_string(),
        ];
        let fetched = store()
            .sequences_by_ids("X", TableKind::Cds, &ids)
            .unwrap();
        assert_eq!(fetched.fasta, ">GeneA.1\nATG\n>GeneB\nTTT");
        assert_eq!(fetched.not_found, vec!["GeneC".to_string()]);
    }

    #[test]
    fn missing_table_is_an_error() {
        let ids = vec!["GeneA".to_string()];
        assert!(store()
            .sequences_by_ids("Y", TableKind::Cds, &ids)
            .is_err());
    }

    #[test]
    fn coordinates_skip_missing_ids() {
        let ids = vec!["GeneA".to_string(), "GeneZ".to_string()];
        let loci = store().coordinates_by_ids("X", &ids).unwrap();
        assert_eq!(loci.len(), 1);
        assert_eq!(loci[0].locus_string(), "A01:10-20");
    }

    #[test]
    fn id_exists_counts_lookups() {
        let store = store();
        assert!(store.id_exists("X", TableKind::Cds, "GeneA.1").unwrap());
        assert!(!store.id_exists("X", TableKind::Cds, "GeneA").unwrap());
        assert!(store.id_exists("X", TableKind::Coordinates, "GeneA").unwrap());
        assert_eq!(store.lookup_count(), 3);
    }
}

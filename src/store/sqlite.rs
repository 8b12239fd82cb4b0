use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{
    anyhow,
    bail,
    Context,
};
use hashbrown::{
    HashMap,
    HashSet,
};
use itertools::Itertools;
use log::{
    debug,
    warn,
};
use rusqlite::{
    params_from_iter,
    Connection,
    OpenFlags,
};

use super::{
    id_variants,
    FetchedSequences,
    LocusRecord,
    SequenceStore,
    TableKind,
};
use crate::config::ToolkitConfig;
use crate::utils::preview_ids;

/// SQLite keeps at most 999 bound parameters per statement on old builds.
const BATCH_SIZE: usize = 500;

/// [`SequenceStore`] over the preprocessed genome database.
///
/// Sequence tables hold `(Gene, Seq)` rows, coordinate tables
/// `(id, seqid, start, end)` rows. Table names come from each assembly's
/// [`GenomeSource`](crate::config::GenomeSource). Every call opens its own
/// read-only connection, so the store can be shared between workers.
pub struct SqliteStore {
    config:  Arc<ToolkitConfig>,
    db_path: PathBuf,
}

impl SqliteStore {
    pub fn new(config: Arc<ToolkitConfig>) -> Self {
        let db_path = config.database_path.clone();
        Self { config, db_path }
    }

    fn connect(&self) -> anyhow::Result<Connection> {
        if !self.db_path.exists() {
            bail!(
                "Genome database {} does not exist",
                self.db_path.display()
            );
        }
        Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open {}", self.db_path.display()))
    }

    fn table_name(
        &self,
        assembly: &str,
        kind: TableKind,
    ) -> anyhow::Result<String> {
        let source = self
            .config
            .genome(assembly)
            .map_err(|e| anyhow!(e))?;
        Ok(match kind {
            TableKind::Cds => source.cds_table(),
            TableKind::Protein => source.protein_table(),
            TableKind::Coordinates => source.coordinates_table(),
        })
    }

    fn ensure_table(
        conn: &Connection,
        table: &str,
    ) -> anyhow::Result<()> {
        let exists = conn
            .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1")?
            .exists([table])?;
        if !exists {
            bail!("Table '{}' not found in the genome database", table);
        }
        Ok(())
    }

    fn existing_ids(
        conn: &Connection,
        table: &str,
        candidates: &[String],
    ) -> anyhow::Result<HashSet<String>> {
        let mut existing = HashSet::new();
        for batch in candidates.chunks(BATCH_SIZE) {
            let placeholders = (1..=batch.len())
                .map(|i| format!("?{}", i))
                .join(", ");
            let query = format!(
                "SELECT Gene FROM \"{}\" WHERE Gene IN ({})",
                table, placeholders
            );
            let mut stmt = conn.prepare(&query)?;
            let rows = stmt.query_map(params_from_iter(batch.iter()), |row| {
                row.get::<_, String>(0)
            })?;
            for gene in rows {
                existing.insert(gene?);
            }
        }
        Ok(existing)
    }

    fn fetch_sequences(
        conn: &Connection,
        table: &str,
        db_ids: &[String],
    ) -> anyhow::Result<HashMap<String, String>> {
        let mut sequences = HashMap::with_capacity(db_ids.len());
        for batch in db_ids.chunks(BATCH_SIZE) {
            let placeholders = (1..=batch.len())
                .map(|i| format!("?{}", i))
                .join(", ");
            let query = format!(
                "SELECT Gene, Seq FROM \"{}\" WHERE Gene IN ({})",
                table, placeholders
            );
            let mut stmt = conn.prepare(&query)?;
            let rows = stmt.query_map(params_from_iter(batch.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (gene, seq) = row?;
                sequences.insert(gene, seq);
            }
        }
        Ok(sequences)
    }
}

impl SequenceStore for SqliteStore {
    fn sequences_by_ids(
        &self,
        assembly: &str,
        kind: TableKind,
        gene_ids: &[String],
    ) -> anyhow::Result<FetchedSequences> {
        if gene_ids.is_empty() {
            return Ok(FetchedSequences::default());
        }
        let table = self.table_name(assembly, kind)?;
        let conn = self.connect()?;
        Self::ensure_table(&conn, &table)?;

        let variants = gene_ids
            .iter()
            .unique()
            .map(|id| (id.clone(), id_variants(id)))
            .collect::<HashMap<_, _>>();
        let candidates = variants
            .values()
            .flatten()
            .unique()
            .cloned()
            .collect_vec();
        let existing = Self::existing_ids(&conn, &table, &candidates)?;

        let mut resolved = HashMap::new();
        let mut not_found = Vec::new();
        for id in gene_ids.iter().unique() {
            match variants[id]
                .iter()
                .find(|variant| existing.contains(*variant))
            {
                Some(db_id) => {
                    resolved.insert(id.clone(), db_id.clone());
                },
                None => not_found.push(id.clone()),
            }
        }
        if !not_found.is_empty() {
            warn!(
                "No sequence for {} ids in {}: {}",
                not_found.len(),
                table,
                preview_ids(&not_found, 5)
            );
        }

        let db_ids = resolved
            .values()
            .unique()
            .cloned()
            .collect_vec();
        let sequences = Self::fetch_sequences(&conn, &table, &db_ids)?;

        let mut emitted = HashSet::new();
        let mut records = Vec::new();
        for id in gene_ids {
            let Some(db_id) = resolved.get(id)
            else {
                continue;
            };
            if let Some(seq) = sequences.get(db_id) {
                if emitted.insert(db_id.clone()) {
                    records.push(format!(">{}\n{}", db_id, seq));
                }
            }
        }
        debug!(
            "Fetched {} sequences from {} for {} ids",
            records.len(),
            table,
            gene_ids.len()
        );

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
        if gene_ids.is_empty() {
            return Ok(Vec::new());
        }
        let table = self.table_name(assembly, TableKind::Coordinates)?;
        let conn = self.connect()?;
        Self::ensure_table(&conn, &table)?;

        let unique_ids = gene_ids.iter().unique().cloned().collect_vec();
        let mut loci = Vec::new();
        for batch in unique_ids.chunks(BATCH_SIZE) {
            let placeholders = (1..=batch.len())
                .map(|i| format!("?{}", i))
                .join(", ");
            let query = format!(
                "SELECT id, seqid, start, \"end\" FROM \"{}\" WHERE id IN ({})",
                table, placeholders
            );
            let mut stmt = conn.prepare(&query)?;
            let rows = stmt.query_map(params_from_iter(batch.iter()), |row| {
                Ok(LocusRecord {
                    assembly: assembly.to_string(),
                    gene_id:  row.get(0)?,
                    seqid:    row.get(1)?,
                    start:    row.get::<_, i64>(2)? as u64,
                    end:      row.get::<_, i64>(3)? as u64,
                })
            })?;
            for locus in rows {
                loci.push(locus?);
            }
        }
        Ok(loci)
    }

    fn id_exists(
        &self,
        assembly: &str,
        kind: TableKind,
        id: &str,
    ) -> anyhow::Result<bool> {
        let table = self.table_name(assembly, kind)?;
        let conn = self.connect()?;
        Self::ensure_table(&conn, &table)?;
        let column = match kind {
            TableKind::Coordinates => "id",
            _ => "Gene",
        };
        let query = format!(
            "SELECT 1 FROM \"{}\" WHERE {} = ?1 LIMIT 1",
            table, column
        );
        let exists = conn.prepare(&query)?.exists([id])?;
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenomeSource;

    fn fixture() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("genomes.db");
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE x_cds (Gene TEXT, Seq TEXT);
             INSERT INTO x_cds VALUES ('GeneA.1', 'ATGAAA'), ('GeneA.2', 'ATGCCC'), ('GeneB.1', 'ATGTTT');
             CREATE TABLE x_genes (id TEXT, seqid TEXT, start INTEGER, \"end\" INTEGER);
             INSERT INTO x_genes VALUES ('GeneA', 'A01', 100, 900);",
        )
        .unwrap();
        drop(conn);

        let config = ToolkitConfig::default()
            .with_database_path(db_path)
            .with_genome(GenomeSource::new("X", "Gossypium hirsutum"));
        (dir, SqliteStore::new(Arc::new(config)))
    }

    #[test]
    fn resolves_transcripts_and_keeps_order() {
        let (_dir, store) = fixture();
        let ids = vec!["GeneB".to_string(), "GeneA".to_string(), "GeneZ".to_string()];
        let fetched = store
            .sequences_by_ids("X", TableKind::Cds, &ids)
            .unwrap();
        assert_eq!(fetched.fasta, ">GeneB.1\nATGTTT\n>GeneA.1\nATGAAA");
        assert_eq!(fetched.not_found, vec!["GeneZ".to_string()]);
    }

    #[test]
    fn looks_up_coordinates_and_existence() {
        let (_dir, store) = fixture();
        let loci = store
            .coordinates_by_ids("X", &["GeneA".to_string(), "GeneB".to_string()])
            .unwrap();
        assert_eq!(loci.len(), 1);
        assert_eq!(loci[0].locus_string(), "A01:100-900");

        assert!(store.id_exists("X", TableKind::Cds, "GeneA.2").unwrap());
        assert!(!store.id_exists("X", TableKind::Cds, "GeneA").unwrap());
        assert!(store
            .id_exists("X", TableKind::Coordinates, "GeneA")
            .unwrap());
    }

    #[test]
    fn missing_table_is_reported() {
        let (_dir, store) = fixture();
        assert!(store
            .id_exists("X", TableKind::Protein, "GeneA")
            .is_err());
        assert!(store
            .id_exists("Y", TableKind::Cds, "GeneA")
            .is_err());
    }
}

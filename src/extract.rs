//! Sequence extraction for a list of genes of one assembly.
//!
//! Ids are resolved strictly: if the sampled ids match neither form in the
//! store, extraction fails with [`HomologyError::Resolution`] instead of
//! guessing.

use std::fs::File;
use std::io::{
    BufWriter,
    Write,
};
use std::path::Path;

use bio::io::fasta::Reader as FastaReader;
use indexmap::IndexMap;
use log::{
    info,
    warn,
};

use crate::config::ResolutionConfig;
use crate::error::{
    HomologyError,
    Result,
};
use crate::resolve::{
    IdentityResolver,
    ResolutionPolicy,
};
use crate::store::{
    SequenceStore,
    TableKind,
};
use crate::task::{
    CancelToken,
    ProgressSink,
};
use crate::utils::preview_ids;

/// Column width of FASTA written by [`write_fasta`].
pub const FASTA_LINE_WIDTH: usize = 80;

/// Sequences of `gene_ids`, keyed by the id stored in the database, in
/// request order. `Ok(None)` means the run was cancelled.
pub fn extract_sequences(
    store: &dyn SequenceStore,
    resolution: &ResolutionConfig,
    assembly: &str,
    gene_ids: &[String],
    kind: TableKind,
    cancel: &CancelToken,
    progress: &dyn ProgressSink,
) -> Result<Option<IndexMap<String, String>>> {
    progress.report(5, "Resolving gene ids");
    let resolved = IdentityResolver::with_config(store, resolution)
        .with_table(kind)
        .resolve(assembly, gene_ids, ResolutionPolicy::Strict)?;
    if resolved.is_empty() {
        return Err(HomologyError::EmptyInput);
    }
    info!("Resolved {} ids for extraction from {}", resolved.ids.len(), assembly);
    if cancel.is_cancelled() {
        return Ok(None);
    }

    progress.report(10, "Fetching sequences");
    let fetched = store
        .sequences_by_ids(assembly, kind, &resolved.ids)
        .map_err(HomologyError::Store)?;
    if cancel.is_cancelled() {
        return Ok(None);
    }
    if fetched.is_empty() {
        return Err(HomologyError::NoSequences(fetched.not_found));
    }
    if !fetched.not_found.is_empty() {
        warn!(
            "{} ids have no {} sequence and are skipped: {}",
            fetched.not_found.len(),
            kind,
            preview_ids(&fetched.not_found, 10)
        );
    }

    progress.report(80, "Collecting sequences");
    let sequences = parse_fasta(&fetched.fasta)?;
    info!("Extracted {} sequences from {}", sequences.len(), assembly);
    progress.report(100, "Sequence extraction finished");
    Ok(Some(sequences))
}

/// Ordered `id -> sequence` map of a FASTA text.
pub fn parse_fasta(fasta: &str) -> Result<IndexMap<String, String>> {
    let mut sequences = IndexMap::new();
    for record in FastaReader::new(fasta.as_bytes()).records() {
        let record = record?;
        sequences.insert(
            record.id().to_string(),
            String::from_utf8_lossy(record.seq()).into_owned(),
        );
    }
    Ok(sequences)
}

/// Writes `sequences` as FASTA wrapped at [`FASTA_LINE_WIDTH`] columns.
pub fn write_fasta<W: Write>(
    writer: W,
    sequences: &IndexMap<String, String>,
) -> Result<()> {
    let mut writer = BufWriter::new(writer);
    for (id, sequence) in sequences {
        writeln!(writer, ">{}", id)?;
        for line in sequence.as_bytes().chunks(FASTA_LINE_WIDTH) {
            writer.write_all(line)?;
            writer.write_all(b"\n")?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn write_fasta_file(
    path: &Path,
    sequences: &IndexMap<String, String>,
) -> Result<()> {
    write_fasta(File::create(path)?, sequences)?;
    info!("Saved {} sequences to {}", sequences.len(), path.display());
    Ok(())
}

//! Annotating hit tables with genomic loci, and the locus conversion
//! pipeline built on top of it.

use std::fs::File;
use std::io::{
    BufWriter,
    Write,
};
use std::path::Path;
use std::sync::Arc;

use hashbrown::HashMap;
use itertools::Itertools;
use log::{
    info,
    warn,
};
use polars::prelude::*;

use crate::annotation::Region;
use crate::criteria::CriteriaOverrides;
use crate::error::{
    HomologyError,
    Result,
};
use crate::hits::{
    HIT_ID,
    HIT_LOCI,
    QUERY_ID,
    QUERY_LOCI,
};
use crate::homology::{
    HomologyOrchestrator,
    HomologyRequest,
};
use crate::ids::to_base_gene;
use crate::io::write_table;
use crate::store::SequenceStore;
use crate::task::{
    CancelToken,
    ProgressSink,
    ScaledProgress,
};

/// Joins query and hit loci onto a homology table.
pub struct LocusStitcher {
    store: Arc<dyn SequenceStore>,
}

impl LocusStitcher {
    pub fn new(store: Arc<dyn SequenceStore>) -> Self { Self { store } }

    /// Inserts `Query_Loci` after `Query_ID` and `Hit_Loci` after `Hit_ID`.
    ///
    /// Query ids are looked up as given in the source assembly; hit ids are
    /// reduced to their base gene first, since coordinate tables are keyed
    /// by gene. Rows without a locus keep a null loci cell.
    pub fn attach_loci(
        &self,
        mut df: DataFrame,
        source_assembly: &str,
        target_assembly: &str,
    ) -> Result<DataFrame> {
        if df.get_column_index(QUERY_ID).is_some() {
            let loci = self.loci_column(&df, QUERY_ID, QUERY_LOCI, source_assembly, |id| {
                id.to_string()
            })?;
            insert_after(&mut df, QUERY_ID, loci)?;
        }
        if df.get_column_index(HIT_ID).is_some() {
            let loci = self.loci_column(&df, HIT_ID, HIT_LOCI, target_assembly, to_base_gene)?;
            insert_after(&mut df, HIT_ID, loci)?;
        }
        Ok(df)
    }

    fn loci_column<F>(
        &self,
        df: &DataFrame,
        id_column: &str,
        loci_name: &str,
        assembly: &str,
        lookup_key: F,
    ) -> Result<Column>
    where
        F: Fn(&str) -> String, {
        let keys = df
            .column(id_column)?
            .as_materialized_series()
            .str()?
            .into_iter()
            .map(|id| id.map(&lookup_key))
            .collect_vec();
        let distinct = keys
            .iter()
            .flatten()
            .unique()
            .cloned()
            .collect_vec();

        let loci = self
            .store
            .coordinates_by_ids(assembly, &distinct)
            .map_err(HomologyError::Store)?
            .into_iter()
            .map(|record| (record.gene_id.clone(), record.locus_string()))
            .collect::<HashMap<_, _>>();

        let missing = distinct
            .iter()
            .filter(|id| !loci.contains_key(*id))
            .count();
        if missing > 0 {
            warn!(
                "{} of {} ids from {} have no coordinates in {}",
                missing,
                distinct.len(),
                id_column,
                assembly
            );
        }

        let values = keys
            .into_iter()
            .map(|key| key.and_then(|key| loci.get(&key).cloned()))
            .collect_vec();
        Ok(Column::new(loci_name.into(), values))
    }
}

fn insert_after(
    df: &mut DataFrame,
    anchor: &str,
    column: Column,
) -> PolarsResult<()> {
    if df.get_column_index(column.name()).is_some() {
        let _ = df.drop_in_place(column.name())?;
    }
    let idx = df
        .get_column_index(anchor)
        .map(|i| i + 1)
        .unwrap_or(df.width());
    df.insert_column(idx, column)?;
    Ok(())
}

/// Maps the genes of a source region onto the target assembly and returns
/// the hit table annotated with both loci.
///
/// The homology stage reports progress in `0..=80`. When `output` is given,
/// the table is written there, or a short commented note when no homolog
/// was found. `Ok(None)` means the run was cancelled.
#[allow(clippy::too_many_arguments)]
pub fn convert_locus(
    orchestrator: &HomologyOrchestrator,
    source_assembly: &str,
    target_assembly: &str,
    region: &Region,
    overrides: Option<CriteriaOverrides>,
    output: Option<&Path>,
    cancel: &CancelToken,
    progress: &dyn ProgressSink,
) -> Result<Option<DataFrame>> {
    let request = HomologyRequest::region(source_assembly, target_assembly, region.clone())
        .with_overrides(overrides);
    let mapping_progress = ScaledProgress::new(progress, 0, 80);
    let Some(hits) = orchestrator.run(&request, cancel, &mapping_progress)?
    else {
        return Ok(None);
    };

    if hits.height() == 0 {
        warn!("No homologous genes found for {} in {}", region, source_assembly);
        if let Some(path) = output {
            write_no_match_report(path, source_assembly, region, target_assembly)?;
        }
        progress.report(100, "No homologous genes found");
        return Ok(Some(hits));
    }

    progress.report(82, "Looking up source loci");
    if cancel.is_cancelled() {
        return Ok(None);
    }
    let stitcher = LocusStitcher::new(orchestrator.context().store.clone());
    let mut stitched = stitcher.attach_loci(hits, source_assembly, target_assembly)?;
    progress.report(95, "Loci attached");
    if cancel.is_cancelled() {
        return Ok(None);
    }

    if let Some(path) = output {
        write_table(&mut stitched, path)?;
        info!("Wrote locus conversion of {} to {}", region, path.display());
    }
    progress.report(100, "Locus conversion finished");
    Ok(Some(stitched))
}

fn write_no_match_report(
    path: &Path,
    source_assembly: &str,
    region: &Region,
    target_assembly: &str,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "# Source Locus: {} | {}", source_assembly, region)?;
    writeln!(writer, "# Target Assembly: {}", target_assembly)?;
    writeln!(writer, "# No successful homologous matches found to convert locus.")?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hits::{
        hits_to_frame,
        HomologyHit,
    };
    use crate::store::memory::MemoryStore;

    fn column_strings(
        df: &DataFrame,
        name: &str,
    ) -> Vec<Option<String>> {
        df.column(name)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.map(String::from))
            .collect()
    }

    #[test]
    fn loci_follow_their_id_columns() {
        let store = MemoryStore::new()
            .with_locus("X", "GeneA.1", "A01", 100, 900)
            .with_locus("Y", "GeneY", "D01", 5, 50);
        let stitcher = LocusStitcher::new(Arc::new(store));
        let df = hits_to_frame(vec![
            HomologyHit::new("GeneA.1", "GeneY.2"),
            HomologyHit::new("GeneA.1", "GeneX.3"),
        ])
        .unwrap();

        let stitched = stitcher.attach_loci(df, "X", "Y").unwrap();
        assert_eq!(stitched.height(), 2);
        let names = stitched
            .get_column_names()
            .into_iter()
            .map(|n| n.to_string())
            .collect_vec();
        assert_eq!(&names[..5], &[QUERY_ID, QUERY_LOCI, "Query_Length", HIT_ID, HIT_LOCI]);
        assert_eq!(
            column_strings(&stitched, QUERY_LOCI),
            vec![Some("A01:100-900".into()), Some("A01:100-900".into())]
        );
        assert_eq!(
            column_strings(&stitched, HIT_LOCI),
            vec![Some("D01:5-50".into()), None]
        );
    }

    #[test]
    fn empty_table_gains_loci_columns() {
        let stitcher = LocusStitcher::new(Arc::new(MemoryStore::new()));
        let df = hits_to_frame(Vec::new()).unwrap();
        let stitched = stitcher.attach_loci(df, "X", "Y").unwrap();
        assert_eq!(stitched.height(), 0);
        assert!(stitched.get_column_index(HIT_LOCI).is_some());
    }

    #[test]
    fn no_match_report_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locus.csv");
        write_no_match_report(&path, "HAU_v1", &Region::new("A01", 100, 200), "ZJU_v2.1").unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(
            text.lines().collect_vec(),
            vec![
                "# Source Locus: HAU_v1 | A01:100-200",
                "# Target Assembly: ZJU_v2.1",
                "# No successful homologous matches found to convert locus.",
            ]
        );
    }
}

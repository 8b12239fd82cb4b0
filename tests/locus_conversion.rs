use std::sync::{
    Arc,
    Mutex,
};

use cottonkit::extract::parse_fasta;
use cottonkit::hits::{
    hits_to_frame,
    HIT_ID,
    HIT_LOCI,
    QUERY_ID,
    QUERY_LOCI,
};
use cottonkit::locus::convert_locus;
use cottonkit::prelude::*;
use itertools::Itertools;
use polars::prelude::DataFrame;
use rstest::{
    fixture,
    rstest,
};

const SOURCE: &str = "HAU_v1";
const TARGET: &str = "ZJU_v2.1";

const SOURCE_GFF: &str = "##gff-version 3
A01\tHAU\tgene\t100\t900\t.\t+\t.\tID=Gh_A01G0001;Name=Gh_A01G0001
A01\tHAU\tmRNA\t100\t900\t.\t+\t.\tID=Gh_A01G0001.1;Parent=Gh_A01G0001
A01\tHAU\tgene\t1500\t2500\t.\t-\t.\tID=Gh_A01G0002
A01\tHAU\tgene\t9000\t9900\t.\t+\t.\tID=Gh_A01G0003
D01\tHAU\tgene\t100\t900\t.\t+\t.\tID=Gh_D01G0001
";

/// Maps every `Gh_A01G000N.1` query onto `Gh_D01G000N.1`.
struct SubgenomeSwapSearch {
    queries: Mutex<Vec<String>>,
    silent:  bool,
}

impl AlignmentSearch for SubgenomeSwapSearch {
    fn search(
        &self,
        request: &SearchRequest,
        cancel: &CancelToken,
    ) -> cottonkit::error::Result<Option<DataFrame>> {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        let queries = parse_fasta(&request.query_fasta)?;
        self.queries
            .lock()
            .unwrap()
            .extend(queries.keys().cloned());
        if self.silent {
            return Ok(Some(hits_to_frame(Vec::new())?));
        }
        let hits = queries
            .keys()
            .map(|id| {
                HomologyHit::new(id, &id.replace("_A01G", "_D01G"))
                    .with_identity(88.0)
                    .with_bit_score(250.0)
            })
            .collect_vec();
        Ok(Some(hits_to_frame(hits)?))
    }
}

fn strings(
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

#[fixture]
fn store() -> Arc<MemoryStore> {
    Arc::new(
        MemoryStore::new()
            .with_sequence(SOURCE, TableKind::Cds, "Gh_A01G0001.1", "ATGAAA")
            .with_sequence(SOURCE, TableKind::Cds, "Gh_A01G0002.1", "ATGCCC")
            .with_sequence(SOURCE, TableKind::Cds, "Gh_A01G0003.1", "ATGTTT")
            .with_locus(SOURCE, "Gh_A01G0001.1", "A01", 100, 900)
            .with_locus(SOURCE, "Gh_A01G0002.1", "A01", 1500, 2500)
            // Gh_D01G0002 has no coordinates in the target
            .with_locus(TARGET, "Gh_D01G0001", "D01", 120, 910),
    )
}

fn orchestrator(
    store: Arc<MemoryStore>,
    search: Arc<SubgenomeSwapSearch>,
) -> HomologyOrchestrator {
    let config = Arc::new(
        ToolkitConfig::default()
            .with_max_workers(2)
            .with_genome(GenomeSource::new(SOURCE, "Gossypium hirsutum"))
            .with_genome(GenomeSource::new(TARGET, "Gossypium hirsutum")),
    );
    let regions = GffIndex::new()
        .with_gff_reader(SOURCE, SOURCE_GFF.as_bytes())
        .unwrap();
    HomologyOrchestrator::new(
        config,
        SearchContext::new(store, search).with_region_index(Arc::new(regions)),
    )
}

fn search(silent: bool) -> Arc<SubgenomeSwapSearch> {
    Arc::new(SubgenomeSwapSearch {
        queries: Mutex::new(Vec::new()),
        silent,
    })
}

#[rstest]
fn region_genes_are_searched_and_stitched(store: Arc<MemoryStore>) {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("locus.tsv");
    let search = search(false);
    let orchestrator = orchestrator(store, search.clone());
    let region: Region = "A01:1-3,000".parse().unwrap();

    let stitched = convert_locus(
        &orchestrator,
        SOURCE,
        TARGET,
        &region,
        None,
        Some(output.as_path()),
        &CancelToken::new(),
        &NoProgress,
    )
    .unwrap()
    .unwrap()
    .sort([QUERY_ID], Default::default())
    .unwrap();

    let mut searched = search.queries.lock().unwrap().clone();
    searched.sort();
    assert_eq!(searched, vec!["Gh_A01G0001.1", "Gh_A01G0002.1"]);

    assert_eq!(stitched.height(), 2);
    assert_eq!(
        strings(&stitched, QUERY_LOCI),
        vec![Some("A01:100-900".into()), Some("A01:1500-2500".into())]
    );
    assert_eq!(
        strings(&stitched, HIT_ID),
        vec![Some("Gh_D01G0001.1".into()), Some("Gh_D01G0002.1".into())]
    );
    assert_eq!(strings(&stitched, HIT_LOCI), vec![Some("D01:120-910".into()), None]);

    let written = std::fs::read_to_string(output).unwrap();
    let header = written.lines().next().unwrap();
    assert!(header.starts_with("Query_ID\tQuery_Loci\t"));
    assert_eq!(written.lines().count(), 3);
}

#[rstest]
fn no_homologs_writes_a_report(store: Arc<MemoryStore>) {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("locus.csv");
    let orchestrator = orchestrator(store, search(true));
    let region = Region::new("A01", 100, 900);

    let hits = convert_locus(
        &orchestrator,
        SOURCE,
        TARGET,
        &region,
        None,
        Some(output.as_path()),
        &CancelToken::new(),
        &NoProgress,
    )
    .unwrap()
    .unwrap();
    assert_eq!(hits.height(), 0);

    let report = std::fs::read_to_string(output).unwrap();
    assert!(report.starts_with("# Source Locus: HAU_v1 | A01:100-900"));
    assert!(report.contains("# Target Assembly: ZJU_v2.1"));
}

#[rstest]
fn empty_region_has_nothing_to_search(store: Arc<MemoryStore>) {
    let orchestrator = orchestrator(store, search(false));
    let err = convert_locus(
        &orchestrator,
        SOURCE,
        TARGET,
        &Region::new("A13", 1, 1000),
        None,
        None,
        &CancelToken::new(),
        &NoProgress,
    )
    .unwrap_err();
    assert!(matches!(err, HomologyError::EmptyInput));
}

#[rstest]
fn mapping_progress_stays_below_eighty(store: Arc<MemoryStore>) {
    let reported = Mutex::new(Vec::new());
    let sink = |percent: u8, _: &str| reported.lock().unwrap().push(percent);
    let orchestrator = orchestrator(store, search(false));

    convert_locus(
        &orchestrator,
        SOURCE,
        TARGET,
        &Region::new("A01", 1, 3000),
        None,
        None,
        &CancelToken::new(),
        &sink,
    )
    .unwrap()
    .unwrap();

    let reported = reported.into_inner().unwrap();
    let stitching = reported
        .iter()
        .position(|p| *p == 82)
        .unwrap();
    assert!(reported[..stitching].iter().all(|p| *p <= 80));
    assert_eq!(reported.last(), Some(&100));
}

#[rstest]
fn cancelled_conversion_returns_none(store: Arc<MemoryStore>) {
    let cancel = CancelToken::new();
    cancel.cancel();
    let orchestrator = orchestrator(store, search(false));
    let result = convert_locus(
        &orchestrator,
        SOURCE,
        TARGET,
        &Region::new("A01", 1, 3000),
        None,
        None,
        &cancel,
        &NoProgress,
    )
    .unwrap();
    assert!(result.is_none());
}

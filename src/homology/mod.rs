//! Cross-assembly homology search.
//!
//! [`HomologyOrchestrator`] resolves the input genes, splits them into
//! balanced chunks and runs one [`HomologySearchWorker`] call per chunk on a
//! bounded pool. Chunk tables are concatenated in completion order and then
//! filtered (see [`filter`]).

use std::path::PathBuf;
use std::sync::Arc;

use crate::annotation::{
    Region,
    RegionIndex,
};
use crate::criteria::CriteriaOverrides;
use crate::search::AlignmentSearch;
use crate::store::SequenceStore;

pub mod filter;
mod orchestrator;
mod worker;

pub use orchestrator::HomologyOrchestrator;
pub use worker::HomologySearchWorker;

/// Collaborators shared by every worker of a run.
///
/// Passed explicitly instead of living in globals, so concurrent runs with
/// different stores or search tools never see each other.
#[derive(Clone)]
pub struct SearchContext {
    pub store:   Arc<dyn SequenceStore>,
    pub search:  Arc<dyn AlignmentSearch>,
    pub regions: Option<Arc<dyn RegionIndex>>,
}

impl SearchContext {
    pub fn new(
        store: Arc<dyn SequenceStore>,
        search: Arc<dyn AlignmentSearch>,
    ) -> Self {
        Self {
            store,
            search,
            regions: None,
        }
    }

    pub fn with_region_index(
        mut self,
        regions: Arc<dyn RegionIndex>,
    ) -> Self {
        self.regions = Some(regions);
        self
    }
}

/// Genes to search: an explicit list or every gene overlapping a region.
#[derive(Debug, Clone, PartialEq)]
pub enum HomologyInput {
    Genes(Vec<String>),
    Region(Region),
}

#[derive(Debug, Clone)]
pub struct HomologyRequest {
    pub source_assembly: String,
    pub target_assembly: String,
    pub input:           HomologyInput,
    pub overrides:       Option<CriteriaOverrides>,
    /// Written as CSV (`.csv`) or tab separated text otherwise.
    pub output:          Option<PathBuf>,
    /// Sort chunk tables by chunk index instead of completion order.
    pub stable_order:    bool,
}

impl HomologyRequest {
    pub fn new(
        source_assembly: &str,
        target_assembly: &str,
        input: HomologyInput,
    ) -> Self {
        Self {
            source_assembly: source_assembly.to_string(),
            target_assembly: target_assembly.to_string(),
            input,
            overrides: None,
            output: None,
            stable_order: false,
        }
    }

    pub fn genes(
        source_assembly: &str,
        target_assembly: &str,
        gene_ids: Vec<String>,
    ) -> Self {
        Self::new(source_assembly, target_assembly, HomologyInput::Genes(gene_ids))
    }

    pub fn region(
        source_assembly: &str,
        target_assembly: &str,
        region: Region,
    ) -> Self {
        Self::new(source_assembly, target_assembly, HomologyInput::Region(region))
    }

    crate::with_field_fn!(overrides, Option<CriteriaOverrides>);

    crate::with_field_fn!(output, Option<PathBuf>);

    crate::with_field_fn!(stable_order, bool);
}

/// Splits `ids` into at most `workers` contiguous chunks of
/// `ceil(len / workers)` ids.
pub fn partition_chunks(
    ids: &[String],
    workers: usize,
) -> Vec<Vec<String>> {
    if ids.is_empty() {
        return Vec::new();
    }
    let chunk_size = ids.len().div_ceil(workers.max(1)).max(1);
    ids.chunks(chunk_size)
        .map(<[String]>::to_vec)
        .collect()
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use rstest::rstest;

    use super::*;

    fn ids(n: usize) -> Vec<String> { (0..n).map(|i| format!("Gene{i}")).collect() }

    #[rstest]
    #[case(10, 3, vec![4, 4, 2])]
    #[case(10, 8, vec![2, 2, 2, 2, 2])]
    #[case(3, 8, vec![1, 1, 1])]
    #[case(8, 8, vec![1; 8])]
    #[case(7, 1, vec![7])]
    #[case(0, 4, vec![])]
    fn chunk_sizes(
        #[case] n: usize,
        #[case] workers: usize,
        #[case] expected: Vec<usize>,
    ) {
        let chunks = partition_chunks(&ids(n), workers);
        assert_eq!(chunks.iter().map(Vec::len).collect_vec(), expected);
    }

    #[rstest]
    fn chunks_partition_input(
        #[values(1, 2, 5, 17, 64)] n: usize,
        #[values(1, 3, 8, 100)] workers: usize,
    ) {
        let input = ids(n);
        let chunks = partition_chunks(&input, workers);
        assert!(chunks.len() <= workers);
        assert!(chunks.iter().all(|chunk| !chunk.is_empty()));
        assert_eq!(chunks.concat(), input);
    }

    #[test]
    fn zero_workers_behave_like_one() {
        assert_eq!(partition_chunks(&ids(3), 0).len(), 1);
    }
}

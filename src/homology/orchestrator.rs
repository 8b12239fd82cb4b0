use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::RecvTimeoutError;
use itertools::Itertools;
use log::{
    debug,
    error,
    info,
    warn,
};
use polars::prelude::DataFrame;
use rayon::ThreadPoolBuilder;

use super::filter::apply_filters;
use super::{
    partition_chunks,
    HomologyInput,
    HomologyRequest,
    HomologySearchWorker,
    SearchContext,
};
use crate::annotation::Region;
use crate::config::ToolkitConfig;
use crate::criteria::HomologySelectionCriteria;
use crate::error::{
    HomologyError,
    Result,
};
use crate::hits::empty_hit_frame;
use crate::ids::apply_id_pattern;
use crate::io::write_table;
use crate::resolve::{
    IdentityResolver,
    ResolutionPolicy,
};
use crate::task::{
    CancelToken,
    ProgressSink,
};
use crate::utils::dedup_preserving_order;

/// How often the collecting thread wakes up to look at the cancel token.
const CANCEL_POLL: Duration = Duration::from_millis(50);

type ChunkOutcome = (usize, Result<Option<DataFrame>>);

/// Fans a homology search out over a bounded worker pool and folds the
/// chunk tables back into one filtered hit table.
pub struct HomologyOrchestrator {
    config:  Arc<ToolkitConfig>,
    context: SearchContext,
}

impl HomologyOrchestrator {
    pub fn new(
        config: Arc<ToolkitConfig>,
        context: SearchContext,
    ) -> Self {
        Self { config, context }
    }

    pub fn config(&self) -> &ToolkitConfig { &self.config }

    pub fn context(&self) -> &SearchContext { &self.context }

    /// Runs the search described by `request`.
    ///
    /// Returns `Ok(None)` when `cancel` was set, in which case nothing is
    /// filtered or written. A run that found nothing returns a zero-row
    /// table. Gene lists are resolved strictly: an id format that cannot be
    /// detected fails with [`HomologyError::Resolution`].
    pub fn run(
        &self,
        request: &HomologyRequest,
        cancel: &CancelToken,
        progress: &dyn ProgressSink,
    ) -> Result<Option<DataFrame>> {
        progress.report(5, "Resolving input genes");
        if cancel.is_cancelled() {
            return Ok(None);
        }

        let gene_ids = self.resolve_input(request)?;
        if gene_ids.is_empty() {
            return Err(HomologyError::EmptyInput);
        }
        let criteria = HomologySelectionCriteria::from_overrides(request.overrides.as_ref());
        debug!("Homology criteria: {:?}", criteria);

        if cancel.is_cancelled() {
            return Ok(None);
        }
        let workers = self.config.effective_max_workers();
        let chunks = partition_chunks(&gene_ids, workers);
        info!(
            "Searching {} genes from {} against {} in {} chunks",
            gene_ids.len(),
            request.source_assembly,
            request.target_assembly,
            chunks.len()
        );
        progress.report(
            20,
            &format!("Searching {} genes in {} chunks", gene_ids.len(), chunks.len()),
        );

        let Some(mut tables) = self.run_chunks(request, chunks, workers, &criteria, cancel, progress)?
        else {
            info!("Homology search cancelled");
            return Ok(None);
        };
        if request.stable_order {
            tables.sort_by_key(|(idx, _)| *idx);
        }

        let combined = concat_tables(tables.into_iter().map(|(_, df)| df))?;
        if combined.height() == 0 {
            info!("No homologous hits found");
        }
        let same_family = self.is_cotton(&request.source_assembly)
            && self.is_cotton(&request.target_assembly);
        let mut filtered = apply_filters(combined, &criteria, same_family)?;
        progress.report(95, "Filtering hits");

        if cancel.is_cancelled() {
            return Ok(None);
        }
        if let Some(path) = request.output.as_ref() {
            write_table(&mut filtered, path)?;
            info!("Wrote {} hits to {}", filtered.height(), path.display());
        }
        progress.report(100, "Homology search finished");
        Ok(Some(filtered))
    }

    fn is_cotton(
        &self,
        assembly: &str,
    ) -> bool {
        self.config
            .genome(assembly)
            .map(|source| source.is_cotton())
            .unwrap_or(false)
    }

    /// Working gene list of a request: resolved gene ids, or the
    /// normalised ids of the genes overlapping the region.
    pub fn resolve_input(
        &self,
        request: &HomologyRequest,
    ) -> Result<Vec<String>> {
        match &request.input {
            HomologyInput::Genes(gene_ids) => {
                let resolver = IdentityResolver::with_config(
                    self.context.store.as_ref(),
                    &self.config.resolution,
                );
                Ok(resolver
                    .resolve(&request.source_assembly, gene_ids, ResolutionPolicy::Strict)?
                    .ids)
            },
            HomologyInput::Region(region) => self.genes_in_region(&request.source_assembly, region),
        }
    }

    fn genes_in_region(
        &self,
        assembly: &str,
        region: &Region,
    ) -> Result<Vec<String>> {
        let regions = self.context.regions.as_ref().ok_or_else(|| {
            HomologyError::Config("region input requires a region index".to_string())
        })?;
        let pattern = self.config.genome(assembly)?.gene_id_pattern()?;
        let genes = regions.genes_in_region(assembly, region)?;
        if genes.is_empty() {
            warn!("No genes found in {} of {}", region, assembly);
        }
        let ids = dedup_preserving_order(
            genes
                .iter()
                .filter_map(|gene| apply_id_pattern(&gene.gene_id, pattern.as_ref())),
        );
        debug!("{} of {} region genes kept after id normalisation", ids.len(), genes.len());
        Ok(ids)
    }

    /// Runs every chunk on a pool of `workers` threads.
    ///
    /// Outcomes are consumed in completion order. The first failure cancels
    /// the chunks that have not started yet and aborts the run. `None` means
    /// the caller cancelled.
    fn run_chunks(
        &self,
        request: &HomologyRequest,
        chunks: Vec<Vec<String>>,
        workers: usize,
        criteria: &HomologySelectionCriteria,
        cancel: &CancelToken,
        progress: &dyn ProgressSink,
    ) -> Result<Option<Vec<(usize, DataFrame)>>> {
        let total = chunks.len();
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.min(total).max(1))
            .thread_name(|i| format!("cottonkit-homology-{}", i))
            .panic_handler(|_| error!("Homology worker panicked"))
            .build()
            .map_err(|e| HomologyError::Config(format!("cannot start worker pool: {}", e)))?;

        let run_token = cancel.child();
        let worker = HomologySearchWorker::new(self.context.clone());
        let (sender, receiver) = crossbeam::channel::unbounded::<ChunkOutcome>();

        for (idx, chunk) in chunks.into_iter().enumerate() {
            let sender = sender.clone();
            let worker = worker.clone();
            let token = run_token.clone();
            let criteria = criteria.clone();
            let source = request.source_assembly.clone();
            let target = request.target_assembly.clone();
            pool.spawn(move || {
                let outcome = worker.search(&chunk, &source, &target, &criteria, &token);
                let _ = sender.send((idx, outcome));
            });
        }
        drop(sender);

        let mut tables = Vec::with_capacity(total);
        let mut completed = 0;
        while completed < total {
            if cancel.is_cancelled() {
                run_token.cancel();
                return Ok(None);
            }
            let (idx, outcome) = match receiver.recv_timeout(CANCEL_POLL) {
                Ok(message) => message,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            completed += 1;
            if cancel.is_cancelled() {
                run_token.cancel();
                return Ok(None);
            }

            match outcome {
                Ok(Some(df)) => {
                    debug!("Chunk {} returned {} hits", idx, df.height());
                    if df.height() > 0 {
                        tables.push((idx, df));
                    }
                },
                Ok(None) => {
                    run_token.cancel();
                    error!("Chunk {} returned no result", idx);
                    return Err(HomologyError::ToolFailure(format!(
                        "search of chunk {} returned no result",
                        idx
                    )));
                },
                Err(e) => {
                    run_token.cancel();
                    error!("Chunk {} failed: {}", idx, e);
                    return Err(e);
                },
            }

            let percent = 20 + completed * 70 / total;
            progress.report(
                percent as u8,
                &format!("Searched {}/{} chunks", completed, total),
            );
        }

        if completed < total {
            run_token.cancel();
            if cancel.is_cancelled() {
                return Ok(None);
            }
            return Err(HomologyError::ToolFailure(format!(
                "{} of {} chunks terminated without a result",
                total - completed,
                total
            )));
        }
        Ok(Some(tables))
    }
}

/// Stacks chunk tables; no tables give the empty hit table.
fn concat_tables<I>(tables: I) -> Result<DataFrame>
where
    I: IntoIterator<Item = DataFrame>, {
    let mut tables = tables.into_iter().collect_vec();
    if tables.is_empty() {
        return Ok(empty_hit_frame()?);
    }
    let mut combined = tables.remove(0);
    for df in tables.iter() {
        combined.vstack_mut(df)?;
    }
    combined.rechunk_mut();
    Ok(combined)
}

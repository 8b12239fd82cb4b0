use log::{
    debug,
    warn,
};
use polars::prelude::DataFrame;

use super::SearchContext;
use crate::criteria::HomologySelectionCriteria;
use crate::error::{
    HomologyError,
    Result,
};
use crate::hits::empty_hit_frame;
use crate::search::{
    SearchRequest,
    DEFAULT_WORD_SIZE,
};
use crate::store::TableKind;
use crate::task::CancelToken;
use crate::utils::preview_ids;

/// Searches one chunk of source genes against the target assembly.
#[derive(Clone)]
pub struct HomologySearchWorker {
    context: SearchContext,
}

impl HomologySearchWorker {
    pub fn new(context: SearchContext) -> Self { Self { context } }

    /// * `Ok(None)`: cancelled before or during the search.
    /// * `Ok(Some(df))` with zero rows: nothing to search or no hits.
    /// * `Err(_)`: the store or the search tool failed.
    pub fn search(
        &self,
        chunk: &[String],
        source_assembly: &str,
        target_assembly: &str,
        criteria: &HomologySelectionCriteria,
        cancel: &CancelToken,
    ) -> Result<Option<DataFrame>> {
        if cancel.is_cancelled() {
            return Ok(None);
        }

        let fetched = self
            .context
            .store
            .sequences_by_ids(source_assembly, TableKind::Cds, chunk)
            .map_err(HomologyError::Store)?;
        if !fetched.not_found.is_empty() {
            warn!(
                "{} of {} ids have no sequence in {}: {}",
                fetched.not_found.len(),
                chunk.len(),
                source_assembly,
                preview_ids(&fetched.not_found, 5)
            );
        }
        if fetched.is_empty() {
            debug!("Nothing to search for chunk of {} ids", chunk.len());
            return Ok(Some(empty_hit_frame()?));
        }

        if cancel.is_cancelled() {
            return Ok(None);
        }

        let request = SearchRequest::new(fetched.fasta, target_assembly)
            .with_evalue(criteria.evalue_threshold)
            .with_word_size(DEFAULT_WORD_SIZE)
            .with_max_target_seqs(criteria.top_n);
        self.context
            .search
            .search(&request, cancel)
    }
}

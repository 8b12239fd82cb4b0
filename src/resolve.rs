//! Sampling based detection of the id format of a caller's gene list.
//!
//! A handful of ids is drawn from the list and probed against the sequence
//! store, first in transcript form and then in base-gene form. The first
//! form found decides the mode for the whole list. Lists that mix both
//! forms are not supported: the mode picked from the sample is applied to
//! every id.

use itertools::Itertools;
use log::{
    debug,
    info,
    warn,
};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{
    Deserialize,
    Serialize,
};

use crate::config::ResolutionConfig;
use crate::error::{
    HomologyError,
    Result,
};
use crate::ids::{
    to_base_gene,
    to_transcript_with,
};
use crate::store::{
    SequenceStore,
    TableKind,
};
use crate::utils::dedup_preserving_order;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionMode {
    Gene,
    Transcript,
    Unknown,
}

/// What a call-site does when no sampled id matches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionPolicy {
    /// Fail with [`HomologyError::Resolution`].
    Strict,
    /// Return the input unchanged with [`ResolutionMode::Unknown`].
    PassThrough,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub mode: ResolutionMode,
    pub ids:  Vec<String>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool { self.ids.is_empty() }
}

/// Existence check used to probe sampled ids.
///
/// Every [`SequenceStore`] probes one of its tables; ortholog tables probe
/// their match column.
pub trait IdProbe {
    fn id_exists(
        &self,
        assembly: &str,
        id: &str,
    ) -> anyhow::Result<bool>;
}

enum ProbeTarget<'a> {
    Store {
        store: &'a dyn SequenceStore,
        table: TableKind,
    },
    Probe(&'a dyn IdProbe),
}

impl ProbeTarget<'_> {
    fn exists(
        &self,
        assembly: &str,
        id: &str,
    ) -> anyhow::Result<bool> {
        match self {
            ProbeTarget::Store { store, table } => store.id_exists(assembly, *table, id),
            ProbeTarget::Probe(probe) => probe.id_exists(assembly, id),
        }
    }
}

pub struct IdentityResolver<'a> {
    target:            ProbeTarget<'a>,
    sample_size:       usize,
    transcript_suffix: String,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(store: &'a dyn SequenceStore) -> Self {
        Self::with_config(store, &ResolutionConfig::default())
    }

    pub fn with_config(
        store: &'a dyn SequenceStore,
        config: &ResolutionConfig,
    ) -> Self {
        Self {
            target:            ProbeTarget::Store {
                store,
                table: TableKind::Cds,
            },
            sample_size:       config.sample_size.max(1),
            transcript_suffix: config.transcript_suffix.clone(),
        }
    }

    /// Resolver that probes through `probe` instead of a sequence table.
    pub fn with_probe(
        probe: &'a dyn IdProbe,
        config: &ResolutionConfig,
    ) -> Self {
        Self {
            target:            ProbeTarget::Probe(probe),
            sample_size:       config.sample_size.max(1),
            transcript_suffix: config.transcript_suffix.clone(),
        }
    }

    /// Table probed for id existence, CDS by default. Has no effect on a
    /// resolver built with [`IdentityResolver::with_probe`].
    pub fn with_table(
        mut self,
        table: TableKind,
    ) -> Self {
        if let ProbeTarget::Store { table: current, .. } = &mut self.target {
            *current = table;
        }
        self
    }

    /// Resolves `gene_ids` with a sample drawn from the thread-local RNG.
    pub fn resolve(
        &self,
        assembly: &str,
        gene_ids: &[String],
        policy: ResolutionPolicy,
    ) -> Result<Resolution> {
        self.resolve_with_rng(assembly, gene_ids, policy, &mut rand::thread_rng())
    }

    pub fn resolve_with_rng<R: Rng + ?Sized>(
        &self,
        assembly: &str,
        gene_ids: &[String],
        policy: ResolutionPolicy,
        rng: &mut R,
    ) -> Result<Resolution> {
        let sample = self.draw_sample(gene_ids, rng);
        self.resolve_with_sample(assembly, gene_ids, &sample, policy)
    }

    /// Resolves `gene_ids` using a caller-chosen sample.
    pub fn resolve_with_sample(
        &self,
        assembly: &str,
        gene_ids: &[String],
        sample: &[String],
        policy: ResolutionPolicy,
    ) -> Result<Resolution> {
        if gene_ids.is_empty() {
            return Ok(Resolution {
                mode: ResolutionMode::Unknown,
                ids:  Vec::new(),
            });
        }
        debug!("Resolving {} ids against {} with sample {:?}", gene_ids.len(), assembly, sample);

        let mode = self.detect_mode(assembly, sample)?;
        let ids = match mode {
            ResolutionMode::Transcript => {
                dedup_preserving_order(
                    gene_ids
                        .iter()
                        .map(|id| to_transcript_with(id, &self.transcript_suffix)),
                )
            },
            ResolutionMode::Gene => {
                dedup_preserving_order(gene_ids.iter().map(|id| to_base_gene(id)))
            },
            ResolutionMode::Unknown => {
                match policy {
                    ResolutionPolicy::Strict => {
                        return Err(HomologyError::Resolution {
                            assembly: assembly.to_string(),
                            sample:   sample.to_vec(),
                        });
                    },
                    ResolutionPolicy::PassThrough => {
                        warn!(
                            "Could not determine the id format for {}, using ids as given",
                            assembly
                        );
                        gene_ids.to_vec()
                    },
                }
            },
        };
        info!(
            "Resolved {} ids for {} as {:?} ({} after normalisation)",
            gene_ids.len(),
            assembly,
            mode,
            ids.len()
        );
        Ok(Resolution { mode, ids })
    }

    /// Up to `sample_size` distinct ids, chosen uniformly without
    /// replacement.
    pub fn draw_sample<R: Rng + ?Sized>(
        &self,
        gene_ids: &[String],
        rng: &mut R,
    ) -> Vec<String> {
        let distinct = gene_ids.iter().unique().collect_vec();
        let amount = self.sample_size.min(distinct.len());
        distinct
            .choose_multiple(rng, amount)
            .map(|id| (*id).clone())
            .collect()
    }

    fn detect_mode(
        &self,
        assembly: &str,
        sample: &[String],
    ) -> Result<ResolutionMode> {
        for id in sample {
            let transcript = to_transcript_with(id, &self.transcript_suffix);
            if self.target.exists(assembly, &transcript)? {
                debug!("{} found as transcript {}", id, transcript);
                return Ok(ResolutionMode::Transcript);
            }
            let base = to_base_gene(id);
            if self.target.exists(assembly, &base)? {
                debug!("{} found as gene {}", id, base);
                return Ok(ResolutionMode::Gene);
            }
        }
        Ok(ResolutionMode::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rstest::{
        fixture,
        rstest,
    };

    use super::*;
    use crate::store::memory::MemoryStore;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[fixture]
    fn transcript_store() -> MemoryStore {
        MemoryStore::new()
            .with_sequence("X", TableKind::Cds, "GeneA.1", "ATG")
            .with_sequence("X", TableKind::Cds, "GeneA.2", "ATG")
            .with_sequence("X", TableKind::Cds, "GeneB.1", "ATG")
    }

    #[fixture]
    fn gene_store() -> MemoryStore {
        MemoryStore::new()
            .with_sequence("X", TableKind::Cds, "GeneA", "ATG")
            .with_sequence("X", TableKind::Cds, "GeneB", "ATG")
    }

    #[rstest]
    fn detects_transcript_mode(transcript_store: MemoryStore) {
        let resolver = IdentityResolver::new(&transcript_store);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let resolution = resolver
            .resolve_with_rng("X", &ids(&["GeneA", "GeneB"]), ResolutionPolicy::Strict, &mut rng)
            .unwrap();
        assert_eq!(resolution.mode, ResolutionMode::Transcript);
        assert_eq!(resolution.ids, ids(&["GeneA.1", "GeneB.1"]));
    }

    #[rstest]
    fn detects_gene_mode_and_dedups(gene_store: MemoryStore) {
        let resolver = IdentityResolver::new(&gene_store);
        let resolution = resolver
            .resolve_with_sample(
                "X",
                &ids(&["GeneB.1", "GeneA.3", "GeneB.2"]),
                &ids(&["GeneB.1"]),
                ResolutionPolicy::Strict,
            )
            .unwrap();
        assert_eq!(resolution.mode, ResolutionMode::Gene);
        assert_eq!(resolution.ids, ids(&["GeneB", "GeneA"]));
    }

    #[rstest]
    fn stops_at_first_match(transcript_store: MemoryStore) {
        let resolver = IdentityResolver::new(&transcript_store);
        resolver
            .resolve_with_sample(
                "X",
                &ids(&["GeneA", "GeneB"]),
                &ids(&["GeneA", "GeneB"]),
                ResolutionPolicy::Strict,
            )
            .unwrap();
        assert_eq!(transcript_store.lookup_count(), 1);
    }

    #[rstest]
    fn no_match_depends_on_policy(gene_store: MemoryStore) {
        let resolver = IdentityResolver::new(&gene_store);
        let input = ids(&["Other2", "Other1", "Other2"]);

        let err = resolver
            .resolve("X", &input, ResolutionPolicy::Strict)
            .unwrap_err();
        assert!(matches!(err, HomologyError::Resolution { ref assembly, .. } if assembly == "X"));

        let resolution = resolver
            .resolve("X", &input, ResolutionPolicy::PassThrough)
            .unwrap();
        assert_eq!(resolution.mode, ResolutionMode::Unknown);
        assert_eq!(resolution.ids, input);
    }

    #[rstest]
    fn empty_input_resolves_to_empty(gene_store: MemoryStore) {
        let resolver = IdentityResolver::new(&gene_store);
        let resolution = resolver
            .resolve("X", &[], ResolutionPolicy::Strict)
            .unwrap();
        assert!(resolution.is_empty());
        assert_eq!(gene_store.lookup_count(), 0);
    }

    #[rstest]
    #[case(&["A"], 1)]
    #[case(&["A", "A", "A"], 1)]
    #[case(&["A", "B", "C", "D"], 2)]
    fn sample_is_distinct_and_bounded(
        gene_store: MemoryStore,
        #[case] input: &[&str],
        #[case] expected: usize,
    ) {
        let resolver = IdentityResolver::new(&gene_store);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let sample = resolver.draw_sample(&ids(input), &mut rng);
        assert_eq!(sample.len(), expected);
        assert_eq!(sample.iter().unique().count(), expected);
    }
}

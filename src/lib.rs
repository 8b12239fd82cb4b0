//! # cottonkit
//!
//! `cottonkit` resolves gene identifiers across naming conventions, pulls
//! per-gene sequences and coordinates from a local genome store and maps
//! genes between genome assemblies by running BLAST searches in parallel
//! chunks.
//!
//! ## Key Features
//!
//! * **Identifier normalisation**: conversion between base gene ids
//!   (`Gh_A01G0001`) and transcript ids (`Gh_A01G0001.1`), plus parsing of
//!   the subgenome/chromosome tag embedded in cotton gene ids ([`ids`]).
//! * **Identity resolution**: a sampling heuristic that decides whether a
//!   caller's gene list should be treated as gene-form or transcript-form
//!   against a given assembly ([`IdentityResolver`]).
//! * **Parallel homology search**: the input is split into balanced chunks
//!   and searched on a bounded Rayon pool with cooperative cancellation
//!   ([`HomologyOrchestrator`]). Results are [`polars`] DataFrames.
//! * **Locus stitching**: homology hits are annotated with the genomic loci
//!   of both the query and the hit gene ([`LocusStitcher`]).
//!
//! Number of search workers can be configured with the
//! `COTTONKIT_MAX_WORKERS` environment variable.
//!
//! ## Structure
//!
//! * [`ids`], [`resolve`]: identifier handling.
//! * [`store`], [`annotation`], [`search`]: the collaborators the engine
//!   consumes (sequence store, GFF region index, BLAST).
//! * [`homology`], [`locus`], [`extract`], [`ortholog`]: pipelines.
//! * [`config`], [`criteria`], [`task`], [`error`], [`io`]: ambient
//!   plumbing.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use cottonkit::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Arc::new(ToolkitConfig::from_path("cottonkit.json")?);
//!     let store = Arc::new(SqliteStore::new(config.clone()));
//!     let blast = Arc::new(BlastnCommand::from_config(&config));
//!     let orchestrator =
//!         HomologyOrchestrator::new(config.clone(), SearchContext::new(store, blast));
//!
//!     let request = HomologyRequest::genes(
//!         "HAU_v1",
//!         "ZJU_v2.1",
//!         vec!["Ghir_A01G000100".to_string()],
//!     );
//!     match orchestrator.run(&request, &CancelToken::new(), &NoProgress)? {
//!         Some(hits) => println!("{} homologous hits", hits.height()),
//!         None => println!("cancelled"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod annotation;
pub mod config;
pub mod criteria;
pub mod error;
pub mod extract;
pub mod hits;
pub mod homology;
pub mod ids;
pub mod io;
pub mod locus;
pub mod ortholog;
pub mod prelude;
pub mod resolve;
pub mod search;
pub mod store;
pub mod task;
pub mod utils;

pub use crate::homology::{
    HomologyOrchestrator,
    HomologySearchWorker,
};
pub use crate::locus::LocusStitcher;
pub use crate::resolve::IdentityResolver;

use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors raised by the resolution and homology pipelines.
///
/// Cancellation is not an error: pipelines return `Ok(None)` when the
/// caller's [`CancelToken`](crate::task::CancelToken) was set.
#[derive(Debug, Error)]
pub enum HomologyError {
    /// None of the sampled ids matched the assembly's sequence store.
    #[error(
        "no match found against the sequence store of assembly '{assembly}' \
         (sampled ids: {sample:?})"
    )]
    Resolution {
        assembly: String,
        sample:   Vec<String>,
    },
    /// The working gene list was empty after resolution or region
    /// extraction.
    #[error("gene list is empty after resolution")]
    EmptyInput,
    /// The alignment tool reported a fatal error. Aborts the whole run.
    #[error("alignment tool failure: {0}")]
    ToolFailure(String),
    #[error("assembly '{0}' is not configured")]
    UnknownAssembly(String),
    /// Sequence extraction found no sequence for any requested id.
    #[error("no sequences found for the requested ids: {}", .0.join(", "))]
    NoSequences(Vec<String>),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
    #[error(transparent)]
    Table(#[from] PolarsError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HomologyError>;

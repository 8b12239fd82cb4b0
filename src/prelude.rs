pub use crate::annotation::{
    GeneFeature,
    GffIndex,
    Region,
    RegionIndex,
};
pub use crate::config::{
    GenomeSource,
    ResolutionConfig,
    ToolkitConfig,
};
pub use crate::criteria::{
    CriteriaOverrides,
    HomologySelectionCriteria,
};
pub use crate::error::{
    HomologyError,
    Result,
};
pub use crate::hits::HomologyHit;
pub use crate::homology::{
    HomologyInput,
    HomologyOrchestrator,
    HomologyRequest,
    HomologySearchWorker,
    SearchContext,
};
pub use crate::ids::{
    to_base_gene,
    to_transcript,
    SubgenomeTag,
};
pub use crate::locus::LocusStitcher;
pub use crate::ortholog::{
    ConversionDirection,
    OrthologTable,
    SqliteOrthologTable,
};
pub use crate::resolve::{
    IdProbe,
    IdentityResolver,
    Resolution,
    ResolutionMode,
    ResolutionPolicy,
};
pub use crate::search::{
    AlignmentSearch,
    BlastnCommand,
    SearchRequest,
};
pub use crate::store::memory::MemoryStore;
pub use crate::store::sqlite::SqliteStore;
pub use crate::store::{
    FetchedSequences,
    LocusRecord,
    SequenceStore,
    TableKind,
};
pub use crate::task::{
    CancelToken,
    NoProgress,
    ProgressSink,
};

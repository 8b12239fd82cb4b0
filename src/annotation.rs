//! GFF3-backed region index: which genes overlap a chromosome span.

use std::fmt;
use std::io::Read;
use std::path::{
    Path,
    PathBuf,
};
use std::str::FromStr;
use std::sync::{
    Arc,
    Mutex,
};

use anyhow::{
    anyhow,
    bail,
    Context,
};
use hashbrown::HashMap;
use itertools::Itertools;
use log::{
    debug,
    info,
    warn,
};
use rust_lapper::{
    Interval,
    Lapper,
};
use serde::{
    Deserialize,
    Serialize,
};

use crate::config::ToolkitConfig;

/// Chromosome span, 1-based and inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub chrom: String,
    pub start: u64,
    pub end:   u64,
}

impl Region {
    pub fn new(
        chrom: &str,
        start: u64,
        end: u64,
    ) -> Self {
        Self {
            chrom: chrom.to_string(),
            start: start.min(end),
            end: start.max(end),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chrom, self.start, self.end)
    }
}

/// Parses `chrom:start-end`; thousands separators in the coordinates are
/// accepted.
impl FromStr for Region {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (chrom, span) = s
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| anyhow!("Region '{}' is not in chrom:start-end form", s))?;
        let (start, end) = span
            .split_once('-')
            .ok_or_else(|| anyhow!("Region '{}' is missing an end coordinate", s))?;
        let parse = |value: &str| {
            value
                .replace(',', "")
                .trim()
                .parse::<u64>()
                .with_context(|| format!("Invalid coordinate '{}' in region '{}'", value, s))
        };
        if chrom.is_empty() {
            bail!("Region '{}' has an empty chromosome", s);
        }
        Ok(Region::new(chrom, parse(start)?, parse(end)?))
    }
}

/// Gene feature as found in the annotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeneFeature {
    pub gene_id: String,
    pub seqid:   String,
    pub start:   u64,
    pub end:     u64,
    pub strand:  char,
}

/// Lookup of the genes overlapping a region of an assembly.
pub trait RegionIndex: Send + Sync {
    fn genes_in_region(
        &self,
        assembly: &str,
        region: &Region,
    ) -> anyhow::Result<Vec<GeneFeature>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RawGffEntry {
    seqid:        String,
    source:       String,
    feature_type: String,
    start:        u64,
    end:          u64,
    score:        String,
    strand:       String,
    phase:        String,
    attributes:   String,
}

impl RawGffEntry {
    fn attribute(
        &self,
        key: &str,
    ) -> Option<&str> {
        self.attributes
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }
}

type GeneIntervals = HashMap<String, Lapper<u64, GeneFeature>>;

/// Gene intervals of one or more assemblies, one [`Lapper`] per seqid.
///
/// Assemblies registered through [`GffIndex::from_config`] are parsed on
/// first use and kept afterwards.
#[derive(Default)]
pub struct GffIndex {
    paths:  HashMap<String, PathBuf>,
    loaded: Mutex<HashMap<String, Arc<GeneIntervals>>>,
}

impl GffIndex {
    pub fn new() -> Self { Self::default() }

    /// Registers the `gff3_path` of every configured assembly.
    pub fn from_config(config: &ToolkitConfig) -> Self {
        let paths = config
            .genome_sources
            .iter()
            .filter_map(|(id, source)| {
                source
                    .gff3_path()
                    .map(|path| (id.clone(), path.to_path_buf()))
            })
            .collect();
        Self {
            paths,
            loaded: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_gff_path<P: AsRef<Path>>(
        mut self,
        assembly: &str,
        path: P,
    ) -> Self {
        self.paths
            .insert(assembly.to_string(), path.as_ref().to_path_buf());
        self
    }

    /// Parses `reader` as GFF3 and registers its genes for `assembly`.
    pub fn with_gff_reader<R: Read>(
        self,
        assembly: &str,
        reader: R,
    ) -> anyhow::Result<Self> {
        let intervals = read_gene_intervals(reader)?;
        self.loaded
            .lock()
            .map_err(|_| anyhow!("GFF index lock poisoned"))?
            .insert(assembly.to_string(), Arc::new(intervals));
        Ok(self)
    }

    fn intervals(
        &self,
        assembly: &str,
    ) -> anyhow::Result<Arc<GeneIntervals>> {
        let mut loaded = self
            .loaded
            .lock()
            .map_err(|_| anyhow!("GFF index lock poisoned"))?;
        if let Some(intervals) = loaded.get(assembly) {
            return Ok(intervals.clone());
        }
        let path = self
            .paths
            .get(assembly)
            .ok_or_else(|| anyhow!("No GFF3 annotation configured for '{}'", assembly))?;
        info!("Indexing GFF3 annotation {} for {}", path.display(), assembly);
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let intervals = Arc::new(read_gene_intervals(file)?);
        loaded.insert(assembly.to_string(), intervals.clone());
        Ok(intervals)
    }
}

impl RegionIndex for GffIndex {
    fn genes_in_region(
        &self,
        assembly: &str,
        region: &Region,
    ) -> anyhow::Result<Vec<GeneFeature>> {
        let intervals = self.intervals(assembly)?;
        let Some(lapper) = intervals.get(&region.chrom)
        else {
            warn!("Chromosome {} not present in the {} annotation", region.chrom, assembly);
            return Ok(Vec::new());
        };
        let genes = lapper
            .find(region.start, region.end + 1)
            .map(|interval| interval.val.clone())
            .sorted_by_key(|gene| (gene.start, gene.end))
            .collect_vec();
        debug!("{} genes overlap {} in {}", genes.len(), region, assembly);
        Ok(genes)
    }
}

fn read_gene_intervals<R: Read>(reader: R) -> anyhow::Result<GeneIntervals> {
    let mut reader = csv::ReaderBuilder::default()
        .delimiter(b'\t')
        .has_headers(false)
        .comment(Some(b'#'))
        .quoting(false)
        .flexible(true)
        .from_reader(reader);

    let mut by_seqid: HashMap<String, Vec<Interval<u64, GeneFeature>>> = HashMap::new();
    for record in reader.records() {
        let record = record?;
        // Embedded FASTA and malformed lines
        if record.len() != 9 {
            continue;
        }
        let entry: RawGffEntry = record.deserialize(None)?;
        if entry.feature_type != "gene" {
            continue;
        }
        let Some(gene_id) = entry
            .attribute("ID")
            .or_else(|| entry.attribute("Name"))
        else {
            continue;
        };
        let feature = GeneFeature {
            gene_id: gene_id.to_string(),
            seqid:   entry.seqid.clone(),
            start:   entry.start,
            end:     entry.end,
            strand:  entry.strand.chars().next().unwrap_or('.'),
        };
        by_seqid
            .entry(entry.seqid)
            .or_default()
            .push(Interval {
                start: feature.start,
                stop:  feature.end + 1,
                val:   feature,
            });
    }

    Ok(by_seqid
        .into_iter()
        .map(|(seqid, intervals)| (seqid, Lapper::new(intervals)))
        .collect())
}

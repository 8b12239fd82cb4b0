//! Resolved toolkit configuration handed to the pipelines.
//!
//! Every genome assembly is described by one [`GenomeSource`], read through
//! a single set of accessors.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{
    Path,
    PathBuf,
};

use itertools::Itertools;
use log::{
    debug,
    warn,
};
use regex_lite::Regex;
use serde::{
    Deserialize,
    Serialize,
};

use crate::error::{
    HomologyError,
    Result,
};
use crate::utils::env_max_workers;
use crate::with_field_fn;

const DEFAULT_MAX_WORKERS: usize = 8;
const DEFAULT_DATABASE_PATH: &str = "genomes/genomes.db";
const IGNORED_ID_PREFIXES: [&str; 3] = ["scaffold", "unknown", "chr"];

/// Description of one genome assembly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenomeSource {
    #[serde(skip)]
    id:                String,
    species_name:      String,
    gene_id_regex:     Option<String>,
    homology_url:      Option<String>,
    gff3_path:         Option<PathBuf>,
    blast_db:          Option<PathBuf>,
    cds_table:         Option<String>,
    protein_table:     Option<String>,
    coordinates_table: Option<String>,
    homology_table:    Option<String>,
    cotton:            Option<bool>,
}

impl GenomeSource {
    pub fn new(
        id: &str,
        species_name: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            species_name: species_name.to_string(),
            ..Default::default()
        }
    }

    with_field_fn!(gene_id_regex, Option<String>);
    with_field_fn!(homology_url, Option<String>);
    with_field_fn!(gff3_path, Option<PathBuf>);
    with_field_fn!(blast_db, Option<PathBuf>);
    with_field_fn!(cds_table, Option<String>);
    with_field_fn!(protein_table, Option<String>);
    with_field_fn!(coordinates_table, Option<String>);
    with_field_fn!(homology_table, Option<String>);
    with_field_fn!(cotton, Option<bool>);

    pub fn id(&self) -> &str { &self.id }

    pub fn species_name(&self) -> &str { &self.species_name }

    pub fn gene_id_regex(&self) -> Option<&str> { self.gene_id_regex.as_deref() }

    /// Compiled [`gene_id_regex`](Self::gene_id_regex).
    pub fn gene_id_pattern(&self) -> Result<Option<Regex>> {
        self.gene_id_regex
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    HomologyError::Config(format!(
                        "invalid gene_id_regex for '{}': {}",
                        self.id, e
                    ))
                })
            })
            .transpose()
    }

    pub fn homology_url(&self) -> Option<&str> { self.homology_url.as_deref() }

    pub fn gff3_path(&self) -> Option<&Path> { self.gff3_path.as_deref() }

    pub fn blast_db(&self) -> Option<&Path> { self.blast_db.as_deref() }

    pub fn cds_table(&self) -> String {
        self.cds_table
            .clone()
            .unwrap_or_else(|| format!("{}_cds", sanitize_table_name(&self.id)))
    }

    pub fn protein_table(&self) -> String {
        self.protein_table
            .clone()
            .unwrap_or_else(|| format!("{}_protein", sanitize_table_name(&self.id)))
    }

    pub fn coordinates_table(&self) -> String {
        self.coordinates_table
            .clone()
            .unwrap_or_else(|| format!("{}_genes", sanitize_table_name(&self.id)))
    }

    pub fn homology_table(&self) -> String {
        self.homology_table
            .clone()
            .unwrap_or_else(|| format!("{}_homology", sanitize_table_name(&self.id)))
    }

    /// Whether the assembly belongs to the cotton (*Gossypium*) family.
    /// An explicit `cotton` flag wins over the species name.
    pub fn is_cotton(&self) -> bool {
        self.cotton.unwrap_or_else(|| {
            self.species_name
                .to_ascii_lowercase()
                .contains("gossypium")
        })
    }
}

/// Lowercases and replaces every non-alphanumeric character with `_`.
pub fn sanitize_table_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            }
            else {
                '_'
            }
        })
        .collect()
}

/// Identity resolution knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Ids probed against the store before deciding the id format.
    pub sample_size:       usize,
    pub transcript_suffix: String,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            sample_size:       2,
            transcript_suffix: crate::ids::DEFAULT_TRANSCRIPT_SUFFIX.to_string(),
        }
    }
}

/// External BLAST+ executables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlastConfig {
    pub blastn:      PathBuf,
    pub makeblastdb: PathBuf,
    /// `-num_threads` passed to every blastn call.
    pub num_threads: usize,
}

impl Default for BlastConfig {
    fn default() -> Self {
        Self {
            blastn:      PathBuf::from("blastn"),
            makeblastdb: PathBuf::from("makeblastdb"),
            num_threads: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolkitConfig {
    pub max_workers:    usize,
    pub database_path:  PathBuf,
    pub resolution:     ResolutionConfig,
    pub blast:          BlastConfig,
    pub genome_sources: BTreeMap<String, GenomeSource>,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            max_workers:    DEFAULT_MAX_WORKERS,
            database_path:  PathBuf::from(DEFAULT_DATABASE_PATH),
            resolution:     ResolutionConfig::default(),
            blast:          BlastConfig::default(),
            genome_sources: BTreeMap::new(),
        }
    }
}

impl ToolkitConfig {
    with_field_fn!(max_workers, usize);
    with_field_fn!(database_path, PathBuf);
    with_field_fn!(resolution, ResolutionConfig);
    with_field_fn!(blast, BlastConfig);

    /// Reads a JSON configuration. Relative paths inside it are resolved
    /// against the file's directory.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let mut config: Self = serde_json::from_reader(reader)?;
        config.assign_ids();
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        debug!(
            "Loaded configuration {} with {} genome sources",
            path.display(),
            config.genome_sources.len()
        );
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let mut config: Self = serde_json::from_str(json)?;
        config.assign_ids();
        Ok(config)
    }

    pub fn with_genome(
        mut self,
        source: GenomeSource,
    ) -> Self {
        self.genome_sources
            .insert(source.id.clone(), source);
        self
    }

    pub fn genome(
        &self,
        assembly: &str,
    ) -> Result<&GenomeSource> {
        self.genome_sources
            .get(assembly)
            .ok_or_else(|| HomologyError::UnknownAssembly(assembly.to_string()))
    }

    /// Configured worker count, overridden by `COTTONKIT_MAX_WORKERS`, never
    /// below one.
    pub fn effective_max_workers(&self) -> usize {
        env_max_workers()
            .unwrap_or(self.max_workers)
            .max(1)
    }

    /// Best matching assembly for a list of ids, scored by the percentage
    /// of ids its `gene_id_regex` matches.
    pub fn identify_assembly(
        &self,
        gene_ids: &[String],
    ) -> Option<(String, f64)> {
        let candidates = gene_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .filter(|id| {
                let lower = id.to_ascii_lowercase();
                !IGNORED_ID_PREFIXES
                    .iter()
                    .any(|prefix| lower.starts_with(prefix))
            })
            .collect_vec();
        if candidates.is_empty() {
            debug!("No usable ids left for assembly identification");
            return None;
        }

        let mut scores = Vec::new();
        for (assembly, source) in self.genome_sources.iter() {
            let Some(pattern) = source.gene_id_regex()
            else {
                continue;
            };
            let regex = match Regex::new(&format!("^(?:{})", pattern)) {
                Ok(regex) => regex,
                Err(e) => {
                    warn!("Invalid gene_id_regex for '{}': {}", assembly, e);
                    continue;
                },
            };
            let matched = candidates
                .iter()
                .filter(|id| regex.is_match(id))
                .count();
            if matched > 0 {
                let score = matched as f64 / candidates.len() as f64 * 100.0;
                debug!("Assembly {} scored {:.2}%", assembly, score);
                scores.push((assembly.clone(), score));
            }
        }

        scores
            .into_iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }

    fn assign_ids(&mut self) {
        for (id, source) in self.genome_sources.iter_mut() {
            source.id = id.clone();
        }
    }

    fn resolve_relative_to(
        &mut self,
        base: &Path,
    ) {
        let absolutize = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        absolutize(&mut self.database_path);
        for source in self.genome_sources.values_mut() {
            if let Some(path) = source.gff3_path.as_mut() {
                absolutize(path);
            }
            if let Some(path) = source.blast_db.as_mut() {
                absolutize(path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const CONFIG_JSON: &str = r#"{
        "max_workers": 4,
        "database_path": "genomes.db",
        "genome_sources": {
            "HAU_v1": {
                "species_name": "Gossypium hirsutum (AD1) HAU_v1",
                "gene_id_regex": "Ghir_[AD]\\d{2}G\\d+",
                "gff3_path": "hau.gff3",
                "blast_db": "hau_cds.fa"
            },
            "Araport11": {
                "species_name": "Arabidopsis thaliana",
                "gene_id_regex": "AT[1-5CM]G\\d{5}"
            }
        }
    }"#;

    #[test]
    fn parses_and_assigns_ids() {
        let config = ToolkitConfig::from_json_str(CONFIG_JSON).unwrap();
        assert_eq!(config.max_workers, 4);
        let hau = config.genome("HAU_v1").unwrap();
        assert_eq!(hau.id(), "HAU_v1");
        assert!(hau.is_cotton());
        assert_eq!(hau.cds_table(), "hau_v1_cds");
        assert!(!config.genome("Araport11").unwrap().is_cotton());
        assert!(matches!(
            config.genome("missing"),
            Err(HomologyError::UnknownAssembly(_))
        ));
    }

    #[test]
    fn relative_paths_follow_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cottonkit.json");
        File::create(&path)
            .unwrap()
            .write_all(CONFIG_JSON.as_bytes())
            .unwrap();
        let config = ToolkitConfig::from_path(&path).unwrap();
        assert_eq!(config.database_path, dir.path().join("genomes.db"));
        assert_eq!(
            config.genome("HAU_v1").unwrap().blast_db(),
            Some(dir.path().join("hau_cds.fa").as_path())
        );
    }

    #[test]
    fn cotton_flag_overrides_species() {
        let source = GenomeSource::new("X", "Gossypium arboreum").with_cotton(Some(false));
        assert!(!source.is_cotton());
    }

    #[test]
    fn identifies_assembly_by_regex_score() {
        let config = ToolkitConfig::from_json_str(CONFIG_JSON).unwrap();
        let ids = vec![
            "Ghir_A01G000100".to_string(),
            "Ghir_D05G001200".to_string(),
            "AT1G01010".to_string(),
            "scaffold_12".to_string(),
        ];
        let (assembly, score) = config.identify_assembly(&ids).unwrap();
        assert_eq!(assembly, "HAU_v1");
        assert!((score - 200.0 / 3.0).abs() < 1e-9);

        assert!(config
            .identify_assembly(&["chr01".to_string()])
            .is_none());
    }

    #[test]
    fn sanitizes_table_names() {
        assert_eq!(sanitize_table_name("ZJU_v2.1"), "zju_v2_1");
    }
}

use std::fs::File;
use std::io::{
    BufRead,
    BufReader,
};
use std::path::{
    Path,
    PathBuf,
};
use std::sync::Arc;

use anyhow::{
    anyhow,
    Context,
};
use clap::Args;
use cottonkit::prelude::*;
use indicatif::{
    ProgressBar,
    ProgressStyle,
};
use itertools::Itertools;
use log::LevelFilter;

#[derive(Args, Debug, Clone)]
pub(crate) struct UtilsArgs {
    #[arg(
        short = 'c',
        long,
        default_value = "cottonkit.json",
        help = "Path to the JSON configuration",
        help_heading = "GENERAL"
    )]
    pub config: PathBuf,

    #[arg(
        short = 'T',
        long,
        default_value_t = 0,
        help = "Number of parallel search workers (0 keeps the configured value)",
        help_heading = "GENERAL"
    )]
    pub threads: usize,

    #[arg(long, default_value_t = false, help = "Display progress bar", help_heading = "GENERAL")]
    pub progress: bool,

    #[arg(short, long, default_value_t = false, help = "Verbose logging", help_heading = "GENERAL")]
    pub verbose: bool,
}

impl UtilsArgs {
    pub fn setup(&self) -> anyhow::Result<()> {
        let level = if self.verbose {
            LevelFilter::Debug
        }
        else {
            LevelFilter::Info
        };
        pretty_env_logger::formatted_builder()
            .filter_level(level)
            .parse_default_env()
            .try_init()?;
        Ok(())
    }

    pub fn load_config(&self) -> anyhow::Result<Arc<ToolkitConfig>> {
        let mut config = ToolkitConfig::from_path(&self.config)
            .with_context(|| format!("Failed to read configuration {}", self.config.display()))?;
        if self.threads > 0 {
            config.max_workers = self.threads;
        }
        Ok(Arc::new(config))
    }

    pub fn progress_sink(&self) -> anyhow::Result<Box<dyn ProgressSink>> {
        if self.progress {
            Ok(Box::new(BarProgress(init_pbar()?)))
        }
        else {
            Ok(Box::new(NoProgress))
        }
    }
}

/// Gene ids given on the command line or in a file.
#[derive(Args, Debug, Clone)]
pub(crate) struct GeneInput {
    #[arg(short, long, num_args = 1.., value_delimiter = ',', help = "Gene ids")]
    pub genes: Vec<String>,

    #[arg(long, help = "File with gene ids, one per line")]
    pub gene_file: Option<PathBuf>,
}

impl GeneInput {
    pub fn collect(&self) -> anyhow::Result<Vec<String>> {
        let mut ids = self
            .genes
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect_vec();
        if let Some(path) = &self.gene_file {
            ids.extend(read_id_file(path)?);
        }
        if ids.is_empty() {
            return Err(anyhow!("No gene ids given, use --genes or --gene-file"));
        }
        Ok(ids)
    }
}

fn read_id_file(path: &Path) -> anyhow::Result<Vec<String>> {
    let reader = BufReader::new(
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
    );
    let mut ids = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let id = line.trim();
        if id.is_empty() || id.starts_with('#') {
            continue;
        }
        ids.push(id.to_string());
    }
    Ok(ids)
}

/// Parses `--criteria` JSON into overrides.
pub(crate) fn parse_overrides(raw: Option<&str>) -> anyhow::Result<Option<CriteriaOverrides>> {
    let Some(raw) = raw
    else {
        return Ok(None);
    };
    match serde_json::from_str::<serde_json::Value>(raw)? {
        serde_json::Value::Object(map) => Ok(Some(map)),
        other => Err(anyhow!("Criteria must be a JSON object, got {}", other)),
    }
}

pub fn init_pbar() -> anyhow::Result<ProgressBar> {
    let progress_bar = ProgressBar::new(100);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")?
            .progress_chars("#>-"),
    );
    progress_bar.set_message("Starting...");
    Ok(progress_bar)
}

struct BarProgress(ProgressBar);

impl ProgressSink for BarProgress {
    fn report(
        &self,
        percent: u8,
        message: &str,
    ) {
        self.0.set_position(percent.min(100) as u64);
        self.0.set_message(message.to_string());
        if percent >= 100 {
            self.0.finish_and_clear();
        }
    }
}

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use clap::Args;
use console::style;
use cottonkit::prelude::*;
use log::info;

use crate::utils::{
    parse_overrides,
    GeneInput,
    UtilsArgs,
};

#[derive(Args, Debug, Clone)]
pub(crate) struct HomologyArgs {
    #[arg(required = true, help = "Source assembly id")]
    source: String,

    #[arg(required = true, help = "Target assembly id")]
    target: String,

    #[clap(flatten)]
    genes: GeneInput,

    #[arg(short, long, conflicts_with_all = ["genes", "gene_file"], help = "Search every gene in chrom:start-end instead of a gene list")]
    region: Option<Region>,

    #[arg(short, long, help = "Output table (.csv or tab separated)")]
    output: Option<PathBuf>,

    #[arg(long, help = "Selection criteria overrides as a JSON object")]
    criteria: Option<String>,

    #[arg(long, default_value_t = false, help = "Keep rows in input order")]
    stable_order: bool,
}

impl HomologyArgs {
    pub fn run(
        &self,
        utils: &UtilsArgs,
    ) -> anyhow::Result<()> {
        let config = utils.load_config()?;
        let orchestrator = build_orchestrator(config);
        let request = match &self.region {
            Some(region) => HomologyRequest::region(&self.source, &self.target, region.clone()),
            None => HomologyRequest::genes(&self.source, &self.target, self.genes.collect()?),
        }
        .with_overrides(parse_overrides(self.criteria.as_deref())?)
        .with_output(self.output.clone())
        .with_stable_order(self.stable_order);

        let progress = utils.progress_sink()?;
        let hits = orchestrator
            .run(&request, &CancelToken::new(), progress.as_ref())?
            .ok_or_else(|| anyhow!("Homology search was cancelled"))?;

        info!("{} -> {}: {} hits", self.source, self.target, hits.height());
        println!(
            "Found {} homologous hits",
            style(hits.height()).green()
        );
        if let Some(output) = &self.output {
            println!("Saved to {}", style(output.display()).cyan());
        }
        Ok(())
    }
}

pub(crate) fn build_orchestrator(config: Arc<ToolkitConfig>) -> HomologyOrchestrator {
    let store = Arc::new(SqliteStore::new(config.clone()));
    let blast = Arc::new(BlastnCommand::from_config(&config));
    let regions = Arc::new(GffIndex::from_config(&config));
    let context = SearchContext::new(store, blast).with_region_index(regions);
    HomologyOrchestrator::new(config, context)
}

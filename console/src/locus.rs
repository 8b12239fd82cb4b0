use std::path::PathBuf;

use anyhow::anyhow;
use clap::Args;
use console::style;
use cottonkit::locus::convert_locus;
use cottonkit::prelude::*;

use crate::homology::build_orchestrator;
use crate::utils::{
    parse_overrides,
    UtilsArgs,
};

#[derive(Args, Debug, Clone)]
pub(crate) struct LocusArgs {
    #[arg(required = true, help = "Source assembly id")]
    source: String,

    #[arg(required = true, help = "Target assembly id")]
    target: String,

    #[arg(required = true, help = "Source region as chrom:start-end")]
    region: Region,

    #[arg(short, long, help = "Output table (.csv or tab separated)")]
    output: Option<PathBuf>,

    #[arg(long, help = "Selection criteria overrides as a JSON object")]
    criteria: Option<String>,
}

impl LocusArgs {
    pub fn run(
        &self,
        utils: &UtilsArgs,
    ) -> anyhow::Result<()> {
        let orchestrator = build_orchestrator(utils.load_config()?);
        let progress = utils.progress_sink()?;
        let stitched = convert_locus(
            &orchestrator,
            &self.source,
            &self.target,
            &self.region,
            parse_overrides(self.criteria.as_deref())?,
            self.output.as_deref(),
            &CancelToken::new(),
            progress.as_ref(),
        )?
        .ok_or_else(|| anyhow!("Locus conversion was cancelled"))?;

        if stitched.height() == 0 {
            println!(
                "{}",
                style(format!(
                    "No homologous genes of {} found in {}",
                    self.region, self.target
                ))
                .yellow()
            );
        }
        else {
            println!(
                "Mapped {} to {} rows in {}",
                style(&self.region).cyan(),
                style(stitched.height()).green(),
                self.target
            );
        }
        Ok(())
    }
}

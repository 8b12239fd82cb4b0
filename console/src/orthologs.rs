use std::path::PathBuf;

use anyhow::anyhow;
use clap::{
    Args,
    ValueEnum,
};
use console::style;
use cottonkit::io::write_table;
use cottonkit::ortholog::lookup_orthologs;
use cottonkit::prelude::*;
use polars::prelude::*;

use crate::utils::{
    GeneInput,
    UtilsArgs,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub(crate) enum Direction {
    CottonToAth,
    AthToCotton,
}

impl From<Direction> for ConversionDirection {
    fn from(value: Direction) -> Self {
        match value {
            Direction::CottonToAth => ConversionDirection::CottonToAth,
            Direction::AthToCotton => ConversionDirection::AthToCotton,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub(crate) struct OrthologArgs {
    #[arg(required = true, help = "Cotton assembly id")]
    assembly: String,

    #[clap(flatten)]
    genes: GeneInput,

    #[arg(short, long, value_enum, default_value_t = Direction::CottonToAth, help = "Lookup direction")]
    direction: Direction,

    #[arg(short, long, help = "Output table (.csv or tab separated), stdout when omitted")]
    output: Option<PathBuf>,
}

impl OrthologArgs {
    pub fn run(
        &self,
        utils: &UtilsArgs,
    ) -> anyhow::Result<()> {
        let config = utils.load_config()?;
        let table = SqliteOrthologTable::new(config.clone());
        let progress = utils.progress_sink()?;
        let mut df = lookup_orthologs(
            &table,
            &config.resolution,
            &self.assembly,
            &self.genes.collect()?,
            self.direction.into(),
            &CancelToken::new(),
            progress.as_ref(),
        )?
        .ok_or_else(|| anyhow!("Ortholog lookup was cancelled"))?;

        match &self.output {
            Some(path) => {
                write_table(&mut df, path)?;
                eprintln!(
                    "Saved {} relations to {}",
                    style(df.height()).green(),
                    style(path.display()).cyan()
                );
            },
            None => {
                CsvWriter::new(std::io::stdout().lock())
                    .include_header(true)
                    .with_separator(b'\t')
                    .finish(&mut df)?;
            },
        }
        Ok(())
    }
}

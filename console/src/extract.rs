use std::path::PathBuf;

use anyhow::anyhow;
use clap::{
    Args,
    ValueEnum,
};
use console::style;
use cottonkit::extract::{
    extract_sequences,
    write_fasta,
    write_fasta_file,
};
use cottonkit::prelude::*;

use crate::utils::{
    GeneInput,
    UtilsArgs,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub(crate) enum SequenceKind {
    Cds,
    Protein,
}

impl From<SequenceKind> for TableKind {
    fn from(value: SequenceKind) -> Self {
        match value {
            SequenceKind::Cds => TableKind::Cds,
            SequenceKind::Protein => TableKind::Protein,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub(crate) struct ExtractArgs {
    #[arg(required = true, help = "Assembly id")]
    assembly: String,

    #[clap(flatten)]
    genes: GeneInput,

    #[arg(short, long, value_enum, default_value_t = SequenceKind::Cds, help = "Sequence type")]
    kind: SequenceKind,

    #[arg(short, long, help = "Output FASTA, stdout when omitted")]
    output: Option<PathBuf>,
}

impl ExtractArgs {
    pub fn run(
        &self,
        utils: &UtilsArgs,
    ) -> anyhow::Result<()> {
        let config = utils.load_config()?;
        let store = SqliteStore::new(config.clone());
        let progress = utils.progress_sink()?;
        let sequences = extract_sequences(
            &store,
            &config.resolution,
            &self.assembly,
            &self.genes.collect()?,
            self.kind.into(),
            &CancelToken::new(),
            progress.as_ref(),
        )?
        .ok_or_else(|| anyhow!("Sequence extraction was cancelled"))?;

        match &self.output {
            Some(path) => {
                write_fasta_file(path, &sequences)?;
                eprintln!(
                    "Saved {} sequences to {}",
                    style(sequences.len()).green(),
                    style(path.display()).cyan()
                );
            },
            None => write_fasta(std::io::stdout().lock(), &sequences)?,
        }
        Ok(())
    }
}

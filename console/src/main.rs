mod extract;
mod homology;
mod locus;
mod orthologs;
mod utils;

use clap::{
    Parser,
    Subcommand,
};
use extract::ExtractArgs;
use homology::HomologyArgs;
use locus::LocusArgs;
use orthologs::OrthologArgs;
use utils::UtilsArgs;
use wild::ArgsOs;

#[derive(Parser, Debug)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    long_about = None,)]
struct Cli {
    #[command(subcommand)]
    command: MainMenu,
}

#[derive(Subcommand, Debug)]
enum MainMenu {
    /// Search genes of one assembly against another with BLAST.
    Homology {
        #[clap(flatten)]
        utils: UtilsArgs,
        #[clap(flatten)]
        args:  HomologyArgs,
    },

    /// Map the genes of a region onto another assembly, with loci.
    Locus {
        #[clap(flatten)]
        utils: UtilsArgs,
        #[clap(flatten)]
        args:  LocusArgs,
    },

    /// Write CDS or protein sequences of genes as FASTA.
    Extract {
        #[clap(flatten)]
        utils: UtilsArgs,
        #[clap(flatten)]
        args:  ExtractArgs,
    },

    /// Look genes up in the precomputed Arabidopsis homology table.
    Orthologs {
        #[clap(flatten)]
        utils: UtilsArgs,
        #[clap(flatten)]
        args:  OrthologArgs,
    },
}

fn main() -> anyhow::Result<()> {
    let args: ArgsOs = wild::args_os();
    let cli = Cli::parse_from(args);

    match cli.command {
        MainMenu::Homology { utils, args } => {
            utils.setup()?;
            args.run(&utils)?;
        },
        MainMenu::Locus { utils, args } => {
            utils.setup()?;
            args.run(&utils)?;
        },
        MainMenu::Extract { utils, args } => {
            utils.setup()?;
            args.run(&utils)?;
        },
        MainMenu::Orthologs { utils, args } => {
            utils.setup()?;
            args.run(&utils)?;
        },
    }
    Ok(())
}

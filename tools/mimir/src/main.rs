use clap::Parser;
use miette::Result;
use mimir::cli::{Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Cli::parse();

    match args.action {
        Commands::Anchors(opts) => opts.anchors()?,
        Commands::Assign(opts) => opts.assign()?,
    }

    Ok(())
}

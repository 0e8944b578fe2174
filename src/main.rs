use anyhow::Result;
use clap::Parser;

mod config;
mod data;
mod error;
mod model;
mod pipeline;
mod tracking;

use config::{Cli, Command};

fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    cli.validate()?;

    match &cli.command {
        Command::Prepare(args) => pipeline::prepare::run(args, &cli.tracking_db),
        Command::Train(args) => pipeline::train::run(args, &cli.tracking_db),
        Command::Score(args) => pipeline::score::run(args, &cli.tracking_db),
        Command::Run(args) => pipeline::driver::run(args, &cli.tracking_db),
        Command::Simulate(args) => pipeline::simulate::run(args, &cli.tracking_db),
    }
}

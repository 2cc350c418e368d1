#![warn(missing_docs)]

//! `trp-admin`: replication peer administration against a local store snapshot.

use anyhow::Result;
use clap::Parser;
use tablerep_peers::cli::Cli;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    cli.run()
}

//! SkyDAG CLI — workflow descriptor generator for patched sky searches.
//!
//! Turns a sky-patch catalog and search parameters into DAGMan-style
//! descriptors ready for cluster submission.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}

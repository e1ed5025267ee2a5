//! Thin CLI entry point: parses arguments, loads configuration, and wires
//! the core engine. The OSM source parser and the database row sink are
//! external collaborators supplied by the host; this binary is the
//! integration point where a concrete pair of them would be plugged in.

use anyhow::{bail, Context, Result};
use clap::Parser;
use env_logger::Env;
use log::info;

use osm_tiles::config::{Cli, Config};

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref(), &cli)
        .with_context(|| match &cli.config {
            Some(path) => format!("loading configuration from {}", path.display()),
            None => "loading default configuration".to_string(),
        })?;

    info!(
        "configured for SRID {} in {} mode, {} worker(s)",
        config.projection_srs,
        if config.append { "append" } else { "create" },
        config.num_procs
    );

    // Wiring a `Source` (OSM file parser) and a `RowSink` (database
    // driver) is left to the integrator: both are external collaborators
    // by design, exposed only through the `osm_tiles::collab` traits.
    bail!("no Source/RowSink implementation registered; nothing to import");
}

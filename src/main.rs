//! CLI entry point for the mirror engine.

use anyhow::Result;
use clap::Parser;
use dse_mirror::{Mirror, MirrorConfig};
use tracing::{debug, info};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");
    info!("Mirror engine starting");

    let mut config = match &args.config {
        Some(path) => MirrorConfig::load_from_file(path)?,
        None => MirrorConfig::default(),
    };
    args.apply_overrides(&mut config);

    let mirror = Mirror::new(config, args.state_file.clone(), args.output_dir.clone()).await?;
    mirror.run(&args.subjects).await?;

    Ok(())
}

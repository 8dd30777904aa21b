//! pcm-bridge CLI
//!
//! Bridges two OSS devices until one of them fails.

use std::process;

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::{error, info};

use pcm_bridge::cli::Cli;
use pcm_bridge::device::OssOpener;
use pcm_bridge::Bridge;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    let config = cli
        .resolve_config()
        .context("failed to load bridge configuration")?;

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    info!("pcm-bridge v{}", env!("CARGO_PKG_VERSION"));

    let mut running = Bridge::new(OssOpener, config)
        .start()
        .context("failed to start bridge")?;

    // Any stopped direction ends the whole bridge
    match running.wait() {
        Some(failure) => error!("{}", failure),
        None => error!("bridge stopped without a report"),
    }
    process::exit(1);
}

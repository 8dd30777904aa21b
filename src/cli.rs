//! CLI Module
//!
//! Command-line surface of the `pcm-bridge` binary.

use std::path::PathBuf;

use clap::Parser;

use crate::config::BridgeConfig;
use crate::error::Result;
use crate::format::SampleEncoding;

/// Full-duplex PCM bridge: audio captured on each device is played on the other
#[derive(Parser, Debug)]
#[command(name = "pcm-bridge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// First device (default: /dev/dsp)
    pub endpoint_a: Option<PathBuf>,

    /// Second device (default: /dev/dsp4)
    pub endpoint_b: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Sample encoding, e.g. s16le, s32le, u8
    #[arg(long)]
    pub format: Option<SampleEncoding>,

    /// Channel count
    #[arg(long)]
    pub channels: Option<u32>,

    /// Sample rate in Hz
    #[arg(long)]
    pub rate: Option<u32>,

    /// Bytes moved per relay step
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    pub print_config: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Defaults, overlaid by the config file, overlaid by flags
    pub fn resolve_config(&self) -> Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => BridgeConfig::from_file(path)?,
            None => BridgeConfig::default(),
        };

        if let Some(endpoint) = &self.endpoint_a {
            config.endpoints[0] = endpoint.clone();
        }
        if let Some(endpoint) = &self.endpoint_b {
            config.endpoints[1] = endpoint.clone();
        }
        if let Some(encoding) = self.format {
            config.format.encoding = encoding;
        }
        if let Some(channels) = self.channels {
            config.format.channels = channels;
        }
        if let Some(rate) = self.rate {
            config.format.sample_rate = rate;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }

        config.validate()?;
        Ok(config)
    }
}

//! pcm-bridge - Full-Duplex PCM Audio Bridge
//!
//! Connects two PCM device endpoints so that audio captured on one is played
//! out on the other, and vice versa.
//!
//! # Architecture
//!
//! - Device Configurator: applies encoding, channel count and rate to a
//!   freshly opened handle, in that order
//! - Relay Loop: reads a small fixed chunk from a source and writes exactly
//!   those bytes to a sink, until a device fails
//! - Bridge Orchestrator: runs one relay per direction on its own thread and
//!   reports whichever stops first
//!
//! No conversion, resampling or mixing happens anywhere; bytes pass through
//! untouched.

pub mod bridge;
pub mod cli;
pub mod config;
pub mod configure;
pub mod device;
pub mod error;
pub mod format;
pub mod relay;

pub use bridge::{Bridge, Direction, DirectionFailure, RunningBridge};
pub use config::BridgeConfig;
pub use configure::{configure, Negotiated};
pub use error::{BridgeError, ConfigError, Result, Stage};
pub use format::{AudioFormat, ParameterKind, SampleEncoding};
pub use relay::{Relay, RelayStats, RelayStep, DEFAULT_CHUNK_SIZE};

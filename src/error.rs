//! Error handling for pcm-bridge
//!
//! Every error here is fatal for the direction that raised it. Each variant
//! carries the endpoint and stage so the operator can tell which device
//! failed and where.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::bridge::Direction;
use crate::device::AccessMode;
use crate::format::ParameterKind;

/// Result type alias for pcm-bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Stage of a direction's lifecycle at which an error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Setup,
    Open,
    Configure,
    Read,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Setup => write!(f, "setup"),
            Stage::Open => write!(f, "open"),
            Stage::Configure => write!(f, "configure"),
            Stage::Read => write!(f, "read"),
            Stage::Write => write!(f, "write"),
        }
    }
}

/// Which half of a relay step failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOp {
    Read,
    Write,
}

impl fmt::Display for TransferOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferOp::Read => write!(f, "read from"),
            TransferOp::Write => write!(f, "write to"),
        }
    }
}

/// A configuration request rejected by the device
#[derive(Error, Debug)]
#[error("failed to set {stage} to {requested}: {source}")]
pub struct ConfigError {
    pub stage: ParameterKind,
    pub requested: i32,
    #[source]
    pub source: io::Error,
}

/// Main error type for bridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("failed to open {mode} audio device {}: {source}", endpoint.display())]
    Open {
        endpoint: PathBuf,
        mode: AccessMode,
        #[source]
        source: io::Error,
    },

    #[error("failed to set {mode} device parameters on {}: {source}", endpoint.display())]
    Config {
        endpoint: PathBuf,
        mode: AccessMode,
        #[source]
        source: ConfigError,
    },

    #[error("failed to {op} audio device {}: {source}", endpoint.display())]
    Transfer {
        endpoint: PathBuf,
        op: TransferOp,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("failed to read configuration file {}: {source}", path.display())]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse configuration file {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to start relay thread for {direction}: {source}")]
    Spawn {
        direction: Direction,
        #[source]
        source: io::Error,
    },

    #[error("relay thread for {direction} panicked: {message}")]
    Panicked { direction: Direction, message: String },
}

impl BridgeError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            BridgeError::Open { .. } => "OPEN_FAILED",
            BridgeError::Config { .. } => "CONFIG_REJECTED",
            BridgeError::Transfer { .. } => "TRANSFER_FAILED",
            BridgeError::InvalidConfig { .. } => "INVALID_CONFIG",
            BridgeError::ConfigFile { .. } => "CONFIG_FILE_UNREADABLE",
            BridgeError::ConfigParse { .. } => "CONFIG_FILE_INVALID",
            BridgeError::Spawn { .. } => "SPAWN_FAILED",
            BridgeError::Panicked { .. } => "PANICKED",
        }
    }

    /// Lifecycle stage that failed
    pub fn stage(&self) -> Stage {
        match self {
            BridgeError::Open { .. } => Stage::Open,
            BridgeError::Config { .. } => Stage::Configure,
            BridgeError::Transfer {
                op: TransferOp::Read,
                ..
            } => Stage::Read,
            BridgeError::Transfer {
                op: TransferOp::Write,
                ..
            } => Stage::Write,
            _ => Stage::Setup,
        }
    }

    /// Device path involved, if the error concerns a single endpoint
    pub fn endpoint(&self) -> Option<&Path> {
        match self {
            BridgeError::Open { endpoint, .. }
            | BridgeError::Config { endpoint, .. }
            | BridgeError::Transfer { endpoint, .. } => Some(endpoint),
            _ => None,
        }
    }

    /// Underlying I/O error kind for device failures
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            BridgeError::Open { source, .. }
            | BridgeError::Transfer { source, .. }
            | BridgeError::ConfigFile { source, .. }
            | BridgeError::Spawn { source, .. } => Some(source.kind()),
            BridgeError::Config { source, .. } => Some(source.source.kind()),
            _ => None,
        }
    }
}

//! Device Boundary
//!
//! The narrow interface the bridge drives audio endpoints through:
//! - open a path read-only or write-only
//! - apply one configuration request
//! - read and write raw bytes (`std::io::Read` / `std::io::Write`)
//!
//! Closing is dropping the device.

pub mod loopback;
pub mod oss;

use std::fmt;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::format::ParameterKind;

pub use loopback::{LoopbackEndpoint, LoopbackHub};
pub use oss::{OssDevice, OssOpener};

/// How an endpoint is opened. Never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessMode::ReadOnly => write!(f, "input"),
            AccessMode::WriteOnly => write!(f, "output"),
        }
    }
}

/// An open PCM endpoint
pub trait PcmDevice: Read + Write + Send {
    /// Apply one configuration request and return the value the driver
    /// actually applied
    fn apply_parameter(&mut self, kind: ParameterKind, value: i32) -> io::Result<i32>;
}

/// Opens endpoints by path
pub trait DeviceOpener: Send + Sync + 'static {
    type Device: PcmDevice + 'static;

    fn open(&self, path: &Path, mode: AccessMode) -> io::Result<Self::Device>;
}

/// An open device together with the path and mode it was opened with
#[derive(Debug)]
pub struct Endpoint<D> {
    path: PathBuf,
    mode: AccessMode,
    device: D,
}

impl<D> Endpoint<D> {
    pub fn new(path: impl Into<PathBuf>, mode: AccessMode, device: D) -> Self {
        Endpoint {
            path: path.into(),
            mode,
            device,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }
}

//! In-memory loopback endpoints for testing without hardware.
//!
//! A loopback endpoint has a capture side, pre-loaded with the bytes its
//! "microphone" will deliver, and a playback side that records every byte
//! written to it. Opening the endpoint read-only yields a handle on the
//! capture side; write-only yields a handle on the playback side.
//!
//! An exhausted capture side reads as end-of-stream. Faults can be injected
//! to exercise the fatal paths:
//!
//! ```
//! use std::path::Path;
//!
//! use pcm_bridge::device::{AccessMode, DeviceOpener, LoopbackEndpoint, LoopbackHub};
//!
//! let mic = LoopbackEndpoint::new("/dev/dsp")
//!     .with_capture(vec![1, 2, 3])
//!     .with_max_read(2);
//!
//! let mut hub = LoopbackHub::new();
//! hub.add(mic.clone());
//! let handle = hub.open(Path::new("/dev/dsp"), AccessMode::ReadOnly).unwrap();
//! # drop(handle);
//! assert_eq!(mic.open_count(AccessMode::ReadOnly), 1);
//! ```

use std::collections::{HashMap, VecDeque};
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use super::{AccessMode, DeviceOpener, PcmDevice};
use crate::format::ParameterKind;

#[derive(Debug, Default)]
struct EndpointState {
    capture: VecDeque<u8>,
    playback: Vec<u8>,
    applied: Vec<(AccessMode, ParameterKind, i32)>,
    captured_bytes: usize,
    played_bytes: usize,
    read_opens: usize,
    write_opens: usize,
    live_handles: usize,
    faults: Faults,
}

#[derive(Debug, Default, Clone)]
struct Faults {
    reject: Option<ParameterKind>,
    negotiate: Option<(ParameterKind, i32)>,
    fail_open: Option<AccessMode>,
    fail_read_after: Option<usize>,
    fail_write_after: Option<usize>,
    max_read: Option<usize>,
    read_latency: Option<Duration>,
}

/// A simulated audio device shared by every handle opened on it
#[derive(Debug, Clone)]
pub struct LoopbackEndpoint {
    path: PathBuf,
    state: Arc<Mutex<EndpointState>>,
}

impl LoopbackEndpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LoopbackEndpoint {
            path: path.into(),
            state: Arc::new(Mutex::new(EndpointState::default())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes the capture side will deliver, in order
    pub fn with_capture(self, bytes: impl IntoIterator<Item = u8>) -> Self {
        self.lock().capture.extend(bytes);
        self
    }

    /// Reject the given configuration request
    pub fn rejecting(self, kind: ParameterKind) -> Self {
        self.lock().faults.reject = Some(kind);
        self
    }

    /// Report `applied` back for the given request instead of the requested value
    pub fn negotiating(self, kind: ParameterKind, applied: i32) -> Self {
        self.lock().faults.negotiate = Some((kind, applied));
        self
    }

    /// Refuse to open in the given mode
    pub fn failing_open(self, mode: AccessMode) -> Self {
        self.lock().faults.fail_open = Some(mode);
        self
    }

    /// Fail every read once `bytes` have been captured
    pub fn failing_read_after(self, bytes: usize) -> Self {
        self.lock().faults.fail_read_after = Some(bytes);
        self
    }

    /// Fail every write once `bytes` have been played
    pub fn failing_write_after(self, bytes: usize) -> Self {
        self.lock().faults.fail_write_after = Some(bytes);
        self
    }

    /// Deliver at most `bytes` per read, simulating partial periods
    pub fn with_max_read(self, bytes: usize) -> Self {
        self.lock().faults.max_read = Some(bytes.max(1));
        self
    }

    /// Block for `latency` before every read
    pub fn with_read_latency(self, latency: Duration) -> Self {
        self.lock().faults.read_latency = Some(latency);
        self
    }

    /// Everything written to the playback side so far
    pub fn playback(&self) -> Vec<u8> {
        self.lock().playback.clone()
    }

    /// Capture bytes not yet read
    pub fn pending_capture(&self) -> usize {
        self.lock().capture.len()
    }

    /// Configuration requests applied through handles opened in `mode`, in order
    pub fn applied_parameters(&self, mode: AccessMode) -> Vec<(ParameterKind, i32)> {
        self.lock()
            .applied
            .iter()
            .filter(|(applied_mode, _, _)| *applied_mode == mode)
            .map(|(_, kind, value)| (*kind, *value))
            .collect()
    }

    pub fn open_count(&self, mode: AccessMode) -> usize {
        let state = self.lock();
        match mode {
            AccessMode::ReadOnly => state.read_opens,
            AccessMode::WriteOnly => state.write_opens,
        }
    }

    /// Handles opened and not yet dropped
    pub fn live_handles(&self) -> usize {
        self.lock().live_handles
    }

    pub fn open(&self, mode: AccessMode) -> io::Result<LoopbackDevice> {
        let mut state = self.lock();
        if state.faults.fail_open == Some(mode) {
            return Err(io::Error::new(
                ErrorKind::PermissionDenied,
                "loopback endpoint refused to open",
            ));
        }
        match mode {
            AccessMode::ReadOnly => state.read_opens += 1,
            AccessMode::WriteOnly => state.write_opens += 1,
        }
        state.live_handles += 1;
        drop(state);

        Ok(LoopbackDevice {
            mode,
            state: Arc::clone(&self.state),
        })
    }

    fn lock(&self) -> MutexGuard<'_, EndpointState> {
        lock(&self.state)
    }
}

fn lock(state: &Mutex<EndpointState>) -> MutexGuard<'_, EndpointState> {
    // A panicking test thread must not hide the recorded bytes from the others
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A handle opened on a [`LoopbackEndpoint`]
#[derive(Debug)]
pub struct LoopbackDevice {
    mode: AccessMode,
    state: Arc<Mutex<EndpointState>>,
}

impl LoopbackDevice {
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    fn wrong_mode(&self) -> io::Error {
        io::Error::new(
            ErrorKind::Unsupported,
            format!("loopback handle is opened as {}", self.mode),
        )
    }
}

impl PcmDevice for LoopbackDevice {
    fn apply_parameter(&mut self, kind: ParameterKind, value: i32) -> io::Result<i32> {
        let mut state = lock(&self.state);
        if state.faults.reject == Some(kind) {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("loopback endpoint rejects {}", kind),
            ));
        }
        let applied = match state.faults.negotiate {
            Some((negotiated, applied)) if negotiated == kind => applied,
            _ => value,
        };
        state.applied.push((self.mode, kind, applied));
        Ok(applied)
    }
}

impl Read for LoopbackDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.mode != AccessMode::ReadOnly {
            return Err(self.wrong_mode());
        }

        let latency = lock(&self.state).faults.read_latency;
        if let Some(latency) = latency {
            thread::sleep(latency);
        }

        let mut state = lock(&self.state);
        let mut limit = buf.len().min(state.capture.len());
        if let Some(max_read) = state.faults.max_read {
            limit = limit.min(max_read);
        }
        if let Some(fail_after) = state.faults.fail_read_after {
            let remaining = fail_after.saturating_sub(state.captured_bytes);
            if remaining == 0 {
                return Err(io::Error::new(ErrorKind::Other, "injected capture failure"));
            }
            limit = limit.min(remaining);
        }

        for (slot, byte) in buf.iter_mut().zip(state.capture.drain(..limit)) {
            *slot = byte;
        }
        state.captured_bytes += limit;
        Ok(limit)
    }
}

impl Write for LoopbackDevice {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.mode != AccessMode::WriteOnly {
            return Err(self.wrong_mode());
        }

        let mut state = lock(&self.state);
        let mut accepted = buf.len();
        if let Some(fail_after) = state.faults.fail_write_after {
            let remaining = fail_after.saturating_sub(state.played_bytes);
            if remaining == 0 {
                return Err(io::Error::new(ErrorKind::Other, "injected playback failure"));
            }
            accepted = accepted.min(remaining);
        }

        state.playback.extend_from_slice(&buf[..accepted]);
        state.played_bytes += accepted;
        Ok(accepted)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for LoopbackDevice {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        state.live_handles = state.live_handles.saturating_sub(1);
    }
}

/// A set of loopback endpoints addressed by path
#[derive(Debug, Default, Clone)]
pub struct LoopbackHub {
    endpoints: HashMap<PathBuf, LoopbackEndpoint>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, endpoint: LoopbackEndpoint) -> &mut Self {
        self.endpoints.insert(endpoint.path.clone(), endpoint);
        self
    }

    pub fn with(mut self, endpoint: LoopbackEndpoint) -> Self {
        self.add(endpoint);
        self
    }

    pub fn endpoint(&self, path: impl AsRef<Path>) -> Option<&LoopbackEndpoint> {
        self.endpoints.get(path.as_ref())
    }
}

impl DeviceOpener for LoopbackHub {
    type Device = LoopbackDevice;

    fn open(&self, path: &Path, mode: AccessMode) -> io::Result<LoopbackDevice> {
        match self.endpoints.get(path) {
            Some(endpoint) => endpoint.open(mode),
            None => Err(io::Error::new(
                ErrorKind::NotFound,
                format!("no loopback endpoint at {}", path.display()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_capture_then_end_of_stream() {
        let endpoint = LoopbackEndpoint::new("/dev/dsp").with_capture(vec![1, 2, 3]);
        let mut device = endpoint.open(AccessMode::ReadOnly).unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(device.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert_eq!(device.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_max_read_caps_each_read() {
        let endpoint = LoopbackEndpoint::new("/dev/dsp")
            .with_capture(0..10u8)
            .with_max_read(4);
        let mut device = endpoint.open(AccessMode::ReadOnly).unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(device.read(&mut buf).unwrap(), 4);
        assert_eq!(device.read(&mut buf).unwrap(), 4);
        assert_eq!(device.read(&mut buf).unwrap(), 2);
        assert_eq!(endpoint.pending_capture(), 0);
    }

    #[test]
    fn test_playback_records_writes() {
        let endpoint = LoopbackEndpoint::new("/dev/dsp4");
        let mut device = endpoint.open(AccessMode::WriteOnly).unwrap();

        device.write_all(&[9, 8]).unwrap();
        device.write_all(&[7]).unwrap();
        assert_eq!(endpoint.playback(), vec![9, 8, 7]);
    }

    #[test]
    fn test_handles_are_single_purpose() {
        let endpoint = LoopbackEndpoint::new("/dev/dsp").with_capture(vec![1]);
        let mut reader = endpoint.open(AccessMode::ReadOnly).unwrap();
        let mut writer = endpoint.open(AccessMode::WriteOnly).unwrap();

        assert_eq!(
            reader.write(&[1]).unwrap_err().kind(),
            ErrorKind::Unsupported
        );
        assert_eq!(
            writer.read(&mut [0u8; 1]).unwrap_err().kind(),
            ErrorKind::Unsupported
        );
    }

    #[test]
    fn test_read_failure_after_threshold() {
        let endpoint = LoopbackEndpoint::new("/dev/dsp")
            .with_capture(0..100u8)
            .failing_read_after(5);
        let mut device = endpoint.open(AccessMode::ReadOnly).unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(device.read(&mut buf).unwrap(), 5);
        assert!(device.read(&mut buf).is_err());
    }

    #[test]
    fn test_write_failure_after_threshold() {
        let endpoint = LoopbackEndpoint::new("/dev/dsp4").failing_write_after(3);
        let mut device = endpoint.open(AccessMode::WriteOnly).unwrap();

        assert_eq!(device.write(&[1, 2, 3, 4]).unwrap(), 3);
        assert!(device.write(&[4]).is_err());
        assert_eq!(endpoint.playback(), vec![1, 2, 3]);
    }

    #[test]
    fn test_parameters_recorded_per_mode() {
        let endpoint = LoopbackEndpoint::new("/dev/dsp")
            .negotiating(ParameterKind::SampleRate, 44100)
            .rejecting(ParameterKind::ChannelCount);
        let mut device = endpoint.open(AccessMode::WriteOnly).unwrap();

        assert_eq!(
            device
                .apply_parameter(ParameterKind::SampleEncoding, 0x10)
                .unwrap(),
            0x10
        );
        assert!(device
            .apply_parameter(ParameterKind::ChannelCount, 2)
            .is_err());
        assert_eq!(
            device
                .apply_parameter(ParameterKind::SampleRate, 48000)
                .unwrap(),
            44100
        );

        assert_eq!(
            endpoint.applied_parameters(AccessMode::WriteOnly),
            vec![
                (ParameterKind::SampleEncoding, 0x10),
                (ParameterKind::SampleRate, 44100),
            ]
        );
        assert!(endpoint.applied_parameters(AccessMode::ReadOnly).is_empty());
    }

    #[test]
    fn test_hub_open_and_close() {
        let hub = LoopbackHub::new().with(LoopbackEndpoint::new("/dev/dsp"));
        let endpoint = hub.endpoint("/dev/dsp").unwrap().clone();

        let device = hub.open(Path::new("/dev/dsp"), AccessMode::ReadOnly).unwrap();
        assert_eq!(device.mode(), AccessMode::ReadOnly);
        assert_eq!(endpoint.live_handles(), 1);
        drop(device);
        assert_eq!(endpoint.live_handles(), 0);
        assert_eq!(endpoint.open_count(AccessMode::ReadOnly), 1);

        let err = hub
            .open(Path::new("/dev/dsp9"), AccessMode::ReadOnly)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_refused_open() {
        let endpoint = LoopbackEndpoint::new("/dev/dsp").failing_open(AccessMode::WriteOnly);
        assert!(endpoint.open(AccessMode::ReadOnly).is_ok());
        assert_eq!(
            endpoint.open(AccessMode::WriteOnly).unwrap_err().kind(),
            ErrorKind::PermissionDenied
        );
    }
}

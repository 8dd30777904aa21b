//! Bridge Orchestrator
//!
//! Wires both directions of a two-endpoint bridge and runs them on their
//! own threads. Each direction goes through
//! `Unopened -> Opened -> Configured -> Relaying` and ends only when a
//! stage fails. The directions share no handles or buffers; the only thing
//! they send anywhere is their final report.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::configure::configure;
use crate::device::{AccessMode, DeviceOpener, Endpoint};
use crate::error::{BridgeError, Result, Stage};
use crate::format::AudioFormat;
use crate::relay::{Relay, RelayStats};

/// One of the two directions of a bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Capture on endpoint A, play on endpoint B
    AToB,
    /// Capture on endpoint B, play on endpoint A
    BToA,
}

impl Direction {
    pub const BOTH: [Direction; 2] = [Direction::AToB, Direction::BToA];

    /// `(source, sink)` paths for this direction
    pub fn route<'a>(&self, config: &'a BridgeConfig) -> (&'a Path, &'a Path) {
        match self {
            Direction::AToB => (config.endpoint_a(), config.endpoint_b()),
            Direction::BToA => (config.endpoint_b(), config.endpoint_a()),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::AToB => write!(f, "a->b"),
            Direction::BToA => write!(f, "b->a"),
        }
    }
}

/// Why and when a direction stopped
#[derive(Debug)]
pub struct DirectionFailure {
    pub direction: Direction,
    pub error: BridgeError,
    pub stats: RelayStats,
}

impl DirectionFailure {
    pub fn stage(&self) -> Stage {
        self.error.stage()
    }
}

impl fmt::Display for DirectionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "direction {} failed at {}", self.direction, self.stage())?;
        if let Some(endpoint) = self.error.endpoint() {
            write!(f, " on {}", endpoint.display())?;
        }
        write!(
            f,
            " [{}] after {} bytes: {}",
            self.error.error_code(),
            self.stats.bytes,
            self.error
        )
    }
}

/// Open `path` in `mode` and apply `format` to it
pub fn open_endpoint<O: DeviceOpener>(
    opener: &O,
    path: &Path,
    mode: AccessMode,
    format: &AudioFormat,
) -> Result<Endpoint<O::Device>> {
    let mut device = opener.open(path, mode).map_err(|source| BridgeError::Open {
        endpoint: path.to_path_buf(),
        mode,
        source,
    })?;
    debug!("opened {} device {}", mode, path.display());

    let negotiated = configure(&mut device, format).map_err(|source| BridgeError::Config {
        endpoint: path.to_path_buf(),
        mode,
        source,
    })?;
    for (kind, requested, applied) in negotiated.mismatches(format) {
        warn!(
            "{} applied {} = {} instead of {}",
            path.display(),
            kind,
            kind.describe(applied),
            kind.describe(requested)
        );
    }

    Ok(Endpoint::new(path, mode, device))
}

/// Open and configure both ends of one direction: source first, then sink
///
/// An invalid `config` is rejected before any device is opened.
pub fn open_direction<O: DeviceOpener>(
    opener: &O,
    direction: Direction,
    config: &BridgeConfig,
) -> Result<Relay<O::Device, O::Device>> {
    config.validate()?;
    let (source_path, sink_path) = direction.route(config);
    let source = open_endpoint(opener, source_path, AccessMode::ReadOnly, &config.format)?;
    let sink = open_endpoint(opener, sink_path, AccessMode::WriteOnly, &config.format)?;
    Ok(Relay::new(source, sink, config.chunk_size))
}

/// Run one direction from `Unopened` until it fails
fn run_direction<O: DeviceOpener>(
    opener: &O,
    direction: Direction,
    config: &BridgeConfig,
) -> DirectionFailure {
    let mut relay = match open_direction(opener, direction, config) {
        Ok(relay) => relay,
        Err(error) => {
            return DirectionFailure {
                direction,
                error,
                stats: RelayStats::default(),
            }
        }
    };

    info!(
        "{}: relaying {} -> {} ({}, {} byte chunks)",
        direction,
        relay.source().path().display(),
        relay.sink().path().display(),
        config.format,
        relay.chunk_size()
    );
    let error = relay.run();
    DirectionFailure {
        direction,
        error,
        stats: relay.stats(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A full-duplex bridge between two endpoints
pub struct Bridge<O> {
    opener: Arc<O>,
    config: BridgeConfig,
}

impl<O: DeviceOpener> Bridge<O> {
    pub fn new(opener: O, config: BridgeConfig) -> Self {
        Self::with_opener(Arc::new(opener), config)
    }

    pub fn with_opener(opener: Arc<O>, config: BridgeConfig) -> Self {
        Bridge { opener, config }
    }

    /// Validate the configuration and start both directions
    ///
    /// Neither direction touches a device until both threads exist, so a
    /// `Spawn` error leaves nothing open or running.
    pub fn start(self) -> Result<RunningBridge> {
        self.config.validate()?;
        info!(
            "bridging {} <-> {} at {} (chunk latency {:.2} ms)",
            self.config.endpoint_a().display(),
            self.config.endpoint_b().display(),
            self.config.format,
            self.config.chunk_size as f64 * 1000.0 / self.config.format.bytes_per_second() as f64
        );

        let config = Arc::new(self.config);
        let (outcomes_tx, outcomes) = mpsc::channel();
        let mut handles = Vec::with_capacity(2);
        let mut gates = Vec::with_capacity(2);

        for direction in Direction::BOTH {
            let (gate, released) = mpsc::channel();
            let handle = spawn_direction(
                direction,
                Arc::clone(&self.opener),
                Arc::clone(&config),
                outcomes_tx.clone(),
                released,
            )
            .map_err(|source| BridgeError::Spawn { direction, source })?;
            gates.push(gate);
            handles.push(handle);
        }
        for gate in gates {
            let _ = gate.send(());
        }

        Ok(RunningBridge {
            outcomes,
            handles,
            reported: 0,
        })
    }
}

fn spawn_direction<O: DeviceOpener>(
    direction: Direction,
    opener: Arc<O>,
    config: Arc<BridgeConfig>,
    outcomes: Sender<DirectionFailure>,
    released: Receiver<()>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("relay {}", direction))
        .spawn(move || {
            // Gate dropped unsent: start() failed, leave without a report
            if released.recv().is_err() {
                debug!("{}: start abandoned before relaying", direction);
                return;
            }
            let failure = panic::catch_unwind(AssertUnwindSafe(|| {
                run_direction(&*opener, direction, &config)
            }))
            .unwrap_or_else(|payload| DirectionFailure {
                direction,
                error: BridgeError::Panicked {
                    direction,
                    message: panic_message(payload.as_ref()),
                },
                stats: RelayStats::default(),
            });
            // The receiver is gone only when nobody is waiting on the bridge
            let _ = outcomes.send(failure);
        })
}

/// Both directions of a started bridge
pub struct RunningBridge {
    outcomes: Receiver<DirectionFailure>,
    handles: Vec<JoinHandle<()>>,
    reported: usize,
}

impl RunningBridge {
    /// Block until the next direction stops and return its report.
    ///
    /// The first call returns whichever direction failed first. `None` once
    /// both directions have reported.
    pub fn wait(&mut self) -> Option<DirectionFailure> {
        if self.reported == self.handles.len() {
            return None;
        }
        let failure = self.outcomes.recv().ok()?;
        self.reported += 1;
        Some(failure)
    }

    /// Wait for both directions to stop
    pub fn join(mut self) -> Vec<DirectionFailure> {
        let mut failures = Vec::with_capacity(2);
        while let Some(failure) = self.wait() {
            failures.push(failure);
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{LoopbackEndpoint, LoopbackHub};
    use crate::format::ParameterKind;
    use pretty_assertions::assert_eq;

    fn hub() -> LoopbackHub {
        LoopbackHub::new()
            .with(LoopbackEndpoint::new("/dev/dsp").with_capture(vec![1; 10]))
            .with(LoopbackEndpoint::new("/dev/dsp4").with_capture(vec![2; 10]))
    }

    #[test]
    fn test_direction_routes() {
        let config = BridgeConfig::default();
        assert_eq!(
            Direction::AToB.route(&config),
            (Path::new("/dev/dsp"), Path::new("/dev/dsp4"))
        );
        assert_eq!(
            Direction::BToA.route(&config),
            (Path::new("/dev/dsp4"), Path::new("/dev/dsp"))
        );
    }

    #[test]
    fn test_open_direction_configures_both_ends() {
        let hub = hub();
        let relay = open_direction(&hub, Direction::AToB, &BridgeConfig::default()).unwrap();

        assert_eq!(relay.source().mode(), AccessMode::ReadOnly);
        assert_eq!(relay.sink().mode(), AccessMode::WriteOnly);

        let expected = vec![
            (ParameterKind::SampleEncoding, 0x10),
            (ParameterKind::ChannelCount, 2),
            (ParameterKind::SampleRate, 48000),
        ];
        let a = hub.endpoint("/dev/dsp").unwrap();
        let b = hub.endpoint("/dev/dsp4").unwrap();
        assert_eq!(a.applied_parameters(AccessMode::ReadOnly), expected);
        assert_eq!(b.applied_parameters(AccessMode::WriteOnly), expected);
    }

    #[test]
    fn test_sink_not_opened_when_source_rejects_format() {
        let hub = LoopbackHub::new()
            .with(LoopbackEndpoint::new("/dev/dsp").rejecting(ParameterKind::SampleRate))
            .with(LoopbackEndpoint::new("/dev/dsp4"));

        let err = open_direction(&hub, Direction::AToB, &BridgeConfig::default())
            .err()
            .unwrap();

        assert_eq!(err.stage(), Stage::Configure);
        assert_eq!(err.endpoint(), Some(Path::new("/dev/dsp")));
        let sink = hub.endpoint("/dev/dsp4").unwrap();
        assert_eq!(sink.open_count(AccessMode::WriteOnly), 0);
    }

    #[test]
    fn test_open_direction_rejects_invalid_config() {
        let hub = hub();
        let config = BridgeConfig::default().with_chunk_size(0);

        let err = open_direction(&hub, Direction::AToB, &config).err().unwrap();

        assert_eq!(err.error_code(), "INVALID_CONFIG");
        for path in ["/dev/dsp", "/dev/dsp4"] {
            let endpoint = hub.endpoint(path).unwrap();
            assert_eq!(endpoint.open_count(AccessMode::ReadOnly), 0);
            assert_eq!(endpoint.open_count(AccessMode::WriteOnly), 0);
        }
    }

    #[test]
    fn test_unreleased_direction_opens_nothing() {
        let hub = Arc::new(hub());
        let (outcomes_tx, outcomes) = mpsc::channel();
        let (gate, released) = mpsc::channel::<()>();

        let handle = spawn_direction(
            Direction::AToB,
            Arc::clone(&hub),
            Arc::new(BridgeConfig::default()),
            outcomes_tx,
            released,
        )
        .unwrap();
        drop(gate);
        handle.join().unwrap();

        assert!(outcomes.recv().is_err());
        let a = hub.endpoint("/dev/dsp").unwrap();
        assert_eq!(a.open_count(AccessMode::ReadOnly), 0);
        assert_eq!(a.live_handles(), 0);
    }

    #[test]
    fn test_invalid_config_not_started() {
        let bridge = Bridge::new(hub(), BridgeConfig::default().with_chunk_size(0));
        let err = bridge.start().err().unwrap();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_wait_reports_each_direction_once() {
        let mut running = Bridge::new(hub(), BridgeConfig::default()).start().unwrap();

        let first = running.wait().unwrap();
        let second = running.wait().unwrap();
        assert!(running.wait().is_none());

        assert_ne!(first.direction, second.direction);
        assert_eq!(first.stats.bytes, 10);
        assert_eq!(second.stats.bytes, 10);
    }

    #[test]
    fn test_failure_display_names_stage_and_endpoint() {
        let failure = DirectionFailure {
            direction: Direction::BToA,
            error: BridgeError::Transfer {
                endpoint: "/dev/dsp4".into(),
                op: crate::error::TransferOp::Read,
                source: std::io::Error::new(std::io::ErrorKind::Other, "overrun"),
            },
            stats: RelayStats {
                chunks: 3,
                bytes: 768,
            },
        };
        let message = failure.to_string();
        assert!(
            message.starts_with("direction b->a failed at read on /dev/dsp4 [TRANSFER_FAILED]"),
            "{}",
            message
        );
        assert!(message.contains("after 768 bytes"), "{}", message);
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}

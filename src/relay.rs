//! Relay Loop
//!
//! Moves raw bytes from one configured endpoint to another, one chunk at a
//! time, with no transformation. The loop paces itself on the blocking
//! reads and writes of the devices; there is no queue between them.
//!
//! Each step reports [`RelayStep::Continue`] or [`RelayStep::Fatal`]; what a
//! fatal step means for the process is up to the caller.

use std::io::{self, ErrorKind, Read, Write};

use log::{debug, trace};

use crate::device::Endpoint;
use crate::error::{BridgeError, TransferOp};

/// Bytes moved per read/write cycle
pub const DEFAULT_CHUNK_SIZE: usize = 256;

/// Outcome of one read-then-write cycle
#[derive(Debug)]
pub enum RelayStep {
    /// A chunk of `bytes` bytes was read and written in full
    Continue { bytes: usize },
    /// The direction cannot go on
    Fatal(BridgeError),
}

/// Running totals for one direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub chunks: u64,
    pub bytes: u64,
}

/// One direction of a bridge: a source endpoint read in chunks and a sink
/// endpoint written with exactly what was read
pub struct Relay<S, K> {
    source: Endpoint<S>,
    sink: Endpoint<K>,
    chunk: Vec<u8>,
    stats: RelayStats,
}

impl<S: Read, K: Write> Relay<S, K> {
    /// # Panics
    /// Panics if `chunk_size` is zero.
    pub fn new(source: Endpoint<S>, sink: Endpoint<K>, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "relay chunk size must be non-zero");
        Relay {
            source,
            sink,
            chunk: vec![0; chunk_size],
            stats: RelayStats::default(),
        }
    }

    pub fn source(&self) -> &Endpoint<S> {
        &self.source
    }

    pub fn sink(&self) -> &Endpoint<K> {
        &self.sink
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk.len()
    }

    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    /// Read up to one chunk from the source and write all of it to the sink
    pub fn step(&mut self) -> RelayStep {
        let read = match read_chunk(self.source.device_mut(), &mut self.chunk) {
            Ok(0) => {
                return RelayStep::Fatal(BridgeError::Transfer {
                    endpoint: self.source.path().to_path_buf(),
                    op: TransferOp::Read,
                    source: io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "device signalled end of stream",
                    ),
                })
            }
            Ok(read) => read,
            Err(source) => {
                return RelayStep::Fatal(BridgeError::Transfer {
                    endpoint: self.source.path().to_path_buf(),
                    op: TransferOp::Read,
                    source,
                })
            }
        };

        if let Err(source) = self.sink.device_mut().write_all(&self.chunk[..read]) {
            return RelayStep::Fatal(BridgeError::Transfer {
                endpoint: self.sink.path().to_path_buf(),
                op: TransferOp::Write,
                source,
            });
        }

        self.stats.chunks += 1;
        self.stats.bytes += read as u64;
        trace!(
            "{} -> {}: {} bytes",
            self.source.path().display(),
            self.sink.path().display(),
            read
        );
        RelayStep::Continue { bytes: read }
    }

    /// Relay until a step is fatal, and return why
    pub fn run(&mut self) -> BridgeError {
        loop {
            if let RelayStep::Fatal(error) = self.step() {
                debug!(
                    "relay {} -> {} stopped after {} chunks ({} bytes)",
                    self.source.path().display(),
                    self.sink.path().display(),
                    self.stats.chunks,
                    self.stats.bytes
                );
                return error;
            }
        }
    }

    pub fn into_endpoints(self) -> (Endpoint<S>, Endpoint<K>) {
        (self.source, self.sink)
    }
}

/// A single read, re-issued only when a signal interrupted it
fn read_chunk<R: Read + ?Sized>(source: &mut R, chunk: &mut [u8]) -> io::Result<usize> {
    loop {
        match source.read(chunk) {
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}

//! Device Configurator
//!
//! Brings a freshly opened device into the agreed format before any data
//! moves. Requests go out in the order drivers expect them (encoding,
//! channels, rate) and the first rejection aborts the rest.

use log::debug;

use crate::device::PcmDevice;
use crate::error::ConfigError;
use crate::format::{AudioFormat, ParameterKind};

/// Values the driver reported back for each request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    pub encoding: i32,
    pub channels: i32,
    pub sample_rate: i32,
}

impl Negotiated {
    pub fn applied(&self, kind: ParameterKind) -> i32 {
        match kind {
            ParameterKind::SampleEncoding => self.encoding,
            ParameterKind::ChannelCount => self.channels,
            ParameterKind::SampleRate => self.sample_rate,
        }
    }

    /// Requests the driver honoured with a different value, as
    /// `(kind, requested, applied)`
    pub fn mismatches(&self, requested: &AudioFormat) -> Vec<(ParameterKind, i32, i32)> {
        ParameterKind::ORDER
            .into_iter()
            .map(|kind| (kind, requested.parameter(kind), self.applied(kind)))
            .filter(|(_, requested, applied)| requested != applied)
            .collect()
    }
}

/// Apply `format` to `device`: encoding, then channel count, then rate.
///
/// # Errors
/// Returns the first rejected request; later requests are not attempted.
pub fn configure<D>(device: &mut D, format: &AudioFormat) -> Result<Negotiated, ConfigError>
where
    D: PcmDevice + ?Sized,
{
    let mut applied = [0i32; 3];
    for (slot, kind) in applied.iter_mut().zip(ParameterKind::ORDER) {
        let requested = format.parameter(kind);
        debug!("setting {} to {}", kind, requested);
        *slot = device
            .apply_parameter(kind, requested)
            .map_err(|source| ConfigError {
                stage: kind,
                requested,
                source,
            })?;
    }

    let [encoding, channels, sample_rate] = applied;
    Ok(Negotiated {
        encoding,
        channels,
        sample_rate,
    })
}

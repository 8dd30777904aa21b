//! Audio format parameters
//!
//! The triple every endpoint is configured with before any data moves:
//! sample encoding, channel count and sample rate. Encoding codes are the
//! OSS `AFMT_*` values from `<sys/soundcard.h>`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sample encoding of one PCM sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleEncoding {
    MuLaw,
    ALaw,
    U8,
    /// Signed 16-bit little-endian (default)
    #[default]
    S16Le,
    S16Be,
    S8,
    U16Le,
    U16Be,
    S32Le,
    S32Be,
    S24Le,
    S24Be,
}

impl SampleEncoding {
    pub const ALL: [SampleEncoding; 12] = [
        SampleEncoding::MuLaw,
        SampleEncoding::ALaw,
        SampleEncoding::U8,
        SampleEncoding::S16Le,
        SampleEncoding::S16Be,
        SampleEncoding::S8,
        SampleEncoding::U16Le,
        SampleEncoding::U16Be,
        SampleEncoding::S32Le,
        SampleEncoding::S32Be,
        SampleEncoding::S24Le,
        SampleEncoding::S24Be,
    ];

    /// The `AFMT_*` code passed to `SNDCTL_DSP_SETFMT`
    pub fn afmt(self) -> i32 {
        match self {
            SampleEncoding::MuLaw => 0x0000_0001,
            SampleEncoding::ALaw => 0x0000_0002,
            SampleEncoding::U8 => 0x0000_0008,
            SampleEncoding::S16Le => 0x0000_0010,
            SampleEncoding::S16Be => 0x0000_0020,
            SampleEncoding::S8 => 0x0000_0040,
            SampleEncoding::U16Le => 0x0000_0080,
            SampleEncoding::U16Be => 0x0000_0100,
            SampleEncoding::S32Le => 0x0000_1000,
            SampleEncoding::S32Be => 0x0000_2000,
            SampleEncoding::S24Le => 0x0001_0000,
            SampleEncoding::S24Be => 0x0002_0000,
        }
    }

    /// Reverse lookup of an `AFMT_*` code, as written back by a driver
    pub fn from_afmt(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|encoding| encoding.afmt() == code)
    }

    /// Storage size of one sample in bytes
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleEncoding::MuLaw
            | SampleEncoding::ALaw
            | SampleEncoding::U8
            | SampleEncoding::S8 => 1,
            SampleEncoding::S16Le
            | SampleEncoding::S16Be
            | SampleEncoding::U16Le
            | SampleEncoding::U16Be => 2,
            SampleEncoding::S24Le | SampleEncoding::S24Be => 3,
            SampleEncoding::S32Le | SampleEncoding::S32Be => 4,
        }
    }

    fn name(self) -> &'static str {
        match self {
            SampleEncoding::MuLaw => "mu_law",
            SampleEncoding::ALaw => "a_law",
            SampleEncoding::U8 => "u8",
            SampleEncoding::S16Le => "s16le",
            SampleEncoding::S16Be => "s16be",
            SampleEncoding::S8 => "s8",
            SampleEncoding::U16Le => "u16le",
            SampleEncoding::U16Be => "u16be",
            SampleEncoding::S32Le => "s32le",
            SampleEncoding::S32Be => "s32be",
            SampleEncoding::S24Le => "s24le",
            SampleEncoding::S24Be => "s24be",
        }
    }
}

impl fmt::Display for SampleEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SampleEncoding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace(&['-', '_'][..], "");
        Self::ALL
            .into_iter()
            .find(|encoding| encoding.name().replace('_', "") == wanted)
            .ok_or_else(|| format!("unknown sample encoding '{}'", s))
    }
}

/// One of the three configuration requests applied to a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    SampleEncoding,
    ChannelCount,
    SampleRate,
}

impl ParameterKind {
    /// Order in which drivers expect the requests
    pub const ORDER: [ParameterKind; 3] = [
        ParameterKind::SampleEncoding,
        ParameterKind::ChannelCount,
        ParameterKind::SampleRate,
    ];

    /// Render a request or driver value of this kind for log messages
    ///
    /// Encodings show their name, or the raw `AFMT_*` bits when unknown.
    pub fn describe(self, value: i32) -> String {
        match self {
            ParameterKind::SampleEncoding => match SampleEncoding::from_afmt(value) {
                Some(encoding) => encoding.to_string(),
                None => format!("{:#x}", value),
            },
            ParameterKind::ChannelCount | ParameterKind::SampleRate => value.to_string(),
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterKind::SampleEncoding => write!(f, "sample format"),
            ParameterKind::ChannelCount => write!(f, "number of channels"),
            ParameterKind::SampleRate => write!(f, "sampling rate"),
        }
    }
}

/// Audio format shared by both directions of a bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioFormat {
    pub encoding: SampleEncoding,
    pub channels: u32,
    pub sample_rate: u32,
}

impl Default for AudioFormat {
    fn default() -> Self {
        AudioFormat {
            encoding: SampleEncoding::S16Le,
            channels: 2,
            sample_rate: 48000,
        }
    }
}

impl AudioFormat {
    pub fn new(encoding: SampleEncoding, channels: u32, sample_rate: u32) -> Self {
        AudioFormat {
            encoding,
            channels,
            sample_rate,
        }
    }

    /// The value sent with the given configuration request
    ///
    /// Only meaningful for a format that passed [`AudioFormat::validate`];
    /// out-of-range counts are sent as `i32::MAX`.
    pub fn parameter(&self, kind: ParameterKind) -> i32 {
        match kind {
            ParameterKind::SampleEncoding => self.encoding.afmt(),
            ParameterKind::ChannelCount => i32::try_from(self.channels).unwrap_or(i32::MAX),
            ParameterKind::SampleRate => i32::try_from(self.sample_rate).unwrap_or(i32::MAX),
        }
    }

    /// Bytes in one frame (one sample for every channel)
    pub fn frame_size(&self) -> usize {
        self.encoding
            .bytes_per_sample()
            .saturating_mul(self.channels as usize)
    }

    pub fn bytes_per_second(&self) -> usize {
        self.frame_size().saturating_mul(self.sample_rate as usize)
    }

    /// Check that channel count and rate are usable
    ///
    /// Both travel to the driver as a C `int`, so neither may exceed
    /// `i32::MAX`.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.channels == 0 {
            return Err("channel count must be at least 1".to_string());
        }
        if i32::try_from(self.channels).is_err() {
            return Err(format!(
                "channel count {} exceeds {}",
                self.channels,
                i32::MAX
            ));
        }
        if self.sample_rate == 0 {
            return Err("sample rate must be greater than 0".to_string());
        }
        if i32::try_from(self.sample_rate).is_err() {
            return Err(format!(
                "sample rate {} exceeds {}",
                self.sample_rate,
                i32::MAX
            ));
        }
        Ok(())
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}ch {}Hz",
            self.encoding, self.channels, self.sample_rate
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_default_format() {
        let format = AudioFormat::default();
        assert_eq!(format.encoding, SampleEncoding::S16Le);
        assert_eq!(format.channels, 2);
        assert_eq!(format.sample_rate, 48000);
        assert_eq!(format.frame_size(), 4);
        assert_eq!(format.bytes_per_second(), 192_000);
    }

    #[test_case(SampleEncoding::S16Le, 0x10)]
    #[test_case(SampleEncoding::S32Le, 0x1000)]
    #[test_case(SampleEncoding::U8, 0x08)]
    #[test_case(SampleEncoding::S24Be, 0x20000)]
    fn test_afmt_codes(encoding: SampleEncoding, code: i32) {
        assert_eq!(encoding.afmt(), code);
        assert_eq!(SampleEncoding::from_afmt(code), Some(encoding));
    }

    #[test]
    fn test_unknown_afmt_code() {
        assert_eq!(SampleEncoding::from_afmt(0x4000), None);
    }

    #[test_case(ParameterKind::SampleEncoding, 0x10, "s16le" ; "known encoding")]
    #[test_case(ParameterKind::SampleEncoding, 0x4000, "0x4000" ; "unknown encoding")]
    #[test_case(ParameterKind::ChannelCount, 2, "2" ; "channels")]
    #[test_case(ParameterKind::SampleRate, 44100, "44100" ; "rate")]
    fn test_describe_value(kind: ParameterKind, value: i32, expected: &str) {
        assert_eq!(kind.describe(value), expected);
    }

    #[test_case("s16le", SampleEncoding::S16Le)]
    #[test_case("S16_LE", SampleEncoding::S16Le)]
    #[test_case("mu-law", SampleEncoding::MuLaw)]
    #[test_case("s32be", SampleEncoding::S32Be)]
    fn test_parse_encoding(input: &str, expected: SampleEncoding) {
        assert_eq!(input.parse::<SampleEncoding>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_encoding() {
        assert!("f32le".parse::<SampleEncoding>().is_err());
    }

    #[test]
    fn test_parameter_values() {
        let format = AudioFormat::new(SampleEncoding::S32Le, 1, 44100);
        assert_eq!(format.parameter(ParameterKind::SampleEncoding), 0x1000);
        assert_eq!(format.parameter(ParameterKind::ChannelCount), 1);
        assert_eq!(format.parameter(ParameterKind::SampleRate), 44100);
    }

    #[test_case(2, 48000, true ; "default values")]
    #[test_case(0, 48000, false ; "no channels")]
    #[test_case(2, 0, false ; "zero rate")]
    #[test_case(i32::MAX as u32, i32::MAX as u32, true ; "largest c int")]
    #[test_case(u32::MAX, 48000, false ; "channels beyond c int")]
    #[test_case(2, u32::MAX, false ; "rate beyond c int")]
    #[test_case(u32::MAX, u32::MAX, false ; "both beyond c int")]
    fn test_validate(channels: u32, sample_rate: u32, valid: bool) {
        let format = AudioFormat::new(SampleEncoding::S32Le, channels, sample_rate);
        assert_eq!(format.validate().is_ok(), valid);
    }

    #[test]
    fn test_sizes_saturate_instead_of_overflowing() {
        let format = AudioFormat::new(SampleEncoding::S32Le, u32::MAX, u32::MAX);
        assert!(format.frame_size() > 0);
        assert_eq!(
            format.bytes_per_second(),
            format.frame_size().saturating_mul(u32::MAX as usize)
        );
    }

    #[test]
    fn test_deserialize_partial() {
        let format: AudioFormat = serde_json::from_str(r#"{"channels": 1}"#).unwrap();
        assert_eq!(format.channels, 1);
        assert_eq!(format.encoding, SampleEncoding::S16Le);
        assert_eq!(format.sample_rate, 48000);
    }

    #[test]
    fn test_display() {
        assert_eq!(AudioFormat::default().to_string(), "s16le 2ch 48000Hz");
    }
}

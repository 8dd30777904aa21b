//! OSS PCM devices (`/dev/dsp*`)
//!
//! Opened as plain files; the three format requests are the `_IOWR('P', n, int)`
//! ioctls from `<sys/soundcard.h>`. The driver writes the applied value back
//! into the argument.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;
use std::path::Path;

use log::debug;
use nix::libc;

use super::{AccessMode, DeviceOpener, PcmDevice};
use crate::format::ParameterKind;

const SNDCTL_DSP_MAGIC: u8 = b'P';
const SNDCTL_DSP_SPEED: u8 = 2;
const SNDCTL_DSP_SETFMT: u8 = 5;
const SNDCTL_DSP_CHANNELS: u8 = 6;

nix::ioctl_readwrite!(oss_set_format, SNDCTL_DSP_MAGIC, SNDCTL_DSP_SETFMT, libc::c_int);
nix::ioctl_readwrite!(oss_set_channels, SNDCTL_DSP_MAGIC, SNDCTL_DSP_CHANNELS, libc::c_int);
nix::ioctl_readwrite!(oss_set_speed, SNDCTL_DSP_MAGIC, SNDCTL_DSP_SPEED, libc::c_int);

/// An open OSS device file
#[derive(Debug)]
pub struct OssDevice {
    dsp: File,
}

impl OssDevice {
    pub fn open(path: &Path, mode: AccessMode) -> io::Result<OssDevice> {
        let mut options = File::options();
        match mode {
            AccessMode::ReadOnly => options.read(true).write(false),
            AccessMode::WriteOnly => options.read(false).write(true),
        };
        let dsp = options.open(path)?;
        debug!("opened {} as {} (fd {})", path.display(), mode, dsp.as_raw_fd());

        Ok(OssDevice { dsp })
    }
}

impl PcmDevice for OssDevice {
    fn apply_parameter(&mut self, kind: ParameterKind, value: i32) -> io::Result<i32> {
        let fd = self.dsp.as_raw_fd();
        let mut arg: libc::c_int = value;
        // SAFETY: `fd` stays open for the lifetime of `self.dsp` and `arg`
        // outlives the call.
        let result = unsafe {
            match kind {
                ParameterKind::SampleEncoding => oss_set_format(fd, &mut arg),
                ParameterKind::ChannelCount => oss_set_channels(fd, &mut arg),
                ParameterKind::SampleRate => oss_set_speed(fd, &mut arg),
            }
        };
        result.map_err(io::Error::from)?;
        Ok(arg)
    }
}

impl Read for OssDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.dsp.read(buf)
    }
}

impl Write for OssDevice {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.dsp.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.dsp.flush()
    }
}

/// Opens real device files
#[derive(Debug, Clone, Copy, Default)]
pub struct OssOpener;

impl DeviceOpener for OssOpener {
    type Device = OssDevice;

    fn open(&self, path: &Path, mode: AccessMode) -> io::Result<OssDevice> {
        OssDevice::open(path, mode)
    }
}

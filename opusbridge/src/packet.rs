//! Read-only inspection of encoded packets.
//!
//! Parses the TOC byte (RFC 6716 Section 3.1) so callers can check what an
//! encoder actually produced without decoding it.
//!
//! ```text
//!          0 1 2 3 4 5 6 7
//!         +-+-+-+-+-+-+-+-+
//!         | config  |s| c |
//!         +-+-+-+-+-+-+-+-+
//! ```

use std::time::Duration;

use crate::config::Bandwidth;

/// Coding mode selected for a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Silk,
    Hybrid,
    Celt,
}

/// What the TOC byte says about a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketInfo {
    pub mode: Mode,
    pub bandwidth: Bandwidth,
    /// Duration of each frame in the packet.
    pub frame_duration: Duration,
    pub stereo: bool,
    /// Frames in the packet, when the packet is long enough to tell.
    pub frames: Option<u8>,
}

impl PacketInfo {
    /// Total audio carried by the packet.
    pub fn duration(&self) -> Option<Duration> {
        self.frames.map(|n| self.frame_duration * n as u32)
    }

    /// Samples per channel the packet decodes to at `sample_rate`.
    pub fn samples_per_channel(&self, sample_rate: i32) -> Option<usize> {
        let total = self.duration()?;
        Some((total.as_micros() as u64 * sample_rate as u64 / 1_000_000) as usize)
    }
}

/// Parses the TOC byte of `packet`. Returns `None` for an empty packet.
pub fn inspect_packet(packet: &[u8]) -> Option<PacketInfo> {
    let toc = *packet.first()?;
    let config = toc >> 3;

    let (mode, bandwidth) = match config {
        0..=3 => (Mode::Silk, Bandwidth::Narrowband),
        4..=7 => (Mode::Silk, Bandwidth::Mediumband),
        8..=11 => (Mode::Silk, Bandwidth::Wideband),
        12..=13 => (Mode::Hybrid, Bandwidth::Superwideband),
        14..=15 => (Mode::Hybrid, Bandwidth::Fullband),
        16..=19 => (Mode::Celt, Bandwidth::Narrowband),
        20..=23 => (Mode::Celt, Bandwidth::Wideband),
        24..=27 => (Mode::Celt, Bandwidth::Superwideband),
        _ => (Mode::Celt, Bandwidth::Fullband),
    };

    let frame_micros: u64 = match mode {
        Mode::Silk => [10_000, 20_000, 40_000, 60_000][(config & 0b11) as usize],
        Mode::Hybrid => [10_000, 20_000][(config & 0b1) as usize],
        Mode::Celt => [2_500, 5_000, 10_000, 20_000][(config & 0b11) as usize],
    };

    let frames = match toc & 0b11 {
        0 => Some(1),
        1 | 2 => Some(2),
        _ => packet.get(1).map(|b| b & 0b0011_1111),
    };

    Some(PacketInfo {
        mode,
        bandwidth,
        frame_duration: Duration::from_micros(frame_micros),
        stereo: toc & 0b100 != 0,
        frames,
    })
}

//! Creation parameters for encoder and decoder instances.
//!
//! `EncoderConfig` carries everything the bridge applies to a fresh encoder.
//! Its defaults reproduce the historical low-delay voice profile; callers
//! that load settings from YAML only need to name the fields they change.

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::ffi;

/// Sample rates libopus accepts.
pub const SUPPORTED_SAMPLE_RATES: [i32; 5] = [8000, 12000, 16000, 24000, 48000];

/// Opus application type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Application {
    /// Best quality for voice signals.
    Voip,
    /// Best quality for non-voice signals.
    Audio,
    /// Minimum possible coding delay.
    RestrictedLowdelay,
}

impl Application {
    pub(crate) fn to_ffi(self) -> i32 {
        match self {
            Self::Voip => ffi::OPUS_APPLICATION_VOIP,
            Self::Audio => ffi::OPUS_APPLICATION_AUDIO,
            Self::RestrictedLowdelay => ffi::OPUS_APPLICATION_RESTRICTED_LOWDELAY,
        }
    }
}

/// Signal type hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Auto,
    Voice,
    Music,
}

impl Signal {
    pub(crate) fn to_ffi(self) -> i32 {
        match self {
            Self::Auto => ffi::OPUS_AUTO,
            Self::Voice => ffi::OPUS_SIGNAL_VOICE,
            Self::Music => ffi::OPUS_SIGNAL_MUSIC,
        }
    }
}

/// Coded audio bandwidth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bandwidth {
    Auto,
    /// 4 kHz passband.
    Narrowband,
    /// 6 kHz passband.
    Mediumband,
    /// 8 kHz passband.
    Wideband,
    /// 12 kHz passband.
    Superwideband,
    /// 20 kHz passband.
    Fullband,
}

impl Bandwidth {
    pub(crate) fn to_ffi(self) -> i32 {
        match self {
            Self::Auto => ffi::OPUS_AUTO,
            Self::Narrowband => ffi::OPUS_BANDWIDTH_NARROWBAND,
            Self::Mediumband => ffi::OPUS_BANDWIDTH_MEDIUMBAND,
            Self::Wideband => ffi::OPUS_BANDWIDTH_WIDEBAND,
            Self::Superwideband => ffi::OPUS_BANDWIDTH_SUPERWIDEBAND,
            Self::Fullband => ffi::OPUS_BANDWIDTH_FULLBAND,
        }
    }
}

/// Expert frame duration setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameDuration {
    /// Use the frame size passed to each encode call.
    Argument,
    #[serde(rename = "2.5ms")]
    Ms2_5,
    #[serde(rename = "5ms")]
    Ms5,
    #[serde(rename = "10ms")]
    Ms10,
    #[serde(rename = "20ms")]
    Ms20,
    #[serde(rename = "40ms")]
    Ms40,
    #[serde(rename = "60ms")]
    Ms60,
}

impl FrameDuration {
    pub(crate) fn to_ffi(self) -> i32 {
        match self {
            Self::Argument => ffi::OPUS_FRAMESIZE_ARG,
            Self::Ms2_5 => ffi::OPUS_FRAMESIZE_2_5_MS,
            Self::Ms5 => ffi::OPUS_FRAMESIZE_5_MS,
            Self::Ms10 => ffi::OPUS_FRAMESIZE_10_MS,
            Self::Ms20 => ffi::OPUS_FRAMESIZE_20_MS,
            Self::Ms40 => ffi::OPUS_FRAMESIZE_40_MS,
            Self::Ms60 => ffi::OPUS_FRAMESIZE_60_MS,
        }
    }

    /// Duration in microseconds, or `None` for [`FrameDuration::Argument`].
    pub fn micros(self) -> Option<u32> {
        match self {
            Self::Argument => None,
            Self::Ms2_5 => Some(2_500),
            Self::Ms5 => Some(5_000),
            Self::Ms10 => Some(10_000),
            Self::Ms20 => Some(20_000),
            Self::Ms40 => Some(40_000),
            Self::Ms60 => Some(60_000),
        }
    }
}

/// One encoder configuration request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderCtl {
    Signal(Signal),
    Bitrate(i32),
    Bandwidth(Bandwidth),
    Vbr(bool),
    VbrConstraint(bool),
    Complexity(i32),
    InbandFec(bool),
    ForceChannels(i32),
    Dtx(bool),
    LsbDepth(i32),
    FrameDuration(FrameDuration),
    Application(Application),
}

impl EncoderCtl {
    /// Returns the libopus request code and its argument.
    pub(crate) fn to_ffi(self) -> (i32, i32) {
        match self {
            Self::Signal(s) => (ffi::OPUS_SET_SIGNAL_REQUEST, s.to_ffi()),
            Self::Bitrate(b) => (ffi::OPUS_SET_BITRATE_REQUEST, b),
            Self::Bandwidth(b) => (ffi::OPUS_SET_BANDWIDTH_REQUEST, b.to_ffi()),
            Self::Vbr(on) => (ffi::OPUS_SET_VBR_REQUEST, on as i32),
            Self::VbrConstraint(on) => (ffi::OPUS_SET_VBR_CONSTRAINT_REQUEST, on as i32),
            Self::Complexity(c) => (ffi::OPUS_SET_COMPLEXITY_REQUEST, c),
            Self::InbandFec(on) => (ffi::OPUS_SET_INBAND_FEC_REQUEST, on as i32),
            Self::ForceChannels(n) => (ffi::OPUS_SET_FORCE_CHANNELS_REQUEST, n),
            Self::Dtx(on) => (ffi::OPUS_SET_DTX_REQUEST, on as i32),
            Self::LsbDepth(d) => (ffi::OPUS_SET_LSB_DEPTH_REQUEST, d),
            Self::FrameDuration(fd) => (ffi::OPUS_SET_EXPERT_FRAME_DURATION_REQUEST, fd.to_ffi()),
            Self::Application(a) => (ffi::OPUS_SET_APPLICATION_REQUEST, a.to_ffi()),
        }
    }
}

fn default_complexity() -> i32 {
    5
}

fn default_lsb_depth() -> i32 {
    16
}

fn default_create_application() -> Application {
    Application::RestrictedLowdelay
}

fn default_application() -> Application {
    Application::Voip
}

fn default_signal() -> Signal {
    Signal::Voice
}

fn default_bandwidth() -> Bandwidth {
    Bandwidth::Wideband
}

fn default_frame_duration() -> FrameDuration {
    FrameDuration::Ms20
}

fn default_true() -> bool {
    true
}

/// Encoder creation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Sample rate in Hz.
    pub sample_rate: i32,

    /// Channel count (1 or 2). Also forced on the encoder.
    pub channels: i32,

    /// Encoder complexity (0-10).
    #[serde(default = "default_complexity")]
    pub complexity: i32,

    /// Target bitrate in bits per second.
    ///
    /// `None` keeps the historical behavior of using the sample rate value as
    /// the bitrate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<i32>,

    /// Application passed to the encoder constructor.
    #[serde(default = "default_create_application")]
    pub create_application: Application,

    /// Application re-asserted as the last configuration step.
    #[serde(default = "default_application")]
    pub application: Application,

    #[serde(default = "default_signal")]
    pub signal: Signal,

    #[serde(default = "default_bandwidth")]
    pub bandwidth: Bandwidth,

    #[serde(default = "default_true")]
    pub vbr: bool,

    #[serde(default)]
    pub vbr_constraint: bool,

    #[serde(default)]
    pub inband_fec: bool,

    #[serde(default)]
    pub dtx: bool,

    /// Input sample bit depth.
    #[serde(default = "default_lsb_depth")]
    pub lsb_depth: i32,

    #[serde(default = "default_frame_duration")]
    pub frame_duration: FrameDuration,
}

impl EncoderConfig {
    /// Returns the low-delay voice profile for the given stream layout.
    pub fn new(sample_rate: i32, channels: i32, complexity: i32) -> Self {
        Self {
            sample_rate,
            channels,
            complexity,
            bitrate: None,
            create_application: default_create_application(),
            application: default_application(),
            signal: default_signal(),
            bandwidth: default_bandwidth(),
            vbr: true,
            vbr_constraint: false,
            inband_fec: false,
            dtx: false,
            lsb_depth: default_lsb_depth(),
            frame_duration: default_frame_duration(),
        }
    }

    /// Overrides the target bitrate.
    pub fn with_bitrate(mut self, bitrate: i32) -> Self {
        self.bitrate = Some(bitrate);
        self
    }

    /// Parses a config from YAML.
    pub fn from_yaml(s: &str) -> Result<Self, BridgeError> {
        serde_yaml::from_str(s).map_err(|e| BridgeError::InvalidParameter(e.to_string()))
    }

    /// Bitrate applied to the encoder.
    pub fn effective_bitrate(&self) -> i32 {
        self.bitrate.unwrap_or(self.sample_rate)
    }

    /// Checks ranges libopus would otherwise reject at creation.
    pub fn validate(&self) -> Result<(), BridgeError> {
        validate_layout(self.sample_rate, self.channels)?;
        if !(0..=10).contains(&self.complexity) {
            return Err(BridgeError::InvalidParameter(format!(
                "complexity {} outside 0..=10",
                self.complexity
            )));
        }
        if !(8..=24).contains(&self.lsb_depth) {
            return Err(BridgeError::InvalidParameter(format!(
                "lsb depth {} outside 8..=24",
                self.lsb_depth
            )));
        }
        Ok(())
    }

    /// Requests applied to a freshly created encoder, in order.
    pub fn ctl_sequence(&self) -> Vec<EncoderCtl> {
        vec![
            EncoderCtl::Signal(self.signal),
            EncoderCtl::Bitrate(self.effective_bitrate()),
            EncoderCtl::Bandwidth(self.bandwidth),
            EncoderCtl::Vbr(self.vbr),
            EncoderCtl::VbrConstraint(self.vbr_constraint),
            EncoderCtl::Complexity(self.complexity),
            EncoderCtl::InbandFec(self.inband_fec),
            EncoderCtl::ForceChannels(self.channels),
            EncoderCtl::Dtx(self.dtx),
            EncoderCtl::LsbDepth(self.lsb_depth),
            EncoderCtl::FrameDuration(self.frame_duration),
            EncoderCtl::Application(self.application),
        ]
    }
}

/// Decoder creation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Output sample rate in Hz.
    pub sample_rate: i32,
    /// Output channel count (1 or 2).
    pub channels: i32,
}

impl DecoderConfig {
    pub fn new(sample_rate: i32, channels: i32) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        validate_layout(self.sample_rate, self.channels)
    }
}

fn validate_layout(sample_rate: i32, channels: i32) -> Result<(), BridgeError> {
    if !SUPPORTED_SAMPLE_RATES.contains(&sample_rate) {
        return Err(BridgeError::InvalidParameter(format!(
            "unsupported sample rate {sample_rate}"
        )));
    }
    if channels != 1 && channels != 2 {
        return Err(BridgeError::InvalidParameter(format!(
            "channel count {channels} must be 1 or 2"
        )));
    }
    Ok(())
}

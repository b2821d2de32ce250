//! The codec capability the bridge drives.
//!
//! [`Codec`] is the seam between the bridge and the native library: the
//! bridge owns lifecycle, validation and buffer handling, a `Codec` only
//! creates instances and runs them. Destroying an instance is dropping it.

use crate::config::{Application, EncoderCtl};
use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::BridgeError;
use crate::ffi;

/// Native codec library.
pub trait Codec: Send + Sync {
    /// One encoder instance. Dropping it releases the native resource.
    type Encoder: Send;
    /// One decoder instance. Dropping it releases the native resource.
    type Decoder: Send;

    fn create_encoder(
        &self,
        sample_rate: i32,
        channels: i32,
        application: Application,
    ) -> Result<Self::Encoder, BridgeError>;

    /// Applies one configuration request to an encoder.
    fn encoder_ctl(&self, encoder: &mut Self::Encoder, ctl: EncoderCtl) -> Result<(), BridgeError>;

    fn create_decoder(&self, sample_rate: i32, channels: i32) -> Result<Self::Decoder, BridgeError>;

    /// Encodes `frame_size` samples per channel from `pcm` into `out`.
    /// Returns the packet length.
    fn encode(
        &self,
        encoder: &mut Self::Encoder,
        pcm: &[i16],
        frame_size: usize,
        out: &mut [u8],
    ) -> Result<usize, BridgeError>;

    /// Decodes `packet` into at most `frame_size` samples per channel.
    /// `None` requests concealment of a lost packet. Returns samples per
    /// channel written.
    fn decode(
        &self,
        decoder: &mut Self::Decoder,
        packet: Option<&[u8]>,
        pcm: &mut [i16],
        frame_size: usize,
        fec: bool,
    ) -> Result<usize, BridgeError>;

    /// Human-readable description of a codec status code.
    fn describe_error(&self, code: i32) -> String;
}

/// libopus, linked at build time.
#[derive(Debug, Clone, Copy, Default)]
pub struct LibOpus;

impl Codec for LibOpus {
    type Encoder = Encoder;
    type Decoder = Decoder;

    fn create_encoder(
        &self,
        sample_rate: i32,
        channels: i32,
        application: Application,
    ) -> Result<Encoder, BridgeError> {
        Encoder::new(sample_rate, channels, application)
    }

    fn encoder_ctl(&self, encoder: &mut Encoder, ctl: EncoderCtl) -> Result<(), BridgeError> {
        encoder.ctl(ctl)
    }

    fn create_decoder(&self, sample_rate: i32, channels: i32) -> Result<Decoder, BridgeError> {
        Decoder::new(sample_rate, channels)
    }

    fn encode(
        &self,
        encoder: &mut Encoder,
        pcm: &[i16],
        frame_size: usize,
        out: &mut [u8],
    ) -> Result<usize, BridgeError> {
        encoder.encode_to(pcm, frame_size, out)
    }

    fn decode(
        &self,
        decoder: &mut Decoder,
        packet: Option<&[u8]>,
        pcm: &mut [i16],
        frame_size: usize,
        fec: bool,
    ) -> Result<usize, BridgeError> {
        decoder.decode_to(packet, pcm, frame_size, fec)
    }

    fn describe_error(&self, code: i32) -> String {
        ffi::error_string(code)
    }
}

/// Builds the error for a negative libopus status.
pub(crate) fn rejected(code: i32) -> BridgeError {
    BridgeError::CodecRejected {
        code,
        message: ffi::error_string(code),
    }
}

//! Numeric-contract shim for foreign callers.
//!
//! Handles cross the boundary as `i64` with 0 meaning "no instance", and
//! every failure collapses into a return value:
//!
//! | Failure | create | encode | decode |
//! |---|---|---|---|
//! | bad handle, null array | 0 | 0 | 0 |
//! | empty or undersized array | - | 0 | -1 |
//! | bad parameters | 0 | - | - |
//! | codec status < 0 | 0 | status | status |
//!
//! Caller arrays are acquired for the duration of one call and released by
//! their guards on every path out of it.

use crate::bridge::Bridge;
use crate::buffer::CallerArray;
use crate::codec::{Codec, LibOpus};
use crate::config::{DecoderConfig, EncoderConfig};
use crate::error::BridgeError;
use crate::handle::{DecoderHandle, EncoderHandle};
use crate::logger::{log_error, log_warn};

/// Handle value meaning "no instance".
pub const NO_INSTANCE: i64 = 0;

/// Decode result for a zero-length input or output array.
pub const EMPTY_BUFFER: i32 = -1;

/// [`Bridge`] behind the legacy numeric contract.
pub struct LegacyBridge<C: Codec = LibOpus> {
    bridge: Bridge<C>,
}

impl LegacyBridge<LibOpus> {
    pub fn new() -> Self {
        Self::from_bridge(Bridge::new())
    }
}

impl Default for LegacyBridge<LibOpus> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Codec> LegacyBridge<C> {
    pub fn from_bridge(bridge: Bridge<C>) -> Self {
        Self { bridge }
    }

    /// The typed bridge underneath.
    pub fn bridge(&self) -> &Bridge<C> {
        &self.bridge
    }

    /// Creates an encoder with the low-delay voice profile.
    /// Returns [`NO_INSTANCE`] on failure.
    pub fn create_encoder(&self, sample_rate: i32, channels: i32, complexity: i32) -> i64 {
        self.create_encoder_with(&EncoderConfig::new(sample_rate, channels, complexity))
    }

    pub fn create_encoder_with(&self, config: &EncoderConfig) -> i64 {
        self.bridge
            .create_encoder(config)
            .map_or(NO_INSTANCE, EncoderHandle::to_raw)
    }

    /// Creates a decoder. Returns [`NO_INSTANCE`] on failure.
    pub fn create_decoder(&self, sample_rate: i32, channels: i32) -> i64 {
        self.bridge
            .create_decoder(&DecoderConfig::new(sample_rate, channels))
            .map_or(NO_INSTANCE, DecoderHandle::to_raw)
    }

    /// Encodes from `offset` to the end of `samples` into `out`.
    ///
    /// Returns the packet length, 0 on a precondition failure, or the
    /// codec's negative status.
    pub fn encode<S, B>(&self, handle: i64, samples: Option<&mut S>, offset: i32, out: Option<&mut B>) -> i32
    where
        S: CallerArray<i16> + ?Sized,
        B: CallerArray<u8> + ?Sized,
    {
        let (Some(typed), Some(samples), Some(out)) = (EncoderHandle::from_raw(handle), samples, out) else {
            log_error!(self.bridge.logger(), "encode: null handle or buffer (handle={:#x})", handle);
            return 0;
        };

        let pcm = samples.acquire();
        let mut packet = out.acquire();
        let Ok(offset) = usize::try_from(offset) else {
            log_error!(self.bridge.logger(), "encode: negative offset {}", offset);
            return 0;
        };

        match self.bridge.encode(typed, &*pcm, offset, &mut *packet) {
            Ok(n) => clamp_len(n),
            Err(BridgeError::CodecRejected { code, .. }) => code,
            Err(_) => 0,
        }
    }

    /// Decodes the packet in `data` into `out`.
    ///
    /// Returns samples per channel, 0 for a bad handle or null array,
    /// [`EMPTY_BUFFER`] for an empty array, or the codec's negative status.
    pub fn decode<B, S>(&self, handle: i64, data: Option<&mut B>, out: Option<&mut S>) -> i32
    where
        B: CallerArray<u8> + ?Sized,
        S: CallerArray<i16> + ?Sized,
    {
        let (Some(typed), Some(data), Some(out)) = (DecoderHandle::from_raw(handle), data, out) else {
            log_error!(self.bridge.logger(), "decode: null handle or buffer (handle={:#x})", handle);
            return 0;
        };

        let packet = data.acquire();
        let mut pcm = out.acquire();

        match self.bridge.decode(typed, &*packet, &mut *pcm) {
            Ok(n) => clamp_len(n),
            Err(BridgeError::BufferTooSmall { .. }) => EMPTY_BUFFER,
            Err(BridgeError::CodecRejected { code, .. }) => code,
            Err(_) => 0,
        }
    }

    /// Destroys an encoder. [`NO_INSTANCE`] is a no-op.
    pub fn destroy_encoder(&self, handle: i64) {
        if handle == NO_INSTANCE {
            return;
        }
        match EncoderHandle::from_raw(handle) {
            Some(typed) => {
                let _ = self.bridge.destroy_encoder(typed);
            }
            None => log_warn!(self.bridge.logger(), "destroy encoder: not an encoder handle {:#x}", handle),
        }
    }

    /// Destroys a decoder. [`NO_INSTANCE`] is a no-op.
    pub fn destroy_decoder(&self, handle: i64) {
        if handle == NO_INSTANCE {
            return;
        }
        match DecoderHandle::from_raw(handle) {
            Some(typed) => {
                let _ = self.bridge.destroy_decoder(typed);
            }
            None => log_warn!(self.bridge.logger(), "destroy decoder: not a decoder handle {:#x}", handle),
        }
    }
}

fn clamp_len(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

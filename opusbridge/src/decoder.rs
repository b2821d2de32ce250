//! Owned libopus decoder.

use std::ptr;

use crate::codec::rejected;
use crate::error::BridgeError;
use crate::ffi::{self, OpusDecoder as OpusDecoderHandle};

/// One native decoder. The native state is destroyed exactly once, on drop.
pub struct Decoder {
    sample_rate: i32,
    channels: i32,
    handle: *mut OpusDecoderHandle,
}

// Safety: libopus decoder state has no thread affinity; `&mut self` on every
// call keeps access exclusive.
unsafe impl Send for Decoder {}

impl Drop for Decoder {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            unsafe { ffi::opus_decoder_destroy(self.handle) };
            self.handle = ptr::null_mut();
        }
    }
}

impl Decoder {
    /// Creates a new Opus decoder.
    ///
    /// # Parameters
    /// - `sample_rate`: Sample rate to decode at (8000, 12000, 16000, 24000, or 48000)
    /// - `channels`: Number of channels (1 or 2)
    pub fn new(sample_rate: i32, channels: i32) -> Result<Self, BridgeError> {
        let mut error: i32 = 0;
        let handle = unsafe { ffi::opus_decoder_create(sample_rate, channels, &mut error) };

        if error != ffi::OPUS_OK {
            if !handle.is_null() {
                unsafe { ffi::opus_decoder_destroy(handle) };
            }
            return Err(rejected(error));
        }
        if handle.is_null() {
            return Err(rejected(ffi::OPUS_ALLOC_FAIL));
        }

        Ok(Self {
            sample_rate,
            channels,
            handle,
        })
    }

    pub fn sample_rate(&self) -> i32 {
        self.sample_rate
    }

    pub fn channels(&self) -> i32 {
        self.channels
    }

    /// Decodes a packet into `pcm`, at most `frame_size` samples per channel.
    /// `None` runs packet loss concealment. Returns samples per channel.
    pub fn decode_to(
        &mut self,
        packet: Option<&[u8]>,
        pcm: &mut [i16],
        frame_size: usize,
        fec: bool,
    ) -> Result<usize, BridgeError> {
        let needed = frame_size.saturating_mul(self.channels as usize);
        if pcm.len() < needed {
            return Err(BridgeError::BufferTooSmall {
                needed,
                available: pcm.len(),
            });
        }
        let frame_size = i32::try_from(frame_size)
            .map_err(|_| BridgeError::InvalidParameter(format!("frame size {frame_size} too large")))?;

        let (data_ptr, data_len) = match packet {
            Some(p) if !p.is_empty() => {
                let len = i32::try_from(p.len())
                    .map_err(|_| BridgeError::InvalidParameter(format!("packet of {} bytes", p.len())))?;
                (p.as_ptr(), len)
            }
            _ => (ptr::null(), 0),
        };

        let n = unsafe {
            ffi::opus_decode(
                self.handle,
                data_ptr,
                data_len,
                pcm.as_mut_ptr(),
                frame_size,
                fec as i32,
            )
        };

        if n < 0 {
            return Err(rejected(n));
        }

        Ok(n as usize)
    }
}

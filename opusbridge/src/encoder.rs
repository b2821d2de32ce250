//! Owned libopus encoder.

use std::ptr;

use crate::codec::rejected;
use crate::config::{Application, EncoderCtl};
use crate::error::BridgeError;
use crate::ffi::{self, OpusEncoder as OpusEncoderHandle};

/// One native encoder. The native state is destroyed exactly once, on drop.
pub struct Encoder {
    sample_rate: i32,
    channels: i32,
    handle: *mut OpusEncoderHandle,
}

// Safety: libopus encoder state has no thread affinity; `&mut self` on every
// call keeps access exclusive.
unsafe impl Send for Encoder {}

impl Drop for Encoder {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            unsafe { ffi::opus_encoder_destroy(self.handle) };
            self.handle = ptr::null_mut();
        }
    }
}

impl Encoder {
    /// Creates a new Opus encoder.
    ///
    /// # Parameters
    /// - `sample_rate`: Sample rate (8000, 12000, 16000, 24000, or 48000)
    /// - `channels`: Number of channels (1 or 2)
    /// - `application`: Intended application type
    pub fn new(sample_rate: i32, channels: i32, application: Application) -> Result<Self, BridgeError> {
        let mut error: i32 = 0;
        let handle = unsafe {
            ffi::opus_encoder_create(sample_rate, channels, application.to_ffi(), &mut error)
        };

        if error != ffi::OPUS_OK {
            if !handle.is_null() {
                unsafe { ffi::opus_encoder_destroy(handle) };
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

    /// Applies one configuration request.
    pub fn ctl(&mut self, ctl: EncoderCtl) -> Result<(), BridgeError> {
        let (request, value) = ctl.to_ffi();
        let ret = unsafe { ffi::opus_encoder_ctl(self.handle, request, value) };
        if ret != ffi::OPUS_OK {
            return Err(rejected(ret));
        }
        Ok(())
    }

    /// Encodes `frame_size` samples per channel into `buf`.
    /// Returns the number of bytes written.
    pub fn encode_to(&mut self, pcm: &[i16], frame_size: usize, buf: &mut [u8]) -> Result<usize, BridgeError> {
        let needed = frame_size.saturating_mul(self.channels as usize);
        if pcm.len() < needed {
            return Err(BridgeError::BufferTooSmall {
                needed,
                available: pcm.len(),
            });
        }
        let frame_size = i32::try_from(frame_size)
            .map_err(|_| BridgeError::InvalidParameter(format!("frame size {frame_size} too large")))?;
        let max_bytes = i32::try_from(buf.len()).unwrap_or(i32::MAX);

        let n = unsafe {
            ffi::opus_encode(
                self.handle,
                pcm.as_ptr(),
                frame_size,
                buf.as_mut_ptr(),
                max_bytes,
            )
        };

        if n < 0 {
            return Err(rejected(n));
        }

        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Bandwidth, EncoderConfig, FrameDuration, Signal};

    fn sine(frame_size: usize, freq: f32, rate: f32) -> Vec<i16> {
        (0..frame_size)
            .map(|i| ((i as f32 * freq * 2.0 * std::f32::consts::PI / rate).sin() * 10000.0) as i16)
            .collect()
    }

    #[test]
    fn test_encoder_create() {
        let enc = Encoder::new(16000, 1, Application::RestrictedLowdelay).unwrap();
        assert_eq!(enc.sample_rate(), 16000);
        assert_eq!(enc.channels(), 1);
    }

    #[test]
    fn test_encoder_create_rejects_bad_layout() {
        let err = Encoder::new(44100, 1, Application::Voip).err().unwrap();
        assert_eq!(err.codec_code(), Some(ffi::OPUS_BAD_ARG));

        let err = Encoder::new(16000, 3, Application::Voip).err().unwrap();
        assert_eq!(err.codec_code(), Some(ffi::OPUS_BAD_ARG));
    }

    #[test]
    fn test_full_ctl_sequence_accepted() {
        for rate in [8000, 12000, 16000, 24000, 48000] {
            for channels in [1, 2] {
                let cfg = EncoderConfig::new(rate, channels, 10);
                let mut enc = Encoder::new(rate, channels, cfg.create_application).unwrap();
                for ctl in cfg.ctl_sequence() {
                    enc.ctl(ctl).unwrap_or_else(|e| panic!("{ctl:?} at {rate}/{channels}: {e}"));
                }
            }
        }
    }

    #[test]
    fn test_ctl_rejects_out_of_range() {
        let mut enc = Encoder::new(16000, 1, Application::Voip).unwrap();
        assert!(enc.ctl(EncoderCtl::Complexity(11)).is_err());
        assert!(enc.ctl(EncoderCtl::ForceChannels(3)).is_err());
        assert!(enc.ctl(EncoderCtl::Signal(Signal::Music)).is_ok());
        assert!(enc.ctl(EncoderCtl::Bandwidth(Bandwidth::Auto)).is_ok());
        assert!(enc.ctl(EncoderCtl::FrameDuration(FrameDuration::Argument)).is_ok());
    }

    #[test]
    fn test_encode_silence() {
        let mut enc = Encoder::new(16000, 1, Application::Voip).unwrap();
        let pcm = vec![0i16; 320];
        let mut buf = vec![0u8; 4000];
        let n = enc.encode_to(&pcm, 320, &mut buf).unwrap();
        assert!(n > 0 && n <= buf.len());
    }

    #[test]
    fn test_encode_non_silence_stereo() {
        let mut enc = Encoder::new(48000, 2, Application::Voip).unwrap();
        let mono = sine(960, 440.0, 48000.0);
        let pcm: Vec<i16> = mono.iter().flat_map(|&s| [s, s]).collect();
        let mut buf = vec![0u8; 4000];
        let n = enc.encode_to(&pcm, 960, &mut buf).unwrap();
        assert!(n > 1);
    }

    #[test]
    fn test_encode_short_input_rejected_before_native_call() {
        let mut enc = Encoder::new(16000, 2, Application::Voip).unwrap();
        let pcm = vec![0i16; 320];
        let mut buf = vec![0u8; 100];
        let err = enc.encode_to(&pcm, 320, &mut buf).unwrap_err();
        assert_eq!(
            err,
            BridgeError::BufferTooSmall {
                needed: 640,
                available: 320
            }
        );
    }

    #[test]
    fn test_encode_invalid_frame_size() {
        let mut enc = Encoder::new(16000, 1, Application::Voip).unwrap();
        let pcm = vec![0i16; 300];
        let mut buf = vec![0u8; 100];
        let err = enc.encode_to(&pcm, 300, &mut buf).unwrap_err();
        assert_eq!(err.codec_code(), Some(ffi::OPUS_BAD_ARG));
    }

    #[test]
    fn test_encoder_multiple_frames() {
        let mut enc = Encoder::new(16000, 1, Application::Voip).unwrap();
        let pcm = sine(320, 300.0, 16000.0);
        let mut buf = vec![0u8; 1500];
        for _ in 0..10 {
            assert!(enc.encode_to(&pcm, 320, &mut buf).is_ok());
        }
    }
}

//! Typed bridge over a [`Codec`].
//!
//! The bridge owns every instance it creates and hands out generational
//! handles instead of addresses. All operations return [`Result`]; the
//! numeric contract foreign callers expect lives in [`crate::compat`].

use std::sync::Arc;

use crate::codec::{Codec, LibOpus};
use crate::config::{DecoderConfig, EncoderConfig};
use crate::error::BridgeError;
use crate::handle::{DecoderHandle, EncoderHandle, HandleKind, HandleTable};
use crate::logger::{Logger, default_logger, log_debug, log_error, log_info, log_warn};

/// Samples that must remain after the encode offset: one 20 ms frame at
/// 16 kHz mono.
pub const MIN_FRAME_SAMPLES: usize = 320;

pub type Result<T> = std::result::Result<T, BridgeError>;

struct EncoderSlot<E> {
    encoder: E,
    config: EncoderConfig,
}

struct DecoderSlot<D> {
    decoder: D,
    config: DecoderConfig,
}

/// Registry of live codec instances.
///
/// `Bridge` is `Send + Sync`. Distinct handles can be driven from different
/// threads at the same time; calls on one handle are serialized.
pub struct Bridge<C: Codec = LibOpus> {
    codec: C,
    encoders: HandleTable<EncoderSlot<C::Encoder>>,
    decoders: HandleTable<DecoderSlot<C::Decoder>>,
    logger: Arc<dyn Logger>,
}

impl Bridge<LibOpus> {
    /// Creates a bridge over the linked libopus.
    pub fn new() -> Self {
        Self::with_codec(LibOpus)
    }
}

impl Default for Bridge<LibOpus> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Codec> Bridge<C> {
    pub fn with_codec(codec: C) -> Self {
        Self {
            codec,
            encoders: HandleTable::new(HandleKind::Encoder),
            decoders: HandleTable::new(HandleKind::Decoder),
            logger: default_logger(),
        }
    }

    /// Replaces the logger diagnostics are sent to.
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    /// Creates an encoder and applies the configuration sequence.
    ///
    /// Settings the codec refuses are logged and skipped, the encoder is
    /// still returned.
    pub fn create_encoder(&self, config: &EncoderConfig) -> Result<EncoderHandle> {
        log_info!(
            self.logger,
            "create encoder: rate={} channels={} complexity={}",
            config.sample_rate,
            config.channels,
            config.complexity
        );
        if let Err(e) = config.validate() {
            return self.fail("create encoder", e);
        }

        let mut encoder = match self.codec.create_encoder(
            config.sample_rate,
            config.channels,
            config.create_application,
        ) {
            Ok(encoder) => encoder,
            Err(e) => return self.fail("create encoder", e),
        };

        for ctl in config.ctl_sequence() {
            if let Err(e) = self.codec.encoder_ctl(&mut encoder, ctl) {
                log_warn!(self.logger, "encoder setting {:?} not applied: {}", ctl, e);
            }
        }

        let handle = self.encoders.insert(EncoderSlot {
            encoder,
            config: config.clone(),
        });
        log_debug!(self.logger, "encoder {:?} live", handle);
        Ok(handle.into())
    }

    /// Creates a decoder.
    pub fn create_decoder(&self, config: &DecoderConfig) -> Result<DecoderHandle> {
        log_info!(
            self.logger,
            "create decoder: rate={} channels={}",
            config.sample_rate,
            config.channels
        );
        if let Err(e) = config.validate() {
            return self.fail("create decoder", e);
        }

        let decoder = match self.codec.create_decoder(config.sample_rate, config.channels) {
            Ok(decoder) => decoder,
            Err(e) => return self.fail("create decoder", e),
        };

        let handle = self.decoders.insert(DecoderSlot {
            decoder,
            config: *config,
        });
        log_debug!(self.logger, "decoder {:?} live", handle);
        Ok(handle.into())
    }

    /// Encodes the samples from `offset` to the end of `samples` into `out`.
    ///
    /// At least [`MIN_FRAME_SAMPLES`] samples must remain after `offset`. The
    /// whole remainder is handed to the codec, which consumes as much of it
    /// as its configured frame duration needs. Returns the packet length.
    pub fn encode(
        &self,
        handle: EncoderHandle,
        samples: &[i16],
        offset: usize,
        out: &mut [u8],
    ) -> Result<usize> {
        let slot = match self.encoders.get(handle.raw()) {
            Ok(slot) => slot,
            Err(e) => return self.fail("encode", e),
        };
        if out.is_empty() {
            return self.fail("encode", BridgeError::BufferTooSmall { needed: 1, available: 0 });
        }
        let remaining = samples.len().saturating_sub(offset);
        if remaining < MIN_FRAME_SAMPLES {
            return self.fail(
                "encode",
                BridgeError::BufferTooSmall {
                    needed: MIN_FRAME_SAMPLES,
                    available: remaining,
                },
            );
        }

        let pcm = &samples[offset..];
        let mut slot = slot.lock();
        let frame_size = pcm.len() / slot.config.channels as usize;
        match self.codec.encode(&mut slot.encoder, pcm, frame_size, out) {
            Ok(n) => Ok(n),
            Err(e) => self.fail("encode", e),
        }
    }

    /// Decodes one packet into `out`. Returns samples per channel.
    ///
    /// FEC recovery is not requested; `out.len() / channels` bounds the
    /// decoded frame.
    pub fn decode(&self, handle: DecoderHandle, packet: &[u8], out: &mut [i16]) -> Result<usize> {
        if packet.is_empty() {
            // Checked after the handle so a stale handle reports as such.
            self.decoders.get(handle.raw()).or_else(|e| self.fail("decode", e))?;
            return self.fail("decode", BridgeError::BufferTooSmall { needed: 1, available: 0 });
        }
        self.decode_inner("decode", handle, Some(packet), out)
    }

    /// Fills `out` with concealment audio for a lost packet.
    pub fn conceal(&self, handle: DecoderHandle, out: &mut [i16]) -> Result<usize> {
        self.decode_inner("conceal", handle, None, out)
    }

    fn decode_inner(
        &self,
        op: &str,
        handle: DecoderHandle,
        packet: Option<&[u8]>,
        out: &mut [i16],
    ) -> Result<usize> {
        let slot = match self.decoders.get(handle.raw()) {
            Ok(slot) => slot,
            Err(e) => return self.fail(op, e),
        };
        let mut slot = slot.lock();
        let channels = slot.config.channels as usize;
        let frame_size = out.len() / channels;
        if frame_size == 0 {
            return self.fail(
                op,
                BridgeError::BufferTooSmall {
                    needed: channels,
                    available: out.len(),
                },
            );
        }
        match self.codec.decode(&mut slot.decoder, packet, out, frame_size, false) {
            Ok(n) => Ok(n),
            Err(e) => self.fail(op, e),
        }
    }

    /// Destroys an encoder. Every copy of the handle becomes invalid.
    ///
    /// If another thread is still inside a call on this encoder, the native
    /// instance is released when that call returns.
    pub fn destroy_encoder(&self, handle: EncoderHandle) -> Result<()> {
        match self.encoders.remove(handle.raw()) {
            Ok(_) => {
                log_debug!(self.logger, "encoder {:?} destroyed", handle);
                Ok(())
            }
            Err(e) => self.fail("destroy encoder", e),
        }
    }

    /// Destroys a decoder. Every copy of the handle becomes invalid.
    pub fn destroy_decoder(&self, handle: DecoderHandle) -> Result<()> {
        match self.decoders.remove(handle.raw()) {
            Ok(_) => {
                log_debug!(self.logger, "decoder {:?} destroyed", handle);
                Ok(())
            }
            Err(e) => self.fail("destroy decoder", e),
        }
    }

    /// Returns the configuration an encoder was created with.
    pub fn encoder_config(&self, handle: EncoderHandle) -> Result<EncoderConfig> {
        let slot = self.encoders.get(handle.raw())?;
        let config = slot.lock().config.clone();
        Ok(config)
    }

    /// Returns the configuration a decoder was created with.
    pub fn decoder_config(&self, handle: DecoderHandle) -> Result<DecoderConfig> {
        let slot = self.decoders.get(handle.raw())?;
        let config = slot.lock().config;
        Ok(config)
    }

    pub fn live_encoders(&self) -> usize {
        self.encoders.len()
    }

    pub fn live_decoders(&self) -> usize {
        self.decoders.len()
    }

    fn fail<T>(&self, op: &str, err: BridgeError) -> Result<T> {
        log_error!(self.logger, "{}: {}", op, err);
        Err(err)
    }
}

impl<C: Codec> Drop for Bridge<C> {
    fn drop(&mut self) {
        let encoders = self.encoders.drain().len();
        let decoders = self.decoders.drain().len();
        if encoders + decoders > 0 {
            log_debug!(
                self.logger,
                "released {} encoders and {} decoders left live",
                encoders,
                decoders
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::codec::testing::MockCodec;
    use crate::config::{Application, EncoderCtl};
    use crate::logger::testing::RecordingLogger;

    fn mock_bridge() -> (Bridge<MockCodec>, Arc<crate::codec::testing::Calls>, Arc<RecordingLogger>) {
        mock_bridge_with(MockCodec::default())
    }

    fn mock_bridge_with(
        codec: MockCodec,
    ) -> (Bridge<MockCodec>, Arc<crate::codec::testing::Calls>, Arc<RecordingLogger>) {
        let calls = codec.calls.clone();
        let logger = Arc::new(RecordingLogger::default());
        let bridge = Bridge::with_codec(codec).with_logger(logger.clone());
        (bridge, calls, logger)
    }

    #[test]
    fn test_bridge_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Bridge>();
        assert_send_sync::<Bridge<MockCodec>>();
    }

    #[test]
    fn test_create_encoder_applies_sequence() {
        let (bridge, calls, _) = mock_bridge();
        let cfg = EncoderConfig::new(16000, 1, 8);
        let handle = bridge.create_encoder(&cfg).unwrap();

        assert!(handle.to_raw() != 0);
        assert_eq!(*calls.applications.lock(), vec![Application::RestrictedLowdelay]);
        assert_eq!(*calls.ctls.lock(), cfg.ctl_sequence());
        assert_eq!(bridge.encoder_config(handle).unwrap(), cfg);
        assert_eq!(bridge.live_encoders(), 1);
    }

    #[test]
    fn test_create_encoder_invalid_params_skip_codec() {
        let (bridge, calls, logger) = mock_bridge();
        for cfg in [
            EncoderConfig::new(44100, 1, 5),
            EncoderConfig::new(16000, 3, 5),
            EncoderConfig::new(16000, 1, 11),
        ] {
            let err = bridge.create_encoder(&cfg).unwrap_err();
            assert!(matches!(err, BridgeError::InvalidParameter(_)));
        }
        assert_eq!(calls.total(), 0);
        assert!(logger.contains("ERROR create encoder"));
    }

    #[test]
    fn test_create_encoder_codec_rejects() {
        let (bridge, calls, logger) = mock_bridge_with(MockCodec {
            reject_create: Some(-7),
            ..Default::default()
        });
        let err = bridge.create_encoder(&EncoderConfig::new(16000, 1, 5)).unwrap_err();
        assert_eq!(err.codec_code(), Some(-7));
        assert!(calls.ctls.lock().is_empty());
        assert_eq!(bridge.live_encoders(), 0);
        assert!(logger.contains("mock status -7"));
    }

    #[test]
    fn test_create_encoder_ctl_failure_is_not_fatal() {
        let (bridge, calls, logger) = mock_bridge_with(MockCodec {
            reject_ctl: Some(-1),
            ..Default::default()
        });
        let cfg = EncoderConfig::new(16000, 1, 5);
        assert!(bridge.create_encoder(&cfg).is_ok());
        assert_eq!(calls.ctls.lock().len(), cfg.ctl_sequence().len());
        assert!(logger.contains("WARN encoder setting Bitrate(16000) not applied"));
    }

    #[test]
    fn test_create_decoder_surfaces_failure() {
        let (bridge, _, logger) = mock_bridge_with(MockCodec {
            reject_create: Some(-3),
            ..Default::default()
        });
        let err = bridge.create_decoder(&DecoderConfig::new(16000, 1)).unwrap_err();
        assert_eq!(
            err,
            BridgeError::CodecRejected {
                code: -3,
                message: "mock status -3".into()
            }
        );
        assert!(logger.contains("ERROR create decoder"));
    }

    #[test]
    fn test_encode_hands_over_whole_remainder() {
        let (bridge, calls, _) = mock_bridge();
        let h = bridge.create_encoder(&EncoderConfig::new(16000, 1, 5)).unwrap();
        let mut samples = vec![0i16; 700];
        samples[100] = 7;
        let mut out = vec![0u8; 64];

        let n = bridge.encode(h, &samples, 100, &mut out).unwrap();
        assert_eq!(n, 4);
        assert_eq!(out[0], 7);
        assert_eq!(*calls.frame_sizes.lock(), vec![600]);
    }

    #[test]
    fn test_encode_stereo_frame_size_per_channel() {
        let (bridge, calls, _) = mock_bridge();
        let h = bridge.create_encoder(&EncoderConfig::new(16000, 2, 5)).unwrap();
        let samples = vec![0i16; 700];
        let mut out = vec![0u8; 64];
        bridge.encode(h, &samples, 60, &mut out).unwrap();
        assert_eq!(*calls.frame_sizes.lock(), vec![320]);
    }

    #[test]
    fn test_encode_short_remainder_never_reaches_codec() {
        let (bridge, calls, _) = mock_bridge();
        let h = bridge.create_encoder(&EncoderConfig::new(16000, 1, 5)).unwrap();
        let mut out = vec![0u8; 64];

        let err = bridge.encode(h, &vec![0i16; 319], 0, &mut out).unwrap_err();
        assert_eq!(
            err,
            BridgeError::BufferTooSmall {
                needed: 320,
                available: 319
            }
        );
        assert!(bridge.encode(h, &vec![0i16; 400], 81, &mut out).is_err());
        assert!(bridge.encode(h, &vec![0i16; 400], 4000, &mut out).is_err());
        assert!(bridge.encode(h, &vec![0i16; 320], 0, &mut []).is_err());
        assert_eq!(calls.encode.load(Ordering::SeqCst), 0);
        assert!(out.iter().all(|&b| b == 0));

        bridge.destroy_encoder(h).unwrap();
        assert!(bridge.encode(h, &vec![0i16; 100], 0, &mut out).is_err());
        assert_eq!(calls.encode.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_encode_codec_error_passes_through() {
        let (bridge, _, _) = mock_bridge_with(MockCodec {
            reject_run: Some(-2),
            ..Default::default()
        });
        let h = bridge.create_encoder(&EncoderConfig::new(16000, 1, 5)).unwrap();
        let err = bridge.encode(h, &vec![0i16; 320], 0, &mut [0u8; 8]).unwrap_err();
        assert_eq!(err.codec_code(), Some(-2));
    }

    #[test]
    fn test_decode_preconditions() {
        let (bridge, calls, _) = mock_bridge();
        let h = bridge.create_decoder(&DecoderConfig::new(16000, 2)).unwrap();

        let err = bridge.decode(h, &[], &mut [0i16; 320]).unwrap_err();
        assert!(matches!(err, BridgeError::BufferTooSmall { .. }));
        let err = bridge.decode(h, &[1, 2], &mut []).unwrap_err();
        assert!(matches!(err, BridgeError::BufferTooSmall { .. }));
        // A single sample cannot hold one stereo frame.
        let err = bridge.decode(h, &[1, 2], &mut [0i16; 1]).unwrap_err();
        assert_eq!(
            err,
            BridgeError::BufferTooSmall {
                needed: 2,
                available: 1
            }
        );
        assert_eq!(calls.decode.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_decode_and_conceal() {
        let (bridge, calls, _) = mock_bridge();
        let h = bridge.create_decoder(&DecoderConfig::new(16000, 2)).unwrap();
        let mut out = vec![0i16; 640];

        assert_eq!(bridge.decode(h, &[1, 2, 3], &mut out).unwrap(), 320);
        assert!(out.iter().all(|&s| s == 3));

        assert_eq!(bridge.conceal(h, &mut out).unwrap(), 320);
        assert!(out.iter().all(|&s| s == 0));
        assert_eq!(calls.decode.load(Ordering::SeqCst), 2);
        assert_eq!(*calls.frame_sizes.lock(), vec![320, 320]);
    }

    #[test]
    fn test_destroy_exactly_once() {
        let (bridge, calls, logger) = mock_bridge();
        let e = bridge.create_encoder(&EncoderConfig::new(16000, 1, 5)).unwrap();
        let d = bridge.create_decoder(&DecoderConfig::new(16000, 1)).unwrap();

        bridge.destroy_encoder(e).unwrap();
        bridge.destroy_decoder(d).unwrap();
        assert_eq!(calls.destroy_encoder.load(Ordering::SeqCst), 1);
        assert_eq!(calls.destroy_decoder.load(Ordering::SeqCst), 1);

        assert_eq!(
            bridge.destroy_encoder(e).unwrap_err(),
            BridgeError::InvalidHandle(e.to_raw())
        );
        assert!(bridge.destroy_decoder(d).is_err());
        assert_eq!(calls.destroy_encoder.load(Ordering::SeqCst), 1);
        assert_eq!(calls.destroy_decoder.load(Ordering::SeqCst), 1);
        assert!(logger.contains("ERROR destroy encoder"));

        assert!(bridge.encoder_config(e).is_err());
        assert!(bridge.decoder_config(d).is_err());
        assert!(bridge.decode(d, &[1], &mut [0i16; 10]).is_err());
        assert_eq!(calls.decode.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drop_releases_leftovers() {
        let (bridge, calls, _) = mock_bridge();
        for _ in 0..3 {
            bridge.create_encoder(&EncoderConfig::new(8000, 1, 0)).unwrap();
        }
        let d = bridge.create_decoder(&DecoderConfig::new(8000, 1)).unwrap();
        assert_eq!(bridge.decoder_config(d).unwrap(), DecoderConfig::new(8000, 1));
        drop(bridge);
        assert_eq!(calls.destroy_encoder.load(Ordering::SeqCst), 3);
        assert_eq!(calls.destroy_decoder.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sequence_is_configurable() {
        let (bridge, calls, _) = mock_bridge();
        let cfg = EncoderConfig::new(24000, 2, 3).with_bitrate(40000);
        bridge.create_encoder(&cfg).unwrap();
        assert!(calls.ctls.lock().contains(&EncoderCtl::Bitrate(40000)));
        assert!(calls.ctls.lock().contains(&EncoderCtl::ForceChannels(2)));
    }
}

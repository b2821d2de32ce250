//! Handle-based bridge exposing libopus to foreign runtimes.
//!
//! A caller in another runtime (a VM, a scripting host, anything that speaks
//! the C ABI) creates encoder and decoder instances, receives opaque
//! handles, and drives encode/decode calls over its own sample and byte
//! arrays. This crate owns the instances behind those handles and makes the
//! contract safe on the native side:
//!
//! - `bridge`: typed API ([`Bridge`]) returning [`BridgeError`]
//! - `compat`: the `i64` handle / integer result contract ([`LegacyBridge`])
//! - `capi`: `extern "C"` symbols over a process-wide [`LegacyBridge`]
//! - `config`: creation parameters and the encoder configuration sequence
//! - `packet`: TOC inspection of encoded packets
//!
//! # Example
//!
//! ```no_run
//! use giztoy_opusbridge::{Bridge, DecoderConfig, EncoderConfig};
//!
//! let bridge = Bridge::new();
//! let enc = bridge.create_encoder(&EncoderConfig::new(16000, 1, 5))?;
//! let dec = bridge.create_decoder(&DecoderConfig::new(16000, 1))?;
//!
//! let pcm = vec![0i16; 320]; // 20ms at 16kHz
//! let mut packet = vec![0u8; 1500];
//! let n = bridge.encode(enc, &pcm, 0, &mut packet)?;
//!
//! let mut out = vec![0i16; 320];
//! let samples = bridge.decode(dec, &packet[..n], &mut out)?;
//! assert_eq!(samples, 320);
//!
//! bridge.destroy_encoder(enc)?;
//! bridge.destroy_decoder(dec)?;
//! # Ok::<(), giztoy_opusbridge::BridgeError>(())
//! ```
//!
//! # Thread Safety
//!
//! [`Bridge`] is `Send + Sync`. Distinct handles may be used from different
//! threads concurrently; calls on the same handle are serialized.

pub mod bridge;
pub mod buffer;
pub mod capi;
pub mod codec;
pub mod compat;
pub mod config;
mod decoder;
mod encoder;
mod error;
mod ffi;
mod handle;
pub mod logger;
pub mod packet;

pub use bridge::{Bridge, MIN_FRAME_SAMPLES};
pub use buffer::{CallerArray, Pinned, RawArray};
pub use codec::{Codec, LibOpus};
pub use compat::{EMPTY_BUFFER, LegacyBridge, NO_INSTANCE};
pub use config::{Application, Bandwidth, DecoderConfig, EncoderConfig, EncoderCtl, FrameDuration, Signal};
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use error::BridgeError;
pub use handle::{DecoderHandle, EncoderHandle};
pub use logger::{Logger, NopLogger, default_logger};
pub use packet::{Mode, PacketInfo, inspect_packet};

//! C ABI exported to the calling runtime.
//!
//! All symbols share one process-wide [`LegacyBridge`] over libopus. Arrays
//! arrive as pointer/length pairs; a null pointer is a null array. Nothing
//! unwinds across the boundary: a panic inside a call is reported as that
//! call's failure value.

use std::panic::{self, AssertUnwindSafe};

use once_cell::sync::Lazy;

use crate::buffer::RawArray;
use crate::compat::{LegacyBridge, NO_INSTANCE};

static BRIDGE: Lazy<LegacyBridge> = Lazy::new(LegacyBridge::new);

fn guarded<T>(fallback: T, f: impl FnOnce() -> T) -> T {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or(fallback)
}

/// Creates an encoder. Returns 0 on failure.
#[unsafe(no_mangle)]
pub extern "C" fn opus_bridge_create_encoder(sample_rate: i32, channels: i32, complexity: i32) -> i64 {
    guarded(NO_INSTANCE, || BRIDGE.create_encoder(sample_rate, channels, complexity))
}

/// Creates a decoder. Returns 0 on failure.
#[unsafe(no_mangle)]
pub extern "C" fn opus_bridge_create_decoder(sample_rate: i32, channels: i32) -> i64 {
    guarded(NO_INSTANCE, || BRIDGE.create_decoder(sample_rate, channels))
}

/// Encodes `samples[offset..samples_len]` into `out`.
///
/// # Safety
///
/// `samples` must be null or valid for `samples_len` reads and writes, `out`
/// must be null or valid for `out_len` reads and writes, and neither may be
/// accessed by anything else until the call returns.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn opus_bridge_encode(
    handle: i64,
    samples: *mut i16,
    samples_len: i32,
    offset: i32,
    out: *mut u8,
    out_len: i32,
) -> i32 {
    guarded(0, || {
        let mut samples = unsafe { RawArray::from_raw_parts(samples, samples_len) };
        let mut out = unsafe { RawArray::from_raw_parts(out, out_len) };
        BRIDGE.encode(handle, samples.as_mut(), offset, out.as_mut())
    })
}

/// Decodes the packet in `data` into `samples`.
///
/// # Safety
///
/// Same contract as [`opus_bridge_encode`] for both arrays.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn opus_bridge_decode(
    handle: i64,
    data: *mut u8,
    data_len: i32,
    samples: *mut i16,
    samples_len: i32,
) -> i32 {
    guarded(0, || {
        let mut data = unsafe { RawArray::from_raw_parts(data, data_len) };
        let mut samples = unsafe { RawArray::from_raw_parts(samples, samples_len) };
        BRIDGE.decode(handle, data.as_mut(), samples.as_mut())
    })
}

/// Destroys an encoder. 0 is ignored.
#[unsafe(no_mangle)]
pub extern "C" fn opus_bridge_destroy_encoder(handle: i64) {
    guarded((), || BRIDGE.destroy_encoder(handle))
}

/// Destroys a decoder. 0 is ignored.
#[unsafe(no_mangle)]
pub extern "C" fn opus_bridge_destroy_decoder(handle: i64) {
    guarded((), || BRIDGE.destroy_decoder(handle))
}

//! Generational handle table.
//!
//! Each live instance sits in a slot. A handle names the slot together with
//! the slot's generation at insertion time; removing the instance bumps the
//! generation, so stale copies of the handle stop resolving instead of
//! reaching a freed or reused instance.
//!
//! Raw layout of the `i64` a handle packs into:
//!
//! ```text
//!   bit 63     always 0 (handles are positive)
//!   bit 62     kind (0 = encoder, 1 = decoder)
//!   bits 32-61 generation (30 bits, wrapping)
//!   bits 0-31  slot index + 1 (never 0)
//! ```
//!
//! The all-zero value is never produced and stays the "no instance" sentinel.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::BridgeError;

const INDEX_BITS: u32 = 32;
const GENERATION_BITS: u32 = 30;
const GENERATION_MASK: u32 = (1 << GENERATION_BITS) - 1;
const KIND_BIT: i64 = 1 << 62;

/// Which table a handle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Encoder,
    Decoder,
}

/// Kind-agnostic packed handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(i64);

impl RawHandle {
    fn pack(kind: HandleKind, index: u32, generation: u32) -> Self {
        let kind_bit = match kind {
            HandleKind::Encoder => 0,
            HandleKind::Decoder => KIND_BIT,
        };
        let gen_bits = ((generation & GENERATION_MASK) as i64) << INDEX_BITS;
        Self(kind_bit | gen_bits | (index as i64 + 1))
    }

    /// Wraps a caller-supplied value. Returns `None` for the sentinel and
    /// for values no table could have issued.
    pub fn from_raw(raw: i64) -> Option<Self> {
        if raw <= 0 || (raw & 0xFFFF_FFFF) == 0 {
            return None;
        }
        Some(Self(raw))
    }

    pub fn to_raw(self) -> i64 {
        self.0
    }

    pub fn kind(self) -> HandleKind {
        if self.0 & KIND_BIT != 0 {
            HandleKind::Decoder
        } else {
            HandleKind::Encoder
        }
    }

    fn index(self) -> usize {
        ((self.0 & 0xFFFF_FFFF) - 1) as usize
    }

    fn generation(self) -> u32 {
        ((self.0 >> INDEX_BITS) as u32) & GENERATION_MASK
    }
}

impl fmt::Debug for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RawHandle({:?}#{}@{})",
            self.kind(),
            self.index(),
            self.generation()
        )
    }
}

macro_rules! typed_handle {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(RawHandle);

        impl $name {
            /// Interprets a caller-supplied integer as this kind of handle.
            pub fn from_raw(raw: i64) -> Option<Self> {
                RawHandle::from_raw(raw)
                    .filter(|h| h.kind() == $kind)
                    .map(Self)
            }

            /// Returns the integer handed across the boundary.
            pub fn to_raw(self) -> i64 {
                self.0.to_raw()
            }

            pub(crate) fn raw(self) -> RawHandle {
                self.0
            }
        }
    };
}

typed_handle!(
    /// Handle to a live encoder instance.
    EncoderHandle,
    HandleKind::Encoder
);

typed_handle!(
    /// Handle to a live decoder instance.
    DecoderHandle,
    HandleKind::Decoder
);

impl From<RawHandle> for EncoderHandle {
    fn from(h: RawHandle) -> Self {
        debug_assert_eq!(h.kind(), HandleKind::Encoder);
        Self(h)
    }
}

impl From<RawHandle> for DecoderHandle {
    fn from(h: RawHandle) -> Self {
        debug_assert_eq!(h.kind(), HandleKind::Decoder);
        Self(h)
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<Arc<Mutex<T>>>,
}

struct Slots<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    live: usize,
}

/// Table of live instances of one kind.
///
/// Lookups take a read lock and clone the instance's `Arc`, so the table
/// lock is never held while an instance is in use. Each instance is behind
/// its own mutex: calls on distinct handles run in parallel, calls on the
/// same handle are serialized.
pub struct HandleTable<T> {
    kind: HandleKind,
    inner: RwLock<Slots<T>>,
}

impl<T> HandleTable<T> {
    pub fn new(kind: HandleKind) -> Self {
        Self {
            kind,
            inner: RwLock::new(Slots {
                slots: Vec::new(),
                free: Vec::new(),
                live: 0,
            }),
        }
    }

    /// Stores a value and returns its handle.
    pub fn insert(&self, value: T) -> RawHandle {
        let mut inner = self.inner.write();
        let value = Some(Arc::new(Mutex::new(value)));
        let index = match inner.free.pop() {
            Some(index) => {
                inner.slots[index].value = value;
                index
            }
            None => {
                inner.slots.push(Slot {
                    generation: 0,
                    value,
                });
                inner.slots.len() - 1
            }
        };
        inner.live += 1;
        RawHandle::pack(self.kind, index as u32, inner.slots[index].generation)
    }

    /// Resolves a handle to its instance.
    pub fn get(&self, handle: RawHandle) -> Result<Arc<Mutex<T>>, BridgeError> {
        let inner = self.inner.read();
        self.slot(&inner.slots, handle)
            .and_then(|slot| slot.value.clone())
            .ok_or(BridgeError::InvalidHandle(handle.to_raw()))
    }

    /// Removes an instance and invalidates every copy of its handle.
    ///
    /// The instance is dropped once the last in-flight user releases it.
    pub fn remove(&self, handle: RawHandle) -> Result<Arc<Mutex<T>>, BridgeError> {
        let mut inner = self.inner.write();
        let index = match self.slot(&inner.slots, handle) {
            Some(slot) if slot.value.is_some() => handle.index(),
            _ => return Err(BridgeError::InvalidHandle(handle.to_raw())),
        };
        let slot = &mut inner.slots[index];
        let value = slot.value.take();
        slot.generation = slot.generation.wrapping_add(1) & GENERATION_MASK;
        inner.free.push(index);
        inner.live -= 1;
        value.ok_or(BridgeError::InvalidHandle(handle.to_raw()))
    }

    /// Removes every live instance.
    pub fn drain(&self) -> Vec<Arc<Mutex<T>>> {
        let mut inner = self.inner.write();
        let mut drained = Vec::with_capacity(inner.live);
        let mut freed = Vec::new();
        for (index, slot) in inner.slots.iter_mut().enumerate() {
            if let Some(value) = slot.value.take() {
                slot.generation = slot.generation.wrapping_add(1) & GENERATION_MASK;
                drained.push(value);
                freed.push(index);
            }
        }
        inner.free.extend(freed);
        inner.live = 0;
        drained
    }

    /// Number of live instances.
    pub fn len(&self) -> usize {
        self.inner.read().live
    }

    fn slot<'a>(&self, slots: &'a [Slot<T>], handle: RawHandle) -> Option<&'a Slot<T>> {
        if handle.kind() != self.kind {
            return None;
        }
        slots
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let table = HandleTable::new(HandleKind::Encoder);
        let h = table.insert(42u32);
        assert!(h.to_raw() > 0);
        assert_eq!(*table.get(h).unwrap().lock(), 42);
        assert_eq!(table.len(), 1);

        let removed = table.remove(h).unwrap();
        assert_eq!(*removed.lock(), 42);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_stale_handle_rejected() {
        let table = HandleTable::new(HandleKind::Encoder);
        let h = table.insert("a");
        table.remove(h).unwrap();

        assert_eq!(table.get(h).unwrap_err(), BridgeError::InvalidHandle(h.to_raw()));
        assert!(table.remove(h).is_err());

        // The slot is reused under a new generation.
        let h2 = table.insert("b");
        assert_ne!(h, h2);
        assert!(table.get(h).is_err());
        assert_eq!(*table.get(h2).unwrap().lock(), "b");
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let encoders = HandleTable::new(HandleKind::Encoder);
        let decoders = HandleTable::new(HandleKind::Decoder);
        let he = encoders.insert(1);
        let hd = decoders.insert(2);

        assert_eq!(he.kind(), HandleKind::Encoder);
        assert_eq!(hd.kind(), HandleKind::Decoder);
        assert_ne!(he.to_raw(), hd.to_raw());
        assert!(decoders.get(he).is_err());
        assert!(encoders.get(hd).is_err());

        assert!(EncoderHandle::from_raw(hd.to_raw()).is_none());
        assert!(DecoderHandle::from_raw(hd.to_raw()).is_some());
    }

    #[test]
    fn test_sentinel_and_forged_values() {
        assert!(RawHandle::from_raw(0).is_none());
        assert!(RawHandle::from_raw(-5).is_none());
        // Index bits of zero can never be issued.
        assert!(RawHandle::from_raw(1 << 32).is_none());

        let table: HandleTable<u8> = HandleTable::new(HandleKind::Encoder);
        let forged = RawHandle::from_raw(999).unwrap();
        assert!(table.get(forged).is_err());
    }

    #[test]
    fn test_round_trip_through_i64() {
        let table = HandleTable::new(HandleKind::Decoder);
        let h = table.insert(());
        let typed = DecoderHandle::from_raw(h.to_raw()).unwrap();
        assert_eq!(typed.raw(), h);
        assert_eq!(DecoderHandle::from(h), typed);
    }

    #[test]
    fn test_drain() {
        let table = HandleTable::new(HandleKind::Encoder);
        let a = table.insert(1);
        let b = table.insert(2);
        table.remove(a).unwrap();
        let c = table.insert(3);

        let drained = table.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(table.len(), 0);
        assert!(table.get(b).is_err());
        assert!(table.get(c).is_err());
    }

    #[test]
    fn test_in_flight_reference_outlives_remove() {
        let table = HandleTable::new(HandleKind::Encoder);
        let h = table.insert(vec![1, 2, 3]);
        let in_flight = table.get(h).unwrap();
        table.remove(h).unwrap();
        assert_eq!(in_flight.lock().len(), 3);
        assert_eq!(Arc::strong_count(&in_flight), 1);
    }
}

//! Scoped access to caller-owned arrays.
//!
//! A foreign runtime usually hands over arrays that must be pinned (or
//! copied) before native code may touch them, and released afterwards. The
//! bridge models that as [`CallerArray::acquire`], which returns a guard;
//! releasing happens in the guard's `Drop`, so every exit path of a call
//! releases exactly what it acquired.

use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

/// An array owned by the caller that the bridge may borrow for one call.
pub trait CallerArray<T> {
    /// Guard granting direct access to the elements until dropped.
    type Elements<'a>: DerefMut<Target = [T]>
    where
        Self: 'a;

    /// Number of elements.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Acquires direct access to the elements.
    fn acquire(&mut self) -> Self::Elements<'_>;
}

impl<T> CallerArray<T> for [T] {
    type Elements<'a>
        = &'a mut [T]
    where
        Self: 'a;

    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn acquire(&mut self) -> &mut [T] {
        self
    }
}

impl<T> CallerArray<T> for Vec<T> {
    type Elements<'a>
        = &'a mut [T]
    where
        Self: 'a;

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn acquire(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

/// A pointer/length pair received over the C ABI.
pub struct RawArray<T> {
    ptr: NonNull<T>,
    len: usize,
}

impl<T> RawArray<T> {
    /// Wraps a caller array. Returns `None` for a null pointer, which stands
    /// for a null array on the caller side. A negative length is treated as
    /// empty.
    ///
    /// # Safety
    ///
    /// For the lifetime of the returned value `ptr` must point to `len`
    /// initialized, properly aligned elements that nothing else accesses.
    pub unsafe fn from_raw_parts(ptr: *mut T, len: i32) -> Option<Self> {
        let ptr = NonNull::new(ptr)?;
        Some(Self {
            ptr,
            len: usize::try_from(len).unwrap_or(0),
        })
    }
}

impl<T> CallerArray<T> for RawArray<T> {
    type Elements<'a>
        = &'a mut [T]
    where
        Self: 'a;

    fn len(&self) -> usize {
        self.len
    }

    fn acquire(&mut self) -> &mut [T] {
        // Validity was promised by the caller of `from_raw_parts`.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

/// Elements guard that reports its release.
///
/// Used by runtimes whose arrays need an explicit release call, and by the
/// tests to check that every acquisition is paired with a release.
pub struct Pinned<'a, T> {
    elements: &'a mut [T],
    on_release: Option<Box<dyn FnOnce() + 'a>>,
}

impl<'a, T> Pinned<'a, T> {
    pub fn new(elements: &'a mut [T], on_release: impl FnOnce() + 'a) -> Self {
        Self {
            elements,
            on_release: Some(Box::new(on_release)),
        }
    }
}

impl<T> Deref for Pinned<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &*self.elements
    }
}

impl<T> DerefMut for Pinned<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut *self.elements
    }
}

impl<T> Drop for Pinned<'_, T> {
    fn drop(&mut self) {
        if let Some(release) = self.on_release.take() {
            release();
        }
    }
}

//! Header-less copies of a vector's elements.
//!
//! [`PlainBuffer`] is an ordinary contiguous allocation with no metadata
//! prefix, produced by [`VailedVec::normal_copy`](crate::VailedVec::normal_copy).
//! It cannot grow and has no relationship to the block it was copied from.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};
use std::slice;

use vailed_core::{Allocator, VecError};

/// A fixed-size, header-less buffer of `T` owned through `allocator`.
///
/// An empty buffer holds no allocation at all, so an empty copy is never
/// confused with a failed one.
pub struct PlainBuffer<'b, T, B: Allocator + ?Sized> {
    ptr: NonNull<T>,
    len: usize,
    capacity: usize,
    allocator: &'b B,
    _marker: PhantomData<T>,
}

impl<'b, T, B: Allocator + ?Sized> PlainBuffer<'b, T, B> {
    /// Clone `items` into a fresh buffer from `allocator`.
    pub fn copy_in(items: &[T], allocator: &'b B) -> Result<Self, VecError>
    where
        T: Clone,
    {
        let layout = Layout::array::<T>(items.len())
            .map_err(|_| VecError::capacity_overflow(items.len(), size_of::<T>()))?;
        let ptr = if layout.size() == 0 {
            NonNull::dangling()
        } else {
            match allocator.allocate(layout) {
                Some(ptr) => ptr.cast::<T>(),
                None => {
                    diag!("normal_copy: allocation of {} bytes failed", layout.size());
                    return Err(VecError::AllocationFailure {
                        bytes: layout.size(),
                    });
                }
            }
        };
        let mut buffer = Self {
            ptr,
            len: 0,
            capacity: items.len(),
            allocator,
            _marker: PhantomData,
        };
        for item in items {
            // SAFETY: `len < capacity` while copying; the length is bumped
            // per element so a panicking clone drops only what was written.
            unsafe { buffer.ptr.as_ptr().add(buffer.len).write(item.clone()) };
            buffer.len += 1;
        }
        Ok(buffer)
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Pointer to element 0. Dangling (but aligned) when empty.
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    /// Move the elements into a `Vec`, releasing the buffer.
    pub fn into_vec(mut self) -> Vec<T> {
        let len = self.len;
        let mut out = Vec::with_capacity(len);
        // Ownership of the elements moves to `out`.
        self.len = 0;
        // SAFETY: the `len` slots were initialized and are no longer owned
        // by `self`.
        unsafe {
            ptr::copy_nonoverlapping(self.ptr.as_ptr(), out.as_mut_ptr(), len);
            out.set_len(len);
        }
        out
    }
}

impl<T, B: Allocator + ?Sized> Drop for PlainBuffer<'_, T, B> {
    fn drop(&mut self) {
        // SAFETY: the first `len` slots are initialized.
        unsafe { ptr::drop_in_place(ptr::slice_from_raw_parts_mut(self.ptr.as_ptr(), self.len)) };
        if let Ok(layout) = Layout::array::<T>(self.capacity) {
            if layout.size() != 0 {
                // SAFETY: allocated by `self.allocator` for this layout.
                unsafe { self.allocator.release(self.ptr.cast(), layout) };
            }
        }
    }
}

impl<T, B: Allocator + ?Sized> Deref for PlainBuffer<'_, T, B> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        // SAFETY: the first `len` slots are initialized.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl<T, B: Allocator + ?Sized> DerefMut for PlainBuffer<'_, T, B> {
    fn deref_mut(&mut self) -> &mut [T] {
        // SAFETY: as in `deref`; `&mut self` is exclusive.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<T: fmt::Debug, B: Allocator + ?Sized> fmt::Debug for PlainBuffer<'_, T, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VailedVec;
    use vailed_test_utils::{FailingAllocator, TrackingAllocator};

    #[test]
    fn copy_has_no_header_and_same_elements() {
        let vec_alloc = TrackingAllocator::new();
        let copy_alloc = TrackingAllocator::new();
        let v = VailedVec::new_in(&vec_alloc)
            .unwrap()
            .push_many(&[3u64, 1, 4, 1, 5])
            .unwrap();
        let copy = v.normal_copy(&copy_alloc).unwrap();
        assert_eq!(&copy[..], &v[..]);
        assert_eq!(copy_alloc.live_bytes(), 5 * 8);
        assert!(copy_alloc.owns(copy.as_ptr().cast()));
        drop(copy);
        copy_alloc.assert_no_leaks();
    }

    #[test]
    fn empty_copy_is_not_an_error() {
        let alloc = TrackingAllocator::new();
        let copy_alloc = FailingAllocator::always();
        let v: VailedVec<'_, i32, _> = VailedVec::new_in(&alloc).unwrap();
        let copy = v.normal_copy(&copy_alloc).unwrap();
        assert!(copy.is_empty());
        assert_eq!(copy_alloc.tracker().allocations(), 0);
    }

    #[test]
    fn failed_copy_is_an_allocation_failure() {
        let alloc = TrackingAllocator::new();
        let copy_alloc = FailingAllocator::always();
        let v = VailedVec::new_in(&alloc).unwrap().push_back(1u32).unwrap();
        let err = v.normal_copy(&copy_alloc).unwrap_err();
        assert_eq!(err, VecError::AllocationFailure { bytes: 4 });
    }

    #[test]
    fn into_vec_moves_elements_out() {
        let alloc = TrackingAllocator::new();
        let v = VailedVec::new_in(&alloc)
            .unwrap()
            .push_many(&[String::from("a"), String::from("b")])
            .unwrap();
        let copy = v.normal_copy(&alloc).unwrap();
        assert_eq!(copy.into_vec(), vec!["a".to_string(), "b".to_string()]);
        drop(v);
        alloc.assert_no_leaks();
    }
}

//! The allocator capability a vector is constructed with.
//!
//! An [`Allocator`] is the triple allocate / reallocate / release. Vectors
//! store a non-owning reference to one in their header and route every
//! block operation through it, so one allocator may back any number of
//! independent vectors. Failures are reported as `None`, never by
//! panicking or aborting.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::ptr::{self, NonNull};

/// Allocate, reallocate and release raw blocks.
///
/// Implementations must hand out blocks aligned to at least `layout.align()`
/// and must tolerate being called through a shared reference.
pub trait Allocator {
    /// Allocate a block for `layout`. Returns `None` when out of memory.
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// Grow or shrink a block, preserving the first `min(old, new)` bytes.
    ///
    /// On failure returns `None` and leaves the original block untouched.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this allocator for `old` and not yet
    /// released. On success `ptr` must no longer be used.
    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old: Layout,
        new_size: usize,
    ) -> Option<NonNull<u8>>;

    /// Return a block to the allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this allocator for `layout` and not
    /// yet released.
    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout);
}

/// The process allocator behind `std::alloc`.
///
/// Used as the constructor default when no allocator is supplied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SystemAllocator;

/// Shared instance used by default-allocator constructors.
pub static SYSTEM: SystemAllocator = SystemAllocator;

fn dangling(align: usize) -> NonNull<u8> {
    // SAFETY: `Layout` alignments are never zero.
    unsafe { NonNull::new_unchecked(ptr::without_provenance_mut(align)) }
}

impl Allocator for SystemAllocator {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        if layout.size() == 0 {
            return Some(dangling(layout.align()));
        }
        // SAFETY: size is non-zero.
        NonNull::new(unsafe { std::alloc::alloc(layout) })
    }

    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old: Layout,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        let new = Layout::from_size_align(new_size, old.align()).ok()?;
        if old.size() == 0 {
            return self.allocate(new);
        }
        if new_size == 0 {
            // SAFETY: forwarded caller contract.
            unsafe { self.release(ptr, old) };
            return Some(dangling(old.align()));
        }
        // SAFETY: caller guarantees `ptr`/`old` came from us; `new` was
        // validated above and is non-zero.
        NonNull::new(unsafe { std::alloc::realloc(ptr.as_ptr(), old, new_size) })
    }

    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() != 0 {
            // SAFETY: caller guarantees `ptr`/`layout` came from us.
            unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) }
        }
    }
}

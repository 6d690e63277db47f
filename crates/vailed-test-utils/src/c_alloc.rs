//! `extern "C"` malloc / realloc / free shims.
//!
//! Each block carries a 16-byte prefix recording its size, since `free`
//! receives no layout. Live blocks are counted per thread, so tests running
//! in parallel do not see each other's traffic.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::cell::Cell;
use std::ffi::c_void;
use std::ptr::{self, NonNull};

use vailed_core::alloc::SYSTEM;
use vailed_core::Allocator;

const PREFIX: usize = 16;

thread_local! {
    static LIVE: Cell<usize> = const { Cell::new(0) };
}

/// Blocks allocated by the shims on this thread and not yet freed.
pub fn c_live_blocks() -> usize {
    LIVE.with(Cell::get)
}

fn block_layout(size: usize) -> Option<Layout> {
    Layout::from_size_align(size.checked_add(PREFIX)?, PREFIX).ok()
}

unsafe fn user_ptr(base: NonNull<u8>, size: usize) -> *mut c_void {
    // SAFETY: every block is at least PREFIX bytes and PREFIX-aligned.
    unsafe {
        base.cast::<usize>().write(size);
        base.as_ptr().add(PREFIX).cast()
    }
}

unsafe fn split(ptr: *mut c_void) -> (NonNull<u8>, Layout) {
    // SAFETY: `ptr` came from `user_ptr`, so the prefix holds its size.
    unsafe {
        let base = NonNull::new_unchecked(ptr.cast::<u8>().sub(PREFIX));
        let size = base.cast::<usize>().read();
        (base, Layout::from_size_align_unchecked(size + PREFIX, PREFIX))
    }
}

/// `malloc`. Returns null when out of memory.
///
/// # Safety
///
/// Always safe to call; `unsafe` to match C function pointer slots.
pub unsafe extern "C" fn c_malloc(size: usize) -> *mut c_void {
    let Some(layout) = block_layout(size) else {
        return ptr::null_mut();
    };
    match SYSTEM.allocate(layout) {
        Some(base) => {
            LIVE.with(|n| n.set(n.get() + 1));
            // SAFETY: fresh block of `size + PREFIX` bytes.
            unsafe { user_ptr(base, size) }
        }
        None => ptr::null_mut(),
    }
}

/// `realloc`. A null `ptr` behaves like [`c_malloc`].
///
/// # Safety
///
/// `ptr` must be null or a live block from these shims.
pub unsafe extern "C" fn c_realloc(ptr: *mut c_void, size: usize) -> *mut c_void {
    if ptr.is_null() {
        // SAFETY: see `c_malloc`.
        return unsafe { c_malloc(size) };
    }
    if block_layout(size).is_none() {
        return ptr::null_mut();
    }
    // SAFETY: caller contract.
    let (base, old) = unsafe { split(ptr) };
    // SAFETY: `base`/`old` describe a live SYSTEM block.
    match unsafe { SYSTEM.reallocate(base, old, size + PREFIX) } {
        // SAFETY: the moved block is `size + PREFIX` bytes.
        Some(moved) => unsafe { user_ptr(moved, size) },
        None => ptr::null_mut(),
    }
}

/// `free`. A null `ptr` is ignored.
///
/// # Safety
///
/// `ptr` must be null or a live block from these shims.
pub unsafe extern "C" fn c_free(ptr: *mut c_void) {
    if ptr.is_null() {
        return;
    }
    // SAFETY: caller contract.
    let (base, layout) = unsafe { split(ptr) };
    LIVE.with(|n| n.set(n.get() - 1));
    // SAFETY: `base`/`layout` describe a live SYSTEM block.
    unsafe { SYSTEM.release(base, layout) }
}

/// A `realloc` that is always out of memory.
///
/// # Safety
///
/// Always safe to call.
pub unsafe extern "C" fn c_failing_realloc(_ptr: *mut c_void, _size: usize) -> *mut c_void {
    ptr::null_mut()
}

/// A `malloc` that is always out of memory.
///
/// # Safety
///
/// Always safe to call.
pub unsafe extern "C" fn c_failing_malloc(_size: usize) -> *mut c_void {
    ptr::null_mut()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malloc_free_balances_the_counter() {
        unsafe {
            let p = c_malloc(24);
            assert!(!p.is_null());
            assert_eq!(p as usize % PREFIX, 0);
            assert_eq!(c_live_blocks(), 1);
            c_free(p);
        }
        assert_eq!(c_live_blocks(), 0);
    }

    #[test]
    fn realloc_keeps_contents() {
        unsafe {
            let p = c_malloc(4).cast::<u32>();
            p.write(0xdead_beef);
            let q = c_realloc(p.cast(), 4096).cast::<u32>();
            assert_eq!(q.read(), 0xdead_beef);
            assert_eq!(c_live_blocks(), 1);
            c_free(q.cast());
        }
        assert_eq!(c_live_blocks(), 0);
    }

    #[test]
    fn failing_shims_return_null() {
        unsafe {
            assert!(c_failing_malloc(8).is_null());
            assert!(c_failing_realloc(ptr::null_mut(), 8).is_null());
        }
    }
}

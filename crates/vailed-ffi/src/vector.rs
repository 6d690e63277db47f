//! Vector lifecycle and mutation FFI.
//!
//! A handle is the element pointer returned by [`vailed_init`]. Queries and
//! in-place mutations take it as `void*`; operations that may reallocate
//! take `void**` and store the moved pointer back only on success.
//!
//! Item and output pointers must address `element_size` readable or
//! writable bytes and must not point into the vector being modified.

use std::alloc::Layout;
use std::ffi::c_void;
use std::ptr::{self, NonNull};

use vailed::raw::Relocated;
use vailed::{RawVailed, Retained};
use vailed_core::VecError;

use crate::status::VailedStatus;
use crate::types::{MallocFn, VailedAllocator, MALLOC_ALIGN};

type Raw = RawVailed<VailedAllocator>;

/// Alignment recorded for every element created through the C surface.
///
/// Matches `malloc`, so the prefix before element 0 is always a multiple of
/// 16 bytes.
pub const FFI_ELEMENT_ALIGN: usize = MALLOC_ALIGN;

/// Rebuild a handle from a C vector pointer. `None` for NULL.
///
/// # Safety
///
/// A non-null `v` must come from [`vailed_init`] (or a later relocating
/// call) and must not have been freed.
#[allow(unsafe_code)]
unsafe fn handle(v: *mut c_void) -> Option<Raw> {
    // SAFETY: caller contract.
    NonNull::new(v.cast::<u8>()).map(|p| unsafe { Raw::from_raw(p) })
}

/// Run a relocating operation against `*v`, storing the new pointer back on
/// success.
///
/// # Safety
///
/// `v` must be null or point to a pointer accepted by [`handle`].
#[allow(unsafe_code)]
unsafe fn relocate(v: *mut *mut c_void, op: impl FnOnce(Raw) -> Relocated<VailedAllocator>) -> i32 {
    if v.is_null() {
        return VailedStatus::InvalidArgument as i32;
    }
    // SAFETY: `v` is non-null and readable (caller contract).
    let Some(raw) = (unsafe { handle(*v) }) else {
        return VailedStatus::InvalidArgument as i32;
    };
    match op(raw) {
        Ok(raw) => {
            // SAFETY: `v` is writable (caller contract).
            unsafe { *v = raw.into_raw().as_ptr().cast() };
            VailedStatus::Ok as i32
        }
        Err(retained) => VailedStatus::from(retained.error()) as i32,
    }
}

/// Bump the length after writing `count` new elements.
fn commit(mut raw: Raw, count: usize) -> Relocated<VailedAllocator> {
    let length = raw.len() + count;
    match raw.set_len(length) {
        Ok(()) => Ok(raw),
        Err(e) => Err(Retained::new(raw, e)),
    }
}

/// Create an empty vector of `capacity` elements of `element_size` bytes.
///
/// Returns NULL if `allocator` is null or incomplete, the size overflows,
/// or allocation fails. The allocator struct must outlive the vector.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn vailed_init(
    element_size: usize,
    capacity: usize,
    allocator: *const VailedAllocator,
) -> *mut c_void {
    ffi_guard_or!(ptr::null_mut(), {
        // SAFETY: a non-null allocator points at a live triple (caller
        // contract).
        let Some(alloc) = (unsafe { allocator.as_ref() }) else {
            return ptr::null_mut();
        };
        if !alloc.is_complete() {
            return ptr::null_mut();
        }
        let Ok(element) = Layout::from_size_align(element_size, FFI_ELEMENT_ALIGN) else {
            return ptr::null_mut();
        };
        // SAFETY: the caller keeps `allocator` alive for the vector's life.
        match unsafe { Raw::init(element, capacity, alloc) } {
            Ok(raw) => raw.into_raw().as_ptr().cast(),
            Err(_) => ptr::null_mut(),
        }
    })
}

/// Release a vector through its allocator's `free`.
///
/// Element contents are not inspected; free nested vectors first.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn vailed_free(v: *mut c_void) -> i32 {
    ffi_guard!({
        // SAFETY: caller contract on `v`.
        let Some(raw) = (unsafe { handle(v) }) else {
            return VailedStatus::InvalidArgument as i32;
        };
        // SAFETY: a non-null allocator in the header is live (init contract).
        let complete = unsafe { raw.header().allocator.as_ref() }.is_some_and(|a| a.free.is_some());
        if !complete {
            return VailedStatus::InvalidArgument as i32;
        }
        VailedStatus::from(raw.release()) as i32
    })
}

/// 1 if one more element fits without growing, otherwise 0 (also for NULL).
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn vailed_can_append(v: *mut c_void) -> i32 {
    ffi_guard_or!(0, {
        // SAFETY: caller contract on `v`.
        match unsafe { handle(v) } {
            Some(raw) => i32::from(raw.can_append()),
            None => 0,
        }
    })
}

/// `VAILED_STATUS_OK` if one more element fits without growing,
/// `VAILED_STATUS_FULL` if it does not.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn vailed_check_room(v: *mut c_void) -> i32 {
    ffi_guard!({
        // SAFETY: caller contract on `v`.
        match unsafe { handle(v) } {
            Some(raw) => VailedStatus::from(raw.check_room()) as i32,
            None => VailedStatus::InvalidArgument as i32,
        }
    })
}

/// Write the capacity to `out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn vailed_get_cap(v: *mut c_void, out: *mut usize) -> i32 {
    ffi_guard!({
        // SAFETY: caller contract on `v`.
        let Some(raw) = (unsafe { handle(v) }) else {
            return VailedStatus::InvalidArgument as i32;
        };
        if out.is_null() {
            return VailedStatus::InvalidArgument as i32;
        }
        // SAFETY: out is valid per caller contract.
        unsafe { *out = raw.capacity() };
        VailedStatus::Ok as i32
    })
}

/// Write the length to `out`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn vailed_get_len(v: *mut c_void, out: *mut usize) -> i32 {
    ffi_guard!({
        // SAFETY: caller contract on `v`.
        let Some(raw) = (unsafe { handle(v) }) else {
            return VailedStatus::InvalidArgument as i32;
        };
        if out.is_null() {
            return VailedStatus::InvalidArgument as i32;
        }
        // SAFETY: out is valid per caller contract.
        unsafe { *out = raw.len() };
        VailedStatus::Ok as i32
    })
}

/// Set the length without touching element bytes. Lengths above capacity
/// are rejected.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn vailed_set_len(v: *mut c_void, length: usize) -> i32 {
    ffi_guard!({
        // SAFETY: caller contract on `v`.
        let Some(mut raw) = (unsafe { handle(v) }) else {
            return VailedStatus::InvalidArgument as i32;
        };
        VailedStatus::from(raw.set_len(length)) as i32
    })
}

/// Reallocate `*v` to hold exactly `capacity` elements.
///
/// A capacity below the length is rejected with `InvalidArgument`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn vailed_resize(v: *mut *mut c_void, capacity: usize) -> i32 {
    ffi_guard!({
        // SAFETY: caller contract on `v`.
        unsafe { relocate(v, |raw| raw.resize(capacity)) }
    })
}

/// Reallocate `*v` so that capacity equals length.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn vailed_shrink_to_fit(v: *mut *mut c_void) -> i32 {
    ffi_guard!({
        // SAFETY: caller contract on `v`.
        unsafe { relocate(v, |raw| raw.shrink_to_fit()) }
    })
}

/// Append the element at `item`, growing when full.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn vailed_push_back(v: *mut *mut c_void, item: *const c_void) -> i32 {
    ffi_guard!({
        if item.is_null() {
            return VailedStatus::InvalidArgument as i32;
        }
        // SAFETY: caller contract on `v`.
        unsafe {
            relocate(v, |raw| {
                let raw = raw.reserve_one()?;
                // SAFETY: slot `len` is free after `reserve_one`; `item`
                // holds one element and does not overlap the block.
                ptr::copy_nonoverlapping(item.cast::<u8>(), raw.slot(raw.len()), raw.element_size());
                commit(raw, 1)
            })
        }
    })
}

/// Append `count` contiguous elements from `data`, growing at most once.
///
/// `data` may be null only when `count` is 0.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn vailed_push_all(v: *mut *mut c_void, data: *const c_void, count: usize) -> i32 {
    ffi_guard!({
        if data.is_null() && count > 0 {
            return VailedStatus::InvalidArgument as i32;
        }
        // SAFETY: caller contract on `v`.
        unsafe {
            relocate(v, |raw| {
                let raw = raw.reserve(count)?;
                // `reserve` already proved `len + count` fits in memory.
                let bytes = count * raw.element_size();
                if bytes > 0 {
                    // SAFETY: `count` free slots follow `len`; `data` holds
                    // `count` elements and does not overlap the block.
                    ptr::copy_nonoverlapping(data.cast::<u8>(), raw.slot(raw.len()), bytes);
                }
                commit(raw, count)
            })
        }
    })
}

/// Insert the element at `item` before `index`, shifting the tail right.
///
/// `index == len` appends; `index > len` fails with `IndexOutOfBounds` and
/// changes nothing.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn vailed_insert(v: *mut *mut c_void, index: usize, item: *const c_void) -> i32 {
    ffi_guard!({
        if item.is_null() {
            return VailedStatus::InvalidArgument as i32;
        }
        // SAFETY: caller contract on `v`.
        unsafe {
            relocate(v, |raw| {
                let length = raw.len();
                if index > length {
                    return Err(Retained::new(
                        raw,
                        VecError::IndexOutOfBounds { index, length },
                    ));
                }
                let mut raw = raw.reserve_one()?;
                // SAFETY: `index <= len < capacity`; the gap is filled from
                // `item` right away.
                raw.open_gap(index);
                ptr::copy_nonoverlapping(item.cast::<u8>(), raw.slot(index), raw.element_size());
                Ok(raw)
            })
        }
    })
}

/// Remove the last element, copying it to `out` unless `out` is NULL.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn vailed_pop_back(v: *mut c_void, out: *mut c_void) -> i32 {
    ffi_guard!({
        // SAFETY: caller contract on `v`.
        let Some(mut raw) = (unsafe { handle(v) }) else {
            return VailedStatus::InvalidArgument as i32;
        };
        let length = raw.len();
        if length == 0 {
            return VailedStatus::Empty as i32;
        }
        if !out.is_null() {
            // SAFETY: slot `length - 1` is initialized; `out` holds one
            // element.
            unsafe { ptr::copy_nonoverlapping(raw.slot(length - 1), out.cast::<u8>(), raw.element_size()) };
        }
        VailedStatus::from(raw.set_len(length - 1)) as i32
    })
}

/// Shared body of the two index removals.
///
/// # Safety
///
/// `v` and `out` follow the contracts of [`vailed_remove`].
#[allow(unsafe_code)]
unsafe fn remove_with(v: *mut c_void, index: usize, out: *mut c_void, close: unsafe fn(&mut Raw, usize)) -> i32 {
    // SAFETY: caller contract on `v`.
    let Some(mut raw) = (unsafe { handle(v) }) else {
        return VailedStatus::InvalidArgument as i32;
    };
    let length = raw.len();
    if index >= length {
        return VailedStatus::from(&VecError::IndexOutOfBounds { index, length }) as i32;
    }
    // SAFETY: `index < len`; `out` holds one element.
    unsafe {
        if !out.is_null() {
            ptr::copy_nonoverlapping(raw.slot(index), out.cast::<u8>(), raw.element_size());
        }
        close(&mut raw, index);
    }
    VailedStatus::Ok as i32
}

/// Remove the element at `index` by moving the last element into its slot.
/// O(1); does not preserve order. The removed element is copied to `out`
/// unless `out` is NULL.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn vailed_remove(v: *mut c_void, index: usize, out: *mut c_void) -> i32 {
    ffi_guard!({
        // SAFETY: caller contract.
        unsafe { remove_with(v, index, out, Raw::swap_out) }
    })
}

/// Remove the element at `index`, shifting the tail left. O(n); preserves
/// order. The removed element is copied to `out` unless `out` is NULL.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn vailed_remove_ordered(v: *mut c_void, index: usize, out: *mut c_void) -> i32 {
    ffi_guard!({
        // SAFETY: caller contract.
        unsafe { remove_with(v, index, out, Raw::close_gap) }
    })
}

/// Copy the elements into a plain block from `malloc_fn`, without header.
///
/// An empty vector stores NULL in `*out` and returns `Ok`; a failed
/// allocation returns `AllocationFailed`. The caller frees the block with
/// the matching `free`.
#[no_mangle]
#[allow(unsafe_code)]
pub extern "C" fn vailed_normal_copy(
    v: *mut c_void,
    malloc_fn: Option<MallocFn>,
    out: *mut *mut c_void,
) -> i32 {
    ffi_guard!({
        // SAFETY: caller contract on `v`.
        let Some(raw) = (unsafe { handle(v) }) else {
            return VailedStatus::InvalidArgument as i32;
        };
        let Some(malloc) = malloc_fn else {
            return VailedStatus::InvalidArgument as i32;
        };
        if out.is_null() {
            return VailedStatus::InvalidArgument as i32;
        }
        // Cannot overflow: the bytes already live inside the block.
        let bytes = raw.len() * raw.element_size();
        if bytes == 0 {
            // SAFETY: out is valid per caller contract.
            unsafe { *out = ptr::null_mut() };
            return VailedStatus::Ok as i32;
        }
        // SAFETY: the caller supplied a malloc-compatible function.
        let block = unsafe { malloc(bytes) };
        if block.is_null() {
            return VailedStatus::AllocationFailed as i32;
        }
        // SAFETY: `block` holds `bytes` fresh bytes; the source is the
        // initialized prefix of the vector.
        unsafe {
            ptr::copy_nonoverlapping(raw.slot(0), block.cast::<u8>(), bytes);
            *out = block;
        }
        VailedStatus::Ok as i32
    })
}

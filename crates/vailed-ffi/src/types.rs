//! The C allocator triple.

use std::alloc::Layout;
use std::ffi::c_void;
use std::ptr::NonNull;

use vailed_core::Allocator;

/// `void *(*)(size_t)`
pub type MallocFn = unsafe extern "C" fn(usize) -> *mut c_void;
/// `void *(*)(void *, size_t)`
pub type ReallocFn = unsafe extern "C" fn(*mut c_void, usize) -> *mut c_void;
/// `void (*)(void *)`
pub type FreeFn = unsafe extern "C" fn(*mut c_void);

/// Alignment every `malloc` is assumed to provide.
pub const MALLOC_ALIGN: usize = 16;

/// A `{malloc, realloc, free}` triple supplied by C code.
///
/// Vectors keep a pointer to this struct in their header, so it must stay
/// at the same address for as long as any vector created with it is live.
/// All three functions must be non-null for `vailed_init` to accept it.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct VailedAllocator {
    /// Allocate `size` bytes aligned to at least 16.
    pub malloc: Option<MallocFn>,
    /// Resize a block from `malloc`, preserving its contents.
    pub realloc: Option<ReallocFn>,
    /// Release a block from `malloc` or `realloc`.
    pub free: Option<FreeFn>,
}

impl VailedAllocator {
    /// Whether all three functions are present.
    pub fn is_complete(&self) -> bool {
        self.malloc.is_some() && self.realloc.is_some() && self.free.is_some()
    }
}

#[allow(unsafe_code)]
impl Allocator for VailedAllocator {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        if layout.align() > MALLOC_ALIGN {
            return None;
        }
        let malloc = self.malloc?;
        // SAFETY: the caller vouched for the function when building the
        // triple; it takes a plain size.
        NonNull::new(unsafe { malloc(layout.size()) }.cast())
    }

    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old: Layout,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        if old.align() > MALLOC_ALIGN {
            return None;
        }
        let realloc = self.realloc?;
        // SAFETY: `ptr` came from this triple (trait contract).
        NonNull::new(unsafe { realloc(ptr.as_ptr().cast(), new_size) }.cast())
    }

    unsafe fn release(&self, ptr: NonNull<u8>, _layout: Layout) {
        if let Some(free) = self.free {
            // SAFETY: `ptr` came from this triple (trait contract).
            unsafe { free(ptr.as_ptr().cast()) };
        }
    }
}

//! C ABI for Vailed vectors.
//!
//! The C surface is type-erased: a vector is the `void*` pointing at its
//! first element, the element size is fixed at `vailed_init`, and memory
//! comes from a caller-supplied [`VailedAllocator`] triple. Every function
//! returns a [`VailedStatus`] code (or a pointer / flag where noted) and
//! never unwinds into C.
//!
//! Functions that may move the block take the vector as `void**` and
//! rewrite it on success; on failure the caller's pointer is left as it was
//! and still valid.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

/// Run an FFI body, turning a panic into `VailedStatus::Panicked`.
macro_rules! ffi_guard {
    ($body:block) => {
        ffi_guard_or!($crate::status::VailedStatus::Panicked as i32, $body)
    };
}

/// Run an FFI body, turning a panic into `$fallback`.
macro_rules! ffi_guard_or {
    ($fallback:expr, $body:block) => {
        match ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| $body)) {
            Ok(value) => value,
            Err(_) => $fallback,
        }
    };
}

pub mod status;
pub mod types;
pub mod vector;

pub use status::VailedStatus;
pub use types::{FreeFn, MallocFn, ReallocFn, VailedAllocator};
pub use vector::*;

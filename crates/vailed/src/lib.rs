//! Growable vectors with a hidden ("vailed") metadata header.
//!
//! A vector is one allocation: a fixed-size [`Header`](raw::Header)
//! (capacity, length, element layout, allocator reference) immediately
//! followed by the element buffer. The only handle a caller holds points
//! at element 0; the header is recovered by subtracting a fixed offset.
//!
//! # Architecture
//!
//! ```text
//! VailedVec<'a, T, A>        typed surface: Deref<[T]>, by-value relocation
//! └── RawVailed<A>           type-erased engine: header math, growth, byte moves
//!     └── &A: Allocator      allocate / reallocate / release, not owned
//!
//! base ──► [pad][Header][e0][e1]...[e(cap-1)]
//!                       ▲
//!                       └── element pointer
//! ```
//!
//! Every operation that may reallocate consumes the vector and returns a
//! new one. When it fails, the untouched vector comes back inside a
//! [`Retained`] together with the [`VecError`].
//!
//! `unsafe` is confined to `raw.rs`, `vec.rs` and `copy.rs`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

#[macro_use]
mod diag;

pub mod copy;
pub mod error;
pub mod raw;
pub mod vec;

pub use copy::PlainBuffer;
pub use error::Retained;
pub use raw::RawVailed;
pub use vec::VailedVec;
pub use vailed_core::{Allocator, SystemAllocator, VecConfig, VecError};

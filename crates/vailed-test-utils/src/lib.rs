//! Test utilities for Vailed development.
//!
//! Provides allocators that observe or sabotage the block traffic of the
//! code under test:
//!
//! - [`TrackingAllocator`] — records every live block; detects leaks,
//!   double releases and layout mismatches.
//! - [`FailingAllocator`] — succeeds a fixed number of times, then reports
//!   out-of-memory.
//! - [`c_alloc`] — `extern "C"` malloc/realloc/free shims for exercising
//!   the C surface.

#![deny(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod c_alloc;
mod tracking;

pub use tracking::{FailingAllocator, TrackingAllocator};

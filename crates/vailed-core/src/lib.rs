//! Core types and traits for Vailed vectors.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! pieces shared by the typed and the C surfaces: the error taxonomy, the
//! [`Allocator`] capability a vector is constructed with, and the
//! configuration/growth policy.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod alloc;
pub mod config;
pub mod error;

pub use alloc::{Allocator, SystemAllocator};
pub use config::VecConfig;
pub use error::VecError;

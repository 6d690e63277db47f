//! Workload generators for the Vailed benchmarks.
//!
//! - [`removal_indices`]: deterministic index streams for remove benchmarks
//! - [`filled`]: a vector preloaded with `0..n`

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use vailed::{Allocator, VailedVec, VecError};

/// Element count used by the default benchmark sizes.
pub const DEFAULT_LEN: usize = 10_000;

/// Indices for removing every element of a vector of length `len`, one at
/// a time, in a seed-determined order.
///
/// Entry `k` is valid for a vector of length `len - k`.
pub fn removal_indices(len: usize, seed: u64) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..len)
        .map(|k| (rng.next_u64() % (len - k) as u64) as usize)
        .collect()
}

/// A vector holding `0..n` with capacity exactly `n`.
pub fn filled<A: Allocator + ?Sized>(n: usize, allocator: &A) -> Result<VailedVec<'_, u64, A>, VecError> {
    let values: Vec<u64> = (0..n as u64).collect();
    let v = VailedVec::with_capacity_in(n, allocator)?;
    Ok(v.push_many(&values)?)
}

//! Vector configuration and growth policy.

/// Construction parameters for a vector.
///
/// Only the initial capacity is configurable; growth follows the fixed
/// policy in [`VecConfig::grow_one`] and [`VecConfig::grow_batch`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VecConfig {
    /// Elements reserved by the initial allocation.
    ///
    /// Default: 64.
    pub initial_capacity: usize,
}

impl VecConfig {
    /// Capacity used when none is given.
    pub const DEFAULT_CAPACITY: usize = 64;

    /// Create a config with the given initial capacity.
    pub fn new(initial_capacity: usize) -> Self {
        Self { initial_capacity }
    }

    /// Capacity to grow to when a single append finds the vector full.
    ///
    /// `(capacity + 1) * 2`, so a zero-capacity vector still makes progress.
    /// Returns `None` on overflow.
    pub fn grow_one(capacity: usize) -> Option<usize> {
        capacity.checked_add(1)?.checked_mul(2)
    }

    /// Capacity to grow to when `needed` total slots are required at once.
    ///
    /// Doubles the capacity, or jumps straight to `needed` when doubling is
    /// not enough.
    pub fn grow_batch(capacity: usize, needed: usize) -> usize {
        capacity.saturating_mul(2).max(needed)
    }
}

impl Default for VecConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

//! Failure carrier for operations that consume a vector.

use std::error::Error;
use std::fmt;

use vailed_core::VecError;

/// A relocating operation failed; the vector is handed back unchanged.
///
/// Growth, resize and insert take the vector by value because a successful
/// call may move the whole block. On failure the original block is still
/// valid and is returned here so the caller can keep using or free it.
pub struct Retained<V> {
    vector: V,
    error: VecError,
}

impl<V> Retained<V> {
    /// Pair an untouched vector with the reason the operation failed.
    pub fn new(vector: V, error: VecError) -> Self {
        Self { vector, error }
    }

    /// Why the operation failed.
    pub fn error(&self) -> &VecError {
        &self.error
    }

    /// The untouched vector.
    pub fn vector(&self) -> &V {
        &self.vector
    }

    /// Take back the untouched vector, discarding the error.
    pub fn into_vector(self) -> V {
        self.vector
    }

    /// Split into the vector and the error.
    pub fn into_parts(self) -> (V, VecError) {
        (self.vector, self.error)
    }

    /// Convert the carried vector, keeping the error.
    pub fn map<W>(self, f: impl FnOnce(V) -> W) -> Retained<W> {
        Retained {
            vector: f(self.vector),
            error: self.error,
        }
    }
}

impl<V> fmt::Debug for Retained<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retained")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<V> fmt::Display for Retained<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (vector retained)", self.error)
    }
}

impl<V> Error for Retained<V> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}

impl<V> From<Retained<V>> for VecError {
    fn from(retained: Retained<V>) -> Self {
        retained.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_parts_returns_both_halves() {
        let r = Retained::new(vec![1, 2, 3], VecError::Empty);
        let (v, e) = r.into_parts();
        assert_eq!(v, vec![1, 2, 3]);
        assert_eq!(e, VecError::Empty);
    }

    #[test]
    fn map_keeps_error() {
        let r = Retained::new(3usize, VecError::AllocationFailure { bytes: 64 });
        let r = r.map(|n| n * 2);
        assert_eq!(*r.vector(), 6);
        assert_eq!(r.error(), &VecError::AllocationFailure { bytes: 64 });
    }

    #[test]
    fn display_mentions_retention() {
        let r = Retained::new((), VecError::Empty);
        assert_eq!(r.to_string(), "vector is empty (vector retained)");
        assert!(r.source().is_some());
    }

    #[test]
    fn converts_into_vec_error() {
        let r = Retained::new((), VecError::Full { capacity: 4 });
        let e: VecError = r.into();
        assert_eq!(e, VecError::Full { capacity: 4 });
    }
}

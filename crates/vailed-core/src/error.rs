//! Error types shared by every Vailed surface.
//!
//! One enum covers the whole taxonomy. The C surface maps each variant to
//! a stable status code; the typed surface returns it directly or wrapped
//! in a `Retained` carrier when the operation consumed the vector.

use std::error::Error;
use std::fmt;

/// Errors reported by vector operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VecError {
    /// A null handle or destination, a missing allocator, or a value the
    /// operation cannot accept (e.g. resizing below the current length).
    InvalidArgument {
        /// Human-readable description of the rejected argument.
        reason: String,
    },
    /// No room left without growing. Advisory: only the non-growing
    /// queries report it, mutating calls grow instead.
    Full {
        /// Capacity at the time of the check.
        capacity: usize,
    },
    /// Pop on a zero-length vector.
    Empty,
    /// Insert or remove past the valid range.
    IndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// The vector length at the time of the call.
        length: usize,
    },
    /// The allocator returned no memory.
    AllocationFailure {
        /// Size of the block that was requested.
        bytes: usize,
    },
}

impl VecError {
    /// Shorthand for [`VecError::InvalidArgument`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Capacity arithmetic overflowed `isize::MAX`.
    pub fn capacity_overflow(capacity: usize, element_size: usize) -> Self {
        Self::invalid(format!(
            "capacity {capacity} with element size {element_size} overflows the address space"
        ))
    }
}

impl fmt::Display for VecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument { reason } => write!(f, "invalid argument: {reason}"),
            Self::Full { capacity } => write!(f, "vector is full at capacity {capacity}"),
            Self::Empty => write!(f, "vector is empty"),
            Self::IndexOutOfBounds { index, length } => {
                write!(f, "index {index} out of bounds for length {length}")
            }
            Self::AllocationFailure { bytes } => {
                write!(f, "allocation of {bytes} bytes failed")
            }
        }
    }
}

impl Error for VecError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_index_and_length() {
        let err = VecError::IndexOutOfBounds {
            index: 7,
            length: 3,
        };
        assert_eq!(err.to_string(), "index 7 out of bounds for length 3");
    }

    #[test]
    fn invalid_shorthand_builds_reason() {
        assert_eq!(
            VecError::invalid("null vector"),
            VecError::InvalidArgument {
                reason: "null vector".into()
            }
        );
    }

    #[test]
    fn capacity_overflow_is_invalid_argument() {
        let err = VecError::capacity_overflow(usize::MAX, 8);
        assert!(matches!(err, VecError::InvalidArgument { .. }));
        assert!(err.to_string().contains("overflows"));
    }

    #[test]
    fn errors_are_std_errors() {
        let err: Box<dyn Error> = Box::new(VecError::Empty);
        assert_eq!(err.to_string(), "vector is empty");
    }
}

//! C-compatible status codes.
//!
//! [`VailedStatus`] is a `repr(i32)` enum with one variant per
//! [`VecError`] kind plus `Ok` and `Panicked`.

use vailed_core::VecError;

/// Status code returned by the `vailed_*` functions.
///
/// `Ok` = 0, all errors are negative. Values are ABI-stable.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VailedStatus {
    /// Success.
    Ok = 0,
    /// Null vector, null output, missing allocator function, or a value the
    /// operation rejects.
    InvalidArgument = -1,
    /// No room without growing. Reported by `vailed_check_room`.
    Full = -2,
    /// Pop on an empty vector.
    Empty = -3,
    /// Index past the valid range.
    IndexOutOfBounds = -4,
    /// The allocator returned NULL.
    AllocationFailed = -5,
    /// A Rust panic was caught at the FFI boundary.
    Panicked = -128,
}

impl From<&VecError> for VailedStatus {
    fn from(e: &VecError) -> Self {
        match e {
            VecError::InvalidArgument { .. } => VailedStatus::InvalidArgument,
            VecError::Full { .. } => VailedStatus::Full,
            VecError::Empty => VailedStatus::Empty,
            VecError::IndexOutOfBounds { .. } => VailedStatus::IndexOutOfBounds,
            VecError::AllocationFailure { .. } => VailedStatus::AllocationFailed,
        }
    }
}

impl From<Result<(), VecError>> for VailedStatus {
    fn from(result: Result<(), VecError>) -> Self {
        match result {
            Ok(()) => VailedStatus::Ok,
            Err(e) => VailedStatus::from(&e),
        }
    }
}

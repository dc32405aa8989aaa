/*!

Errors raised by the arena. Two surfaces are exposed on purpose: [`Error`] is
the idiomatic `std::error::Error` type callers match on, while [`ErrorCode`]
is the small closed set of negative integer codes the arena's contract has
always promised (`NoError`, `Error`, `KeyNotFound`, `KeyExists`, `BadSize`).
Keep both in sync when adding a variant.

*/

use thiserror::Error as ThisError;

/// Errors produced by arena operations.
#[derive(ThisError, Debug, Clone, Eq, PartialEq)]
pub enum Error {
    /// The buffer passed to `Initialize` was too small to hold even an
    /// empty arena, or `hunk_size` was zero, or the buffer was misaligned.
    #[error("buffer too small or malformed for an arena (need at least {needed} bytes)")]
    BadBuffer {
        /// Minimum number of bytes required.
        needed: usize,
    },

    /// There was no room left to satisfy an allocation: the descriptor
    /// stack and value heap would have collided.
    #[error("arena is full")]
    ArenaFull,

    /// The key exceeds `MaxKeyLength` for this arena.
    #[error("key length {length} exceeds the maximum of {max}")]
    KeyTooLong {
        /// Length of the offending key.
        length: usize,
        /// Maximum permitted key length for this arena.
        max: usize,
    },

    /// `Create` was called with a key that already has a live descriptor.
    #[error("key already exists")]
    KeyExists,

    /// The key has no live descriptor.
    #[error("key not found")]
    KeyNotFound,

    /// The caller-provided buffer size does not match the stored value size.
    #[error("value size mismatch: expected {expected} bytes, got {actual}")]
    BadSize {
        /// Size stored for this key.
        expected: usize,
        /// Size the caller supplied.
        actual: usize,
    },
}

/// The closed set of legacy status codes the arena's public contract
/// documents. `< 0` is always failure; `0` is always success.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(i32)]
pub enum ErrorCode {
    /// No error; the operation succeeded.
    NoError = 0,
    /// Unspecified failure (capacity exhaustion, bad buffer, ...).
    Error = -1,
    /// The requested key has no live descriptor.
    KeyNotFound = -2,
    /// `Create` found a live descriptor for the key already.
    KeyExists = -3,
    /// The supplied buffer size does not match the stored value size.
    BadSize = -4,
}

impl From<&Error> for ErrorCode {
    fn from(error: &Error) -> Self {
        match error {
            Error::KeyNotFound => ErrorCode::KeyNotFound,
            Error::KeyExists => ErrorCode::KeyExists,
            Error::BadSize { .. } => ErrorCode::BadSize,
            Error::BadBuffer { .. } | Error::ArenaFull | Error::KeyTooLong { .. } => {
                ErrorCode::Error
            }
        }
    }
}

impl From<Error> for ErrorCode {
    fn from(error: Error) -> Self {
        ErrorCode::from(&error)
    }
}

/// `true` iff `code` represents a failure. Matches the legacy `IsError(v)`
/// contract: any negative code is an error.
#[inline]
pub fn is_error(code: i32) -> bool {
    code < 0
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

//! Runtime error kinds and the or-able accumulator.

use thiserror::Error;

/// Errors reported by the primitive value operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RtError {
    /// Argument syntactically or semantically invalid: bad UTF-8, a
    /// forbidden token or text character, an empty or oversized token, or a
    /// malformed integer literal.
    #[error("invalid argument")]
    Inval,
    /// A value is present but has the wrong shape: unwrapping a non-sum,
    /// arithmetic on a non-integer, dropping a relevant block, copying an
    /// affine block, or dividing by zero.
    #[error("type error")]
    TypeError,
    /// The context arena is out of space. The caller must drop any partial
    /// construction left on its stack.
    #[error("context full")]
    CxFull,
    /// The requested value does not fit the caller's range or buffer; retry
    /// with a wider read.
    #[error("buffer too small")]
    BuffSz,
    /// The operation hit a representation path that is intentionally not
    /// implemented (compact arrays, stowage). Retryable with the general
    /// list representation.
    #[error("unimplemented representation")]
    Impl,
    /// The value stands for a computation that has not materialized yet.
    #[error("pending computation")]
    Pending,
}

/// Result alias used throughout the runtime.
pub type Result<T> = core::result::Result<T, RtError>;

bitflags::bitflags! {
    /// Accumulated error bits.
    ///
    /// Primitive calls can be staged and their outcomes or'd together, with
    /// a single check at the end of the sequence.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ErrorSet: u32 {
        /// At least one call reported [`RtError::Inval`].
        const INVAL = 1;
        /// At least one call reported [`RtError::TypeError`].
        const TYPE_ERROR = 1 << 1;
        /// At least one call reported [`RtError::CxFull`].
        const CXFULL = 1 << 2;
        /// At least one call reported [`RtError::BuffSz`].
        const BUFFSZ = 1 << 3;
        /// At least one call reported [`RtError::Impl`].
        const IMPL = 1 << 4;
        /// At least one call reported [`RtError::Pending`].
        const PENDING = 1 << 5;
    }
}

impl From<RtError> for ErrorSet {
    fn from(e: RtError) -> ErrorSet {
        match e {
            RtError::Inval => ErrorSet::INVAL,
            RtError::TypeError => ErrorSet::TYPE_ERROR,
            RtError::CxFull => ErrorSet::CXFULL,
            RtError::BuffSz => ErrorSet::BUFFSZ,
            RtError::Impl => ErrorSet::IMPL,
            RtError::Pending => ErrorSet::PENDING,
        }
    }
}

impl ErrorSet {
    /// Record the outcome of one staged operation, keeping earlier bits.
    pub fn stage<T>(&mut self, outcome: Result<T>) -> Option<T> {
        match outcome {
            Ok(v) => Some(v),
            Err(e) => {
                *self |= e.into();
                None
            }
        }
    }

    /// True when no staged operation has failed.
    pub fn ok(&self) -> bool {
        self.is_empty()
    }
}

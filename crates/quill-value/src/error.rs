//! Value engine error types

use thiserror::Error;

/// Errors raised by the value engine
///
/// Most value operations are total (they coerce or return a sentinel), so the
/// variants here only cover the few places where an operation can genuinely be
/// refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// A restricted container refused a mutation
    #[error("UnsupportedOperation: {operation} is not supported by {container}")]
    UnsupportedOperation {
        /// Operation name (e.g. "append")
        operation: &'static str,
        /// Container kind (e.g. "fixed array")
        container: &'static str,
    },

    /// Malformed serialized input
    #[error("UnserializeError: {reason} at offset {offset}")]
    Unserialize {
        /// Byte offset into the input where decoding failed
        offset: usize,
        /// What the decoder expected
        reason: String,
    },

    /// Nesting deeper than the configured limit
    #[error("RangeError: maximum nesting depth of {depth} exceeded")]
    Recursion {
        /// The configured limit
        depth: usize,
    },
}

impl ValueError {
    /// Create an unsupported-operation error
    pub fn unsupported(operation: &'static str, container: &'static str) -> Self {
        Self::UnsupportedOperation {
            operation,
            container,
        }
    }

    /// Create an unserialize error
    pub fn unserialize(offset: usize, reason: impl Into<String>) -> Self {
        Self::Unserialize {
            offset,
            reason: reason.into(),
        }
    }

    /// Create a recursion-limit error
    pub fn recursion(depth: usize) -> Self {
        Self::Recursion { depth }
    }
}

/// Result type for value operations
pub type ValueResult<T> = std::result::Result<T, ValueError>;

//! RHI error types.

use thiserror::Error;

/// Errors surfaced by the RHI.
///
/// Nothing in this crate retries. Every variant terminates the operation
/// that produced it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// A native allocation, object creation or command call failed.
    #[error("construction failed: {0}")]
    ConstructionFailed(String),
    /// An API call was made in a state that does not permit it.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    /// A descriptor or argument failed validation.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::ProtocolViolation("buffer is already mapped".to_string());
        assert_eq!(err.to_string(), "protocol violation: buffer is already mapped");

        let err = GraphicsError::ConstructionFailed("vkCreateImage".to_string());
        assert_eq!(err.to_string(), "construction failed: vkCreateImage");
    }
}

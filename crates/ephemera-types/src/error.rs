use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid identifier character: {0:?}")]
    InvalidIdChar(char),

    #[error("invalid identifier length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("identifier width {bytes} bytes is outside {min}..={max}")]
    InvalidIdWidth { bytes: usize, min: usize, max: usize },

    #[error("invalid name policy: {0}")]
    InvalidNamePolicy(String),
}

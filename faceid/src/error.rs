use thiserror::Error;

/// Errors returned by faceid operations.
///
/// Every variant is a configuration error: the caller handed in vectors or
/// parameters that cannot be compared meaningfully. "No match" and empty
/// input are ordinary return values, never errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FaceIdError {
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("invalid threshold {0}: must be a finite cosine distance in [0, 2]")]
    InvalidThreshold(f32),

    #[error("invalid dimension: embedding length must be positive")]
    InvalidDimension,
}

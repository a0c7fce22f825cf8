//! Error types shared by tensors, layers and models

use thiserror::Error;

use crate::tensor::Shape;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the engine can report.
///
/// All of these describe programming or configuration mistakes: none of them
/// is transient and nothing inside the crate retries on them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Two operands of an elementwise operation disagree on shape
    #[error("shape mismatch: {left} vs {right}")]
    ShapeMismatch { left: Shape, right: Shape },

    /// An operation needs a specific rank
    #[error("invalid rank: expected {expected}, got {actual}")]
    RankMismatch { expected: usize, actual: usize },

    /// A coordinate exceeds the size of its axis
    #[error("index {index} out of range for axis {axis} of size {size}")]
    IndexOutOfRange {
        axis: usize,
        index: usize,
        size: usize,
    },

    /// Flat values do not fill the requested shape
    #[error("invalid length: shape {shape} holds {expected} elements, got {actual} values")]
    LengthMismatch {
        shape: Shape,
        expected: usize,
        actual: usize,
    },

    /// Reshape target holds a different number of elements
    #[error("cannot reshape {from} into {to}")]
    ReshapeMismatch { from: Shape, to: Shape },

    /// Inner dimensions of a matrix product disagree
    #[error("incompatible dimensions for dot: {left} x {right}")]
    DotMismatch { left: Shape, right: Shape },

    #[error("operation requires a non-empty tensor")]
    EmptyTensor,

    #[error("operation requires a non-empty batch")]
    EmptyBatch,

    /// Two parallel batches have different lengths
    #[error("batch mismatch: {left} samples vs {right} samples")]
    BatchMismatch { left: usize, right: usize },

    /// `backward`/`update` ran without the state its predecessor leaves behind
    #[error("{layer}: {operation} called without a matching {requires}")]
    MissingCache {
        layer: &'static str,
        operation: &'static str,
        requires: &'static str,
    },

    /// A layer rejected the shape propagated to it during `build`
    #[error("build error at layer {index} ({layer}): {source}")]
    Build {
        index: usize,
        layer: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error("model is not built")]
    NotBuilt,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to build thread pool: {0}")]
    ThreadPool(String),
}

impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Error::ThreadPool(err.to_string())
    }
}

impl Error {
    /// Shorthand for [`Error::MissingCache`]
    pub(crate) fn missing(layer: &'static str, operation: &'static str, requires: &'static str) -> Self {
        Error::MissingCache {
            layer,
            operation,
            requires,
        }
    }
}

//! A small neural network training engine in Rust
//!
//! This library provides n-dimensional tensors, a fixed set of layers, a
//! cross-entropy loss and SGD-style optimizers, composed by a [`Sequential`]
//! model that trains with minibatch gradient descent. Work inside a layer is
//! spread over the samples of a batch with rayon.

pub mod config;
pub mod error;
pub mod nn;
pub mod tensor;

// Re-export commonly used types for convenience
pub use config::ModelConfig;
pub use error::{Error, Result};
pub use nn::*;
pub use tensor::{Shape, Tensor};

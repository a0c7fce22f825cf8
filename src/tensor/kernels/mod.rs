//! Kernel implementations for tensor operations
//!
//! Kernels work on raw `f64` buffers laid out with the first axis varying
//! fastest, matching [`Shape::raw_index`](crate::tensor::Shape::raw_index).

pub mod gemm;

pub use gemm::{matmul, transpose};

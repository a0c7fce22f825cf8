//! Tensor module containing the shape and tensor value types
//!
//! This module provides [`Shape`], the [`Tensor`] value type with its
//! elementwise and linear-algebra primitives, and the numeric helpers in
//! [`ops`] that layers build on.

mod core;
pub mod kernels;
pub mod ops;
mod shape;

pub use self::core::Tensor;
pub use shape::Shape;

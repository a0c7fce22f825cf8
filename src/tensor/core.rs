use rand::distributions::Uniform;
use rand::prelude::Distribution;
use rand::Rng;
use tracing::instrument;

use super::{kernels, Shape};
use crate::error::{Error, Result};

/// Main tensor struct: a shape and a flat buffer of `shape.elements()` values.
///
/// Tensors are values. Every operation returns a new, independently owned
/// tensor; [`Tensor::set`] is the only in-place mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Shape,
    data: Vec<f64>,
}

impl Tensor {
    /// Create a tensor filled with zeros
    pub fn zeros(shape: impl Into<Shape>) -> Self {
        let shape = shape.into();
        let data = vec![0.0; shape.elements()];
        Tensor { shape, data }
    }

    /// Create a tensor filled with `value`
    pub fn full(shape: impl Into<Shape>, value: f64) -> Self {
        let shape = shape.into();
        let data = vec![value; shape.elements()];
        Tensor { shape, data }
    }

    /// Create a tensor from flat values (first axis fastest)
    pub fn from_values(shape: impl Into<Shape>, values: Vec<f64>) -> Result<Self> {
        let shape = shape.into();
        if shape.elements() != values.len() {
            return Err(Error::LengthMismatch {
                expected: shape.elements(),
                actual: values.len(),
                shape,
            });
        }

        Ok(Tensor {
            shape,
            data: values,
        })
    }

    /// Create a tensor with values drawn uniformly from `[low, high)`
    #[instrument(skip(rng, shape), fields(shape = %shape))]
    pub fn uniform<R: Rng + ?Sized>(shape: &Shape, low: f64, high: f64, rng: &mut R) -> Self {
        let uniform = Uniform::new(low, high);
        let data = (0..shape.elements())
            .map(|_| uniform.sample(rng))
            .collect();

        Tensor {
            shape: shape.clone(),
            data,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Flat view of the buffer
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    pub fn get(&self, at: &[usize]) -> Result<f64> {
        Ok(self.data[self.shape.raw_index(at)?])
    }

    pub fn set(&mut self, value: f64, at: &[usize]) -> Result<()> {
        let index = self.shape.raw_index(at)?;
        self.data[index] = value;
        Ok(())
    }

    /// Apply `f` to every element
    pub fn map<F>(&self, f: F) -> Tensor
    where
        F: Fn(f64) -> f64,
    {
        Tensor {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&x| f(x)).collect(),
        }
    }

    /// Helper for binary elementwise operations: shapes must be identical
    fn zip_with<F>(&self, other: &Tensor, f: F) -> Result<Tensor>
    where
        F: Fn(f64, f64) -> f64,
    {
        if self.shape != other.shape {
            return Err(Error::ShapeMismatch {
                left: self.shape.clone(),
                right: other.shape.clone(),
            });
        }

        Ok(Tensor {
            shape: self.shape.clone(),
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }

    // ------------------------------------------------------------------
    // Scalar broadcast
    // ------------------------------------------------------------------

    pub fn add_scalar(&self, scalar: f64) -> Tensor {
        self.map(|x| x + scalar)
    }

    pub fn sub_scalar(&self, scalar: f64) -> Tensor {
        self.map(|x| x - scalar)
    }

    pub fn mul_scalar(&self, scalar: f64) -> Tensor {
        self.map(|x| x * scalar)
    }

    pub fn div_scalar(&self, scalar: f64) -> Tensor {
        self.map(|x| x / scalar)
    }

    // ------------------------------------------------------------------
    // Elementwise tensor-tensor
    // ------------------------------------------------------------------

    /// Element-wise addition
    pub fn add(&self, other: &Tensor) -> Result<Tensor> {
        self.zip_with(other, |a, b| a + b)
    }

    /// Element-wise subtraction
    pub fn sub(&self, other: &Tensor) -> Result<Tensor> {
        self.zip_with(other, |a, b| a - b)
    }

    /// Element-wise multiplication
    pub fn mul(&self, other: &Tensor) -> Result<Tensor> {
        self.zip_with(other, |a, b| a * b)
    }

    /// Element-wise division
    pub fn div(&self, other: &Tensor) -> Result<Tensor> {
        self.zip_with(other, |a, b| a / b)
    }

    // ------------------------------------------------------------------
    // Linear algebra
    // ------------------------------------------------------------------

    /// Matrix multiplication of two rank-2 tensors
    #[instrument(level = "trace", skip(self, other), fields(shape_a = %self.shape, shape_b = %other.shape))]
    pub fn dot(&self, other: &Tensor) -> Result<Tensor> {
        if self.rank() != 2 || other.rank() != 2 || self.shape[1] != other.shape[0] {
            return Err(Error::DotMismatch {
                left: self.shape.clone(),
                right: other.shape.clone(),
            });
        }

        let a_dims = [self.shape[0], self.shape[1]];
        let b_dims = [other.shape[0], other.shape[1]];
        let data = kernels::matmul(&self.data, a_dims, &other.data, b_dims);

        Ok(Tensor {
            shape: Shape::from([a_dims[0], b_dims[1]]),
            data,
        })
    }

    /// Swap the two axes of a rank-2 tensor
    #[instrument(level = "trace", skip(self), fields(shape = %self.shape))]
    pub fn transpose(&self) -> Result<Tensor> {
        if self.rank() != 2 {
            return Err(Error::RankMismatch {
                expected: 2,
                actual: self.rank(),
            });
        }

        let dims = [self.shape[0], self.shape[1]];
        Ok(Tensor {
            shape: Shape::from([dims[1], dims[0]]),
            data: kernels::transpose(&self.data, dims),
        })
    }

    /// Reshape tensor to new shape. The result owns its own copy of the buffer.
    #[instrument(level = "trace", skip(self, shape), fields(old_shape = %self.shape))]
    pub fn reshape(&self, shape: impl Into<Shape>) -> Result<Tensor> {
        let shape = shape.into();
        if shape.elements() != self.numel() {
            return Err(Error::ReshapeMismatch {
                from: self.shape.clone(),
                to: shape,
            });
        }

        Ok(Tensor {
            shape,
            data: self.data.clone(),
        })
    }

    // ------------------------------------------------------------------
    // Reductions
    // ------------------------------------------------------------------

    /// Sum all elements
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Largest element
    pub fn max(&self) -> Result<f64> {
        let (first, rest) = self.data.split_first().ok_or(Error::EmptyTensor)?;
        Ok(rest.iter().fold(*first, |acc, &x| if x > acc { x } else { acc }))
    }

    /// Flat index of the first occurrence of the largest element
    pub fn argmax(&self) -> Result<usize> {
        let (first, rest) = self.data.split_first().ok_or(Error::EmptyTensor)?;

        let mut index = 0;
        let mut max = *first;
        for (i, &x) in rest.iter().enumerate() {
            if x > max {
                max = x;
                index = i + 1;
            }
        }
        Ok(index)
    }

    // ------------------------------------------------------------------
    // Transcendental
    // ------------------------------------------------------------------

    pub fn exp(&self) -> Tensor {
        self.map(f64::exp)
    }

    /// Natural logarithm. No domain handling: non-positive inputs give NaN/-inf.
    pub fn log(&self) -> Tensor {
        self.map(f64::ln)
    }
}

use std::fmt;
use std::ops::Index;

use crate::error::{Error, Result};

/// Ordered list of dimension sizes.
///
/// Flat indices are computed with the first axis varying fastest: for
/// coordinates `(i0, i1, ..., ik)` in `(d0, d1, ..., dk)` the flat index is
/// `i0 + d0 * (i1 + d1 * (i2 + ...))`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape(Vec<usize>);

impl Shape {
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Shape(dims.into())
    }

    /// Scalar shape (rank 0, one element)
    pub fn scalar() -> Self {
        Shape(Vec::new())
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Number of elements a tensor of this shape holds. The empty shape holds one.
    pub fn elements(&self) -> usize {
        self.0.iter().product()
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Flatten a coordinate tuple into a buffer offset
    pub fn raw_index(&self, at: &[usize]) -> Result<usize> {
        if at.len() != self.rank() {
            return Err(Error::RankMismatch {
                expected: self.rank(),
                actual: at.len(),
            });
        }

        let mut index = 0;
        let mut stride = 1;
        for (axis, (&i, &size)) in at.iter().zip(&self.0).enumerate() {
            if i >= size {
                return Err(Error::IndexOutOfRange {
                    axis,
                    index: i,
                    size,
                });
            }
            index += i * stride;
            stride *= size;
        }

        Ok(index)
    }
}

impl Index<usize> for Shape {
    type Output = usize;

    fn index(&self, axis: usize) -> &usize {
        &self.0[axis]
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape(dims.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Shape(dims.to_vec())
    }
}

impl From<&Shape> for Shape {
    fn from(shape: &Shape) -> Self {
        shape.clone()
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        if self.0.len() == 1 {
            write!(f, ",")?;
        }
        write!(f, ")")
    }
}

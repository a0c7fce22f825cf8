//! Additional tensor operations
//!
//! Higher-level per-sample functions shared by the activation layers and the
//! loss: softmax, sigmoid and the cross-entropy term.

use super::Tensor;
use crate::error::{Error, Result};

/// Added to predictions before taking the log in cross-entropy
pub const LOG_EPSILON: f64 = 1e-7;

/// Softmax over all elements of `input`
///
/// For numerical stability, we subtract the max value before exponentiating:
/// softmax(x)_i = exp(x_i - max(x)) / sum(exp(x_j - max(x)))
pub fn softmax(input: &Tensor) -> Result<Tensor> {
    let max = input.max()?;
    let exp = input.sub_scalar(max).exp();
    let sum = exp.sum();
    Ok(exp.div_scalar(sum))
}

/// Logistic function 1 / (1 + e^-x), elementwise
pub fn sigmoid(input: &Tensor) -> Tensor {
    input.map(|x| 1.0 / (1.0 + (-x).exp()))
}

/// Cross-entropy of one sample: -sum(t * ln(y + eps))
pub fn cross_entropy(prediction: &Tensor, target: &Tensor) -> Result<f64> {
    if prediction.shape() != target.shape() {
        return Err(Error::ShapeMismatch {
            left: prediction.shape().clone(),
            right: target.shape().clone(),
        });
    }

    let log = prediction.add_scalar(LOG_EPSILON).log();
    Ok(-log.mul(target)?.sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_softmax_sums_to_one() {
        let x = Tensor::from_values([4], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let y = softmax(&x).unwrap();
        assert_relative_eq!(y.sum(), 1.0, epsilon = 1e-12);
        assert!(y.data().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_softmax_is_shift_invariant_and_stable() {
        let x = Tensor::from_values([3], vec![1000.0, 1001.0, 1002.0]).unwrap();
        let y = softmax(&x).unwrap();
        let z = softmax(&x.sub_scalar(1000.0)).unwrap();
        for (a, b) in y.data().iter().zip(z.data()) {
            assert!(a.is_finite());
            assert_relative_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_sigmoid() {
        let x = Tensor::from_values([3], vec![-100.0, 0.0, 100.0]).unwrap();
        let y = sigmoid(&x);
        assert_relative_eq!(y.data()[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(y.data()[1], 0.5);
        assert_relative_eq!(y.data()[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_cross_entropy_uniform_is_ln_k() {
        let k = 4;
        let y = Tensor::full([k], 1.0 / k as f64);
        let t = Tensor::from_values([k], vec![0.0, 0.0, 1.0, 0.0]).unwrap();
        assert_relative_eq!(cross_entropy(&y, &t).unwrap(), (k as f64).ln(), epsilon = 1e-6);
    }

    #[test]
    fn test_cross_entropy_shape_mismatch() {
        let y = Tensor::zeros([3]);
        let t = Tensor::zeros([4]);
        assert!(cross_entropy(&y, &t).is_err());
    }
}

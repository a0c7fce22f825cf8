use rand::rngs::StdRng;

use super::{check_samples, per_sample, Layer, OptimizerFactory, ShapeBinding};
use crate::error::{Error, Result};
use crate::tensor::{Shape, Tensor};

/// Reshapes every sample to rank 1
#[derive(Debug, Clone, Default)]
pub struct Flatten {
    binding: Option<ShapeBinding>,
}

impl Flatten {
    pub fn new() -> Self {
        Self::default()
    }

    fn bound(&self, operation: &'static str) -> Result<&ShapeBinding> {
        self.binding
            .as_ref()
            .ok_or_else(|| Error::missing("Flatten", operation, "init"))
    }
}

impl Layer for Flatten {
    fn name(&self) -> &'static str {
        "Flatten"
    }

    fn binding(&self) -> Option<&ShapeBinding> {
        self.binding.as_ref()
    }

    fn init(&mut self, input_shape: &Shape, _: &OptimizerFactory, _: &mut StdRng) -> Result<Shape> {
        let output = Shape::from([input_shape.elements()]);
        self.binding = Some(ShapeBinding::new(input_shape.clone(), output.clone()));
        Ok(output)
    }

    fn call(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        let binding = self.bound("call")?;
        check_samples(inputs, &binding.input)?;
        per_sample(inputs, |x| x.reshape(&binding.output))
    }

    fn forward(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        self.call(inputs)
    }

    /// Values pass through untouched; only the shape is restored
    fn backward(&mut self, douts: &[Tensor]) -> Result<Vec<Tensor>> {
        let binding = self.bound("backward")?;
        check_samples(douts, &binding.output)?;
        per_sample(douts, |d| d.reshape(&binding.input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_flatten_round_trip() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut flatten = Flatten::new();
        let out = flatten
            .init(&Shape::from([2, 3]), &OptimizerFactory::sgd(0.1), &mut rng)
            .unwrap();
        assert_eq!(out, Shape::from([6]));

        let x = Tensor::from_values([2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let y = flatten.forward(&[x.clone()]).unwrap();
        assert_eq!(y[0].shape(), &Shape::from([6]));
        assert_eq!(y[0].data(), x.data());

        let dx = flatten.backward(&y).unwrap();
        assert_eq!(dx[0], x);
    }

    #[test]
    fn test_flatten_requires_init() {
        let flatten = Flatten::new();
        assert!(matches!(
            flatten.call(&[Tensor::zeros([2])]),
            Err(Error::MissingCache { .. })
        ));
    }

    #[test]
    fn test_flatten_rejects_sample_of_other_shape() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut flatten = Flatten::new();
        flatten
            .init(&Shape::from([2, 3]), &OptimizerFactory::sgd(0.1), &mut rng)
            .unwrap();
        assert!(matches!(
            flatten.call(&[Tensor::zeros([3, 2])]),
            Err(Error::ShapeMismatch { .. })
        ));
        assert!(matches!(
            flatten.backward(&[Tensor::zeros([6, 1])]),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}

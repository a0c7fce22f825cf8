//! Parameterless activation layers

use rand::rngs::StdRng;

use super::{
    apply_mask, bound, check_samples, per_sample, per_sample_pair, Layer, OptimizerFactory, ShapeBinding,
};
use crate::error::{Error, Result};
use crate::tensor::{ops, Shape, Tensor};

/// ReLU activation: max(0, x)
#[derive(Debug, Clone, Default)]
pub struct ReLU {
    binding: Option<ShapeBinding>,
    masks: Option<Vec<Vec<bool>>>,
}

impl ReLU {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Layer for ReLU {
    fn name(&self) -> &'static str {
        "ReLU"
    }

    fn binding(&self) -> Option<&ShapeBinding> {
        self.binding.as_ref()
    }

    fn init(&mut self, input_shape: &Shape, _: &OptimizerFactory, _: &mut StdRng) -> Result<Shape> {
        self.binding = Some(ShapeBinding::same(input_shape));
        Ok(input_shape.clone())
    }

    fn call(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        check_samples(inputs, &bound(self.binding(), "ReLU", "call")?.input)?;
        per_sample(inputs, |x| Ok(x.map(|v| v.max(0.0))))
    }

    fn forward(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        let outputs = self.call(inputs)?;
        // Mask marks positions whose gradient is cut
        self.masks = Some(
            outputs
                .iter()
                .map(|y| y.data().iter().map(|&v| v <= 0.0).collect())
                .collect(),
        );
        Ok(outputs)
    }

    fn backward(&mut self, douts: &[Tensor]) -> Result<Vec<Tensor>> {
        let masks = self
            .masks
            .take()
            .ok_or_else(|| Error::missing("ReLU", "backward", "forward"))?;
        check_samples(douts, &bound(self.binding(), "ReLU", "backward")?.output)?;
        per_sample_pair(douts, &masks, |dout, mask| apply_mask(dout, mask))
    }
}

/// Sigmoid activation: 1 / (1 + e^-x)
#[derive(Debug, Clone, Default)]
pub struct Sigmoid {
    binding: Option<ShapeBinding>,
    outputs: Option<Vec<Tensor>>,
}

impl Sigmoid {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Layer for Sigmoid {
    fn name(&self) -> &'static str {
        "Sigmoid"
    }

    fn binding(&self) -> Option<&ShapeBinding> {
        self.binding.as_ref()
    }

    fn init(&mut self, input_shape: &Shape, _: &OptimizerFactory, _: &mut StdRng) -> Result<Shape> {
        self.binding = Some(ShapeBinding::same(input_shape));
        Ok(input_shape.clone())
    }

    fn call(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        check_samples(inputs, &bound(self.binding(), "Sigmoid", "call")?.input)?;
        per_sample(inputs, |x| Ok(ops::sigmoid(x)))
    }

    fn forward(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        let outputs = self.call(inputs)?;
        self.outputs = Some(outputs.clone());
        Ok(outputs)
    }

    /// dx = y * (1 - y) * dout
    fn backward(&mut self, douts: &[Tensor]) -> Result<Vec<Tensor>> {
        let outputs = self
            .outputs
            .take()
            .ok_or_else(|| Error::missing("Sigmoid", "backward", "forward"))?;
        per_sample_pair(douts, &outputs, |dout, y| {
            y.mul_scalar(-1.0).add_scalar(1.0).mul(y)?.mul(dout)
        })
    }
}

/// Softmax over each rank-1 sample
///
/// `backward` returns `dout * y + y`. Paired with
/// [`CrossEntropy`](super::CrossEntropy), whose gradient is `-t / y`, this
/// yields `y - t` for one-hot targets, the gradient of the fused
/// softmax/cross-entropy. It is not the general softmax Jacobian product and
/// should not be combined with other losses.
#[derive(Debug, Clone, Default)]
pub struct Softmax {
    binding: Option<ShapeBinding>,
    outputs: Option<Vec<Tensor>>,
}

impl Softmax {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Layer for Softmax {
    fn name(&self) -> &'static str {
        "Softmax"
    }

    fn binding(&self) -> Option<&ShapeBinding> {
        self.binding.as_ref()
    }

    fn init(&mut self, input_shape: &Shape, _: &OptimizerFactory, _: &mut StdRng) -> Result<Shape> {
        if input_shape.rank() != 1 {
            return Err(Error::RankMismatch {
                expected: 1,
                actual: input_shape.rank(),
            });
        }

        self.binding = Some(ShapeBinding::same(input_shape));
        Ok(input_shape.clone())
    }

    fn call(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        check_samples(inputs, &bound(self.binding(), "Softmax", "call")?.input)?;
        per_sample(inputs, ops::softmax)
    }

    fn forward(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        let outputs = self.call(inputs)?;
        self.outputs = Some(outputs.clone());
        Ok(outputs)
    }

    fn backward(&mut self, douts: &[Tensor]) -> Result<Vec<Tensor>> {
        let outputs = self
            .outputs
            .take()
            .ok_or_else(|| Error::missing("Softmax", "backward", "forward"))?;
        per_sample_pair(douts, &outputs, |dout, y| dout.mul(y)?.add(y))
    }
}

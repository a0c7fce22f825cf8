use rand::rngs::StdRng;

use super::{bound, check_samples, Layer, OptimizerFactory, ShapeBinding};
use crate::error::Result;
use crate::tensor::{Shape, Tensor};

/// Identity layer every [`Sequential`](super::Sequential) model starts with.
///
/// It is also where samples of the wrong shape are turned away.
#[derive(Debug, Clone, Default)]
pub struct Input {
    binding: Option<ShapeBinding>,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Layer for Input {
    fn name(&self) -> &'static str {
        "Input"
    }

    fn binding(&self) -> Option<&ShapeBinding> {
        self.binding.as_ref()
    }

    fn init(&mut self, input_shape: &Shape, _: &OptimizerFactory, _: &mut StdRng) -> Result<Shape> {
        self.binding = Some(ShapeBinding::same(input_shape));
        Ok(input_shape.clone())
    }

    fn call(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        check_samples(inputs, &bound(self.binding(), "Input", "call")?.input)?;
        Ok(inputs.to_vec())
    }

    fn forward(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        self.call(inputs)
    }

    fn backward(&mut self, douts: &[Tensor]) -> Result<Vec<Tensor>> {
        check_samples(douts, &bound(self.binding(), "Input", "backward")?.output)?;
        Ok(douts.to_vec())
    }
}

use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;

use super::{bound, check_samples, per_sample, Layer, OptimizerFactory, ShapeBinding};
use crate::error::{Error, Result};
use crate::tensor::{Shape, Tensor};

/// Per-sample function wrapped by [`Lambda`]
pub type LambdaFn = Arc<dyn Fn(&Tensor) -> Result<Tensor> + Send + Sync>;

/// Applies a user function to every sample.
///
/// The function is assumed to have an identity derivative: `backward`
/// returns the incoming gradient unchanged. Use it for shape-preserving
/// transforms where that holds (scaling by one, clipping far from the bounds)
/// or in inference-only models.
#[derive(Clone)]
pub struct Lambda {
    f: LambdaFn,
    output_shape: Option<Shape>,
    binding: Option<ShapeBinding>,
}

impl Lambda {
    /// Wrap a shape-preserving function
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Tensor) -> Tensor + Send + Sync + 'static,
    {
        Self {
            f: Arc::new(move |x| Ok(f(x))),
            output_shape: None,
            binding: None,
        }
    }

    /// Wrap a fallible function whose outputs have shape `output_shape`
    pub fn with_output_shape<F>(output_shape: impl Into<Shape>, f: F) -> Self
    where
        F: Fn(&Tensor) -> Result<Tensor> + Send + Sync + 'static,
    {
        Self {
            f: Arc::new(f),
            output_shape: Some(output_shape.into()),
            binding: None,
        }
    }

    fn apply(&self, binding: &ShapeBinding, x: &Tensor) -> Result<Tensor> {
        let y = (self.f)(x)?;
        if y.shape() != &binding.output {
            return Err(Error::ShapeMismatch {
                left: y.shape().clone(),
                right: binding.output.clone(),
            });
        }
        Ok(y)
    }
}

impl fmt::Debug for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lambda")
            .field("output_shape", &self.output_shape)
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

impl Layer for Lambda {
    fn name(&self) -> &'static str {
        "Lambda"
    }

    fn binding(&self) -> Option<&ShapeBinding> {
        self.binding.as_ref()
    }

    fn init(&mut self, input_shape: &Shape, _: &OptimizerFactory, _: &mut StdRng) -> Result<Shape> {
        let output = self
            .output_shape
            .clone()
            .unwrap_or_else(|| input_shape.clone());
        self.binding = Some(ShapeBinding::new(input_shape.clone(), output.clone()));
        Ok(output)
    }

    fn call(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        let binding = bound(self.binding(), "Lambda", "call")?;
        check_samples(inputs, &binding.input)?;
        per_sample(inputs, |x| self.apply(binding, x))
    }

    fn forward(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        self.call(inputs)
    }

    fn backward(&mut self, douts: &[Tensor]) -> Result<Vec<Tensor>> {
        check_samples(douts, &bound(self.binding(), "Lambda", "backward")?.output)?;
        Ok(douts.to_vec())
    }
}

//! Layers, loss, optimizers and the sequential model
//!
//! Every layer works on a *batch*: a slice of per-sample tensors that all
//! share the layer's input shape. Per-sample work inside a layer is spread
//! over the rayon pool; layers themselves always run one after another.

use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::tensor::{Shape, Tensor};

mod activation;
mod dense;
mod dropout;
mod flatten;
mod input;
mod lambda;
mod layer;
pub mod loss;
pub mod optim;
mod sequential;

pub use activation::{ReLU, Sigmoid, Softmax};
pub use dense::{Dense, DenseGrads};
pub use dropout::Dropout;
pub use flatten::Flatten;
pub use input::Input;
pub use lambda::{Lambda, LambdaFn};
pub use layer::AnyLayer;
pub use loss::{accuracy, CrossEntropy, Loss};
pub use optim::{MomentumSgd, Optimizer, OptimizerFactory, Sgd};
pub use sequential::{EpochStats, History, Sequential};

/// Input and output shape a layer was initialised with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeBinding {
    pub input: Shape,
    pub output: Shape,
}

impl ShapeBinding {
    pub fn new(input: Shape, output: Shape) -> Self {
        Self { input, output }
    }

    /// Binding for layers whose output shape equals their input shape
    pub fn same(shape: &Shape) -> Self {
        Self::new(shape.clone(), shape.clone())
    }
}

/// Training/inference contract shared by every layer.
///
/// A layer goes through `init` once, then repeatedly through
/// `forward` → `backward` → `update` while training. `call` is the
/// side-effect free inference path and may run at any time after `init`.
pub trait Layer: Send {
    /// Short type name used in logs, errors and the model summary
    fn name(&self) -> &'static str;

    fn binding(&self) -> Option<&ShapeBinding>;

    fn input_shape(&self) -> Option<&Shape> {
        self.binding().map(|b| &b.input)
    }

    fn output_shape(&self) -> Option<&Shape> {
        self.binding().map(|b| &b.output)
    }

    /// Validate `input_shape`, allocate parameters and their optimizers, and
    /// return the output shape.
    fn init(&mut self, input_shape: &Shape, factory: &OptimizerFactory, rng: &mut StdRng) -> Result<Shape>;

    /// Inference pass. Caches nothing.
    fn call(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>>;

    /// Training pass. Same values as `call`, plus whatever `backward` needs.
    fn forward(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>>;

    /// Consume the cache of the preceding `forward` and return the gradient
    /// with respect to this layer's inputs.
    fn backward(&mut self, douts: &[Tensor]) -> Result<Vec<Tensor>>;

    /// Apply the gradients cached by `backward`
    fn update(&mut self) -> Result<()> {
        Ok(())
    }

    /// Trainable parameter tensors
    fn params(&self) -> Vec<&Tensor> {
        Vec::new()
    }
}

/// Run `f` on every sample in parallel, keeping batch order
pub(crate) fn per_sample<F>(inputs: &[Tensor], f: F) -> Result<Vec<Tensor>>
where
    F: Fn(&Tensor) -> Result<Tensor> + Sync + Send,
{
    inputs.par_iter().map(f).collect()
}

/// Run `f` on aligned pairs of samples in parallel
pub(crate) fn per_sample_pair<A, B, T, F>(left: &[A], right: &[B], f: F) -> Result<Vec<T>>
where
    A: Sync,
    B: Sync,
    T: Send,
    F: Fn(&A, &B) -> Result<T> + Sync + Send,
{
    check_batch(left.len(), right.len())?;
    left.par_iter()
        .zip(right.par_iter())
        .map(|(a, b)| f(a, b))
        .collect()
}

/// Binding recorded by `init`, or a missing-init error naming the layer
pub(crate) fn bound<'a>(
    binding: Option<&'a ShapeBinding>,
    layer: &'static str,
    operation: &'static str,
) -> Result<&'a ShapeBinding> {
    binding.ok_or_else(|| Error::missing(layer, operation, "init"))
}

/// Every sample must have exactly `expected`; equal element counts are not enough
pub(crate) fn check_samples(samples: &[Tensor], expected: &Shape) -> Result<()> {
    match samples.iter().find(|s| s.shape() != expected) {
        Some(sample) => Err(Error::ShapeMismatch {
            left: sample.shape().clone(),
            right: expected.clone(),
        }),
        None => Ok(()),
    }
}

pub(crate) fn check_batch(left: usize, right: usize) -> Result<()> {
    if left != right {
        return Err(Error::BatchMismatch { left, right });
    }
    Ok(())
}

/// Zero the positions where `mask` is set
pub(crate) fn apply_mask(tensor: &Tensor, mask: &[bool]) -> Result<Tensor> {
    if mask.len() != tensor.numel() {
        return Err(Error::LengthMismatch {
            shape: tensor.shape().clone(),
            expected: tensor.numel(),
            actual: mask.len(),
        });
    }

    let data = tensor
        .data()
        .iter()
        .zip(mask)
        .map(|(&x, &masked)| if masked { 0.0 } else { x })
        .collect();

    Tensor::from_values(tensor.shape().clone(), data)
}

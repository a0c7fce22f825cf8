//! Loss functions and the accuracy metric

use rayon::prelude::*;

use super::{check_batch, per_sample_pair};
use crate::error::{Error, Result};
use crate::tensor::{ops, Tensor};

/// Mean cross-entropy over a batch of probability vectors
#[derive(Debug, Clone, Default)]
pub struct CrossEntropy {
    cache: Option<(Vec<Tensor>, Vec<Tensor>)>,
}

impl CrossEntropy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Formula: mean over samples of -sum(t * ln(y + eps))
    pub fn call(&self, predictions: &[Tensor], targets: &[Tensor]) -> Result<f64> {
        check_batch(predictions.len(), targets.len())?;
        if predictions.is_empty() {
            return Err(Error::EmptyBatch);
        }

        let total = predictions
            .par_iter()
            .zip(targets.par_iter())
            .map(|(y, t)| ops::cross_entropy(y, t))
            .sum::<Result<f64>>()?;

        Ok(total / predictions.len() as f64)
    }

    /// Same value as `call`; keeps both batches for `backward`
    pub fn forward(&mut self, predictions: &[Tensor], targets: &[Tensor]) -> Result<f64> {
        let loss = self.call(predictions, targets)?;
        self.cache = Some((predictions.to_vec(), targets.to_vec()));
        Ok(loss)
    }

    /// Gradient -t / y per sample.
    ///
    /// Not divided by the batch size; [`Dense`](super::Dense) averages its
    /// parameter gradients instead.
    pub fn backward(&mut self) -> Result<Vec<Tensor>> {
        let (predictions, targets) = self
            .cache
            .take()
            .ok_or_else(|| Error::missing("CrossEntropy", "backward", "forward"))?;
        per_sample_pair(&predictions, &targets, |y, t| Ok(t.div(y)?.mul_scalar(-1.0)))
    }
}

/// Loss selected when building a model
#[derive(Debug, Clone)]
pub enum Loss {
    CrossEntropy(CrossEntropy),
}

impl Loss {
    pub fn cross_entropy() -> Self {
        Loss::CrossEntropy(CrossEntropy::new())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Loss::CrossEntropy(_) => "CrossEntropy",
        }
    }

    pub fn call(&self, predictions: &[Tensor], targets: &[Tensor]) -> Result<f64> {
        match self {
            Loss::CrossEntropy(l) => l.call(predictions, targets),
        }
    }

    pub fn forward(&mut self, predictions: &[Tensor], targets: &[Tensor]) -> Result<f64> {
        match self {
            Loss::CrossEntropy(l) => l.forward(predictions, targets),
        }
    }

    pub fn backward(&mut self) -> Result<Vec<Tensor>> {
        match self {
            Loss::CrossEntropy(l) => l.backward(),
        }
    }
}

impl Default for Loss {
    fn default() -> Self {
        Loss::cross_entropy()
    }
}

/// Fraction of samples whose predicted argmax equals the target argmax
pub fn accuracy(predictions: &[Tensor], targets: &[Tensor]) -> Result<f64> {
    check_batch(predictions.len(), targets.len())?;
    if predictions.is_empty() {
        return Err(Error::EmptyBatch);
    }

    let hits = per_sample_pair(predictions, targets, |y, t| Ok(y.argmax()? == t.argmax()?))?
        .into_iter()
        .filter(|&hit| hit)
        .count();

    Ok(hits as f64 / predictions.len() as f64)
}

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

use super::{apply_mask, bound, check_batch, check_samples, Layer, OptimizerFactory, ShapeBinding};
use crate::error::{Error, Result};
use crate::tensor::{Shape, Tensor};

/// Zeroes a random subset of positions in every training sample.
///
/// The number of zeroed positions per sample is `floor(units * (1 - rate))`,
/// so a larger `rate` zeroes *fewer* positions. Inference (`call`) is the
/// identity.
#[derive(Debug, Clone)]
pub struct Dropout {
    rate: f64,
    binding: Option<ShapeBinding>,
    rng: Option<StdRng>,
    masks: Option<Vec<Vec<bool>>>,
}

impl Dropout {
    pub fn new(rate: f64) -> Self {
        Self {
            rate,
            binding: None,
            rng: None,
            masks: None,
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Number of positions zeroed in each sample of `units` elements
    pub fn masked_count(&self, units: usize) -> usize {
        (units as f64 * (1.0 - self.rate)).floor() as usize
    }

    /// Masks recorded by the last `forward`; `true` marks a zeroed position
    pub fn masks(&self) -> Option<&[Vec<bool>]> {
        self.masks.as_deref()
    }
}

impl Layer for Dropout {
    fn name(&self) -> &'static str {
        "Dropout"
    }

    fn binding(&self) -> Option<&ShapeBinding> {
        self.binding.as_ref()
    }

    fn init(&mut self, input_shape: &Shape, _: &OptimizerFactory, rng: &mut StdRng) -> Result<Shape> {
        if !(0.0..=1.0).contains(&self.rate) {
            return Err(Error::InvalidConfig(format!(
                "dropout rate must be within [0, 1], got {}",
                self.rate
            )));
        }

        self.binding = Some(ShapeBinding::same(input_shape));
        self.rng = Some(StdRng::seed_from_u64(rng.gen()));
        self.masks = None;
        Ok(input_shape.clone())
    }

    fn call(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        check_samples(inputs, &bound(self.binding(), "Dropout", "call")?.input)?;
        Ok(inputs.to_vec())
    }

    fn forward(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        let input = &bound(self.binding(), "Dropout", "forward")?.input;
        check_samples(inputs, input)?;
        let units = input.elements();
        let masked = self.masked_count(units);
        let rng = self
            .rng
            .as_mut()
            .ok_or_else(|| Error::missing("Dropout", "forward", "init"))?;

        // Sampling stays sequential so a seeded model draws the same masks
        let mut masks = Vec::with_capacity(inputs.len());
        let mut outputs = Vec::with_capacity(inputs.len());
        for input in inputs {
            let mut mask = vec![false; units];
            for i in index::sample(&mut *rng, units, masked) {
                mask[i] = true;
            }
            outputs.push(apply_mask(input, &mask)?);
            masks.push(mask);
        }

        self.masks = Some(masks);
        Ok(outputs)
    }

    fn backward(&mut self, douts: &[Tensor]) -> Result<Vec<Tensor>> {
        let masks = self
            .masks
            .take()
            .ok_or_else(|| Error::missing("Dropout", "backward", "forward"))?;
        check_batch(douts.len(), masks.len())?;
        check_samples(douts, &bound(self.binding(), "Dropout", "backward")?.output)?;

        douts
            .iter()
            .zip(&masks)
            .map(|(dout, mask)| apply_mask(dout, mask))
            .collect()
    }
}

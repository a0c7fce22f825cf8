use rand::rngs::StdRng;
use tracing::instrument;

use super::{check_samples, per_sample, per_sample_pair, Layer, Optimizer, OptimizerFactory, ShapeBinding};
use crate::error::{Error, Result};
use crate::tensor::{Shape, Tensor};

/// Upper bound of the uniform weight initialisation
const INIT_SCALE: f64 = 0.01;

/// Per-sample parameter gradients cached by [`Dense::backward`]
#[derive(Debug, Clone, PartialEq)]
pub struct DenseGrads {
    pub weight: Vec<Tensor>,
    pub bias: Vec<Tensor>,
}

#[derive(Debug, Clone)]
struct DenseParams {
    binding: ShapeBinding,
    weight: Tensor,
    bias: Tensor,
    opt_weight: Optimizer,
    opt_bias: Optimizer,
}

/// Fully-connected layer: y = x W + b, per sample
///
/// `weight` has shape `(input_units, units)` and `bias` has shape `(units,)`.
#[derive(Debug, Clone)]
pub struct Dense {
    units: usize,
    initial: Option<(Tensor, Tensor)>,
    params: Option<DenseParams>,
    inputs: Option<Vec<Tensor>>,
    grads: Option<DenseGrads>,
}

impl Dense {
    /// Weights are drawn uniformly from `[0, 0.01)` at init, bias starts at zero
    pub fn new(units: usize) -> Self {
        Self {
            units,
            initial: None,
            params: None,
            inputs: None,
            grads: None,
        }
    }

    /// Start from known parameters instead of random ones
    pub fn with_weights(weight: Tensor, bias: Tensor) -> Result<Self> {
        if weight.rank() != 2 {
            return Err(Error::RankMismatch {
                expected: 2,
                actual: weight.rank(),
            });
        }
        let units = weight.shape()[1];
        if bias.shape() != &Shape::from([units]) {
            return Err(Error::ShapeMismatch {
                left: bias.shape().clone(),
                right: Shape::from([units]),
            });
        }

        Ok(Self {
            initial: Some((weight, bias)),
            ..Self::new(units)
        })
    }

    pub fn units(&self) -> usize {
        self.units
    }

    pub fn weight(&self) -> Option<&Tensor> {
        self.params.as_ref().map(|p| &p.weight)
    }

    pub fn bias(&self) -> Option<&Tensor> {
        self.params.as_ref().map(|p| &p.bias)
    }

    /// Gradients from the last `backward`, until `update` consumes them
    pub fn gradients(&self) -> Option<&DenseGrads> {
        self.grads.as_ref()
    }

    fn initialised(&self, operation: &'static str) -> Result<&DenseParams> {
        self.params
            .as_ref()
            .ok_or_else(|| Error::missing("Dense", operation, "init"))
    }

    fn affine(params: &DenseParams, x: &Tensor) -> Result<Tensor> {
        if x.shape() != &params.binding.input {
            return Err(Error::ShapeMismatch {
                left: x.shape().clone(),
                right: params.binding.input.clone(),
            });
        }

        let input_units = params.binding.input[0];
        x.reshape([1, input_units])?
            .dot(&params.weight)?
            .reshape(&params.binding.output)?
            .add(&params.bias)
    }
}

impl Layer for Dense {
    fn name(&self) -> &'static str {
        "Dense"
    }

    fn binding(&self) -> Option<&ShapeBinding> {
        self.params.as_ref().map(|p| &p.binding)
    }

    fn init(&mut self, input_shape: &Shape, factory: &OptimizerFactory, rng: &mut StdRng) -> Result<Shape> {
        if input_shape.rank() != 1 {
            return Err(Error::RankMismatch {
                expected: 1,
                actual: input_shape.rank(),
            });
        }

        let output = Shape::from([self.units]);
        let weight_shape = Shape::from([input_shape[0], self.units]);

        let (weight, bias) = match &self.initial {
            Some((weight, bias)) => {
                if weight.shape() != &weight_shape {
                    return Err(Error::ShapeMismatch {
                        left: weight.shape().clone(),
                        right: weight_shape,
                    });
                }
                (weight.clone(), bias.clone())
            }
            None => (
                Tensor::uniform(&weight_shape, 0.0, INIT_SCALE, rng),
                Tensor::zeros(&output),
            ),
        };

        self.params = Some(DenseParams {
            binding: ShapeBinding::new(input_shape.clone(), output.clone()),
            opt_weight: factory.create(&weight_shape),
            opt_bias: factory.create(&output),
            weight,
            bias,
        });
        self.inputs = None;
        self.grads = None;

        Ok(output)
    }

    fn call(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        let params = self.initialised("call")?;
        per_sample(inputs, |x| Self::affine(params, x))
    }

    #[instrument(level = "debug", skip_all, fields(batch = inputs.len(), units = self.units))]
    fn forward(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        let outputs = self.call(inputs)?;
        self.inputs = Some(inputs.to_vec());
        Ok(outputs)
    }

    #[instrument(level = "debug", skip_all, fields(batch = douts.len(), units = self.units))]
    fn backward(&mut self, douts: &[Tensor]) -> Result<Vec<Tensor>> {
        let params = self
            .params
            .as_ref()
            .ok_or_else(|| Error::missing("Dense", "backward", "init"))?;
        check_samples(douts, &params.binding.output)?;
        let inputs = self
            .inputs
            .take()
            .ok_or_else(|| Error::missing("Dense", "backward", "forward"))?;

        let input_units = params.binding.input[0];
        let weight_t = params.weight.transpose()?;

        let per_sample_grads = per_sample_pair(douts, &inputs, |dout, input| {
            let db = dout.clone();
            let dout = dout.reshape([1, self.units])?;
            let dx = dout.dot(&weight_t)?.reshape([input_units])?;
            let dw = input.reshape([1, input_units])?.transpose()?.dot(&dout)?;
            Ok((dx, dw, db))
        })?;

        let mut dxs = Vec::with_capacity(per_sample_grads.len());
        let mut grads = DenseGrads {
            weight: Vec::with_capacity(per_sample_grads.len()),
            bias: Vec::with_capacity(per_sample_grads.len()),
        };
        for (dx, dw, db) in per_sample_grads {
            dxs.push(dx);
            grads.weight.push(dw);
            grads.bias.push(db);
        }
        self.grads = Some(grads);

        Ok(dxs)
    }

    /// Average the per-sample gradients over the batch and step both optimizers
    fn update(&mut self) -> Result<()> {
        let grads = self
            .grads
            .take()
            .ok_or_else(|| Error::missing("Dense", "update", "backward"))?;
        let params = self
            .params
            .as_mut()
            .ok_or_else(|| Error::missing("Dense", "update", "init"))?;

        let batch = grads.weight.len();
        if batch == 0 {
            return Err(Error::EmptyBatch);
        }

        let dw = mean(&grads.weight, params.weight.shape())?;
        let db = mean(&grads.bias, params.bias.shape())?;
        params.weight = params.opt_weight.update(&params.weight, &dw)?;
        params.bias = params.opt_bias.update(&params.bias, &db)?;

        Ok(())
    }

    fn params(&self) -> Vec<&Tensor> {
        match &self.params {
            Some(p) => vec![&p.weight, &p.bias],
            None => Vec::new(),
        }
    }
}

fn mean(grads: &[Tensor], shape: &Shape) -> Result<Tensor> {
    let mut sum = Tensor::zeros(shape);
    for g in grads {
        sum = sum.add(g)?;
    }
    Ok(sum.div_scalar(grads.len() as f64))
}

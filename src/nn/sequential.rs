use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rayon::ThreadPool;
use tracing::{debug, info, instrument, warn};

use super::{accuracy, check_batch, AnyLayer, Input, Layer, Loss, OptimizerFactory};
use crate::config::ModelConfig;
use crate::error::{Error, Result};
use crate::tensor::{Shape, Tensor};

/// Metrics of one training epoch, measured on the full training set
#[derive(Debug, Clone, PartialEq)]
pub struct EpochStats {
    /// Zero-based epoch number
    pub epoch: usize,
    pub loss: f64,
    pub accuracy: f64,
    pub elapsed: Duration,
}

/// Per-epoch record returned by [`Sequential::fit`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    pub epochs: Vec<EpochStats>,
}

impl History {
    pub fn losses(&self) -> Vec<f64> {
        self.epochs.iter().map(|e| e.loss).collect()
    }

    pub fn accuracies(&self) -> Vec<f64> {
        self.epochs.iter().map(|e| e.accuracy).collect()
    }

    pub fn last(&self) -> Option<&EpochStats> {
        self.epochs.last()
    }
}

#[derive(Debug, Clone)]
struct Compiled {
    loss: Loss,
    factory: OptimizerFactory,
}

/// A linear stack of layers trained with minibatch gradient descent.
///
/// The model starts with an [`Input`] layer bound to the sample shape given at
/// construction. Layers are appended with [`add_layer`](Self::add_layer) and
/// wired together by [`build`](Self::build); only a built model can train or
/// predict.
pub struct Sequential {
    input_shape: Shape,
    layers: Vec<AnyLayer>,
    compiled: Option<Compiled>,
    rng: StdRng,
    config: ModelConfig,
    pool: Option<ThreadPool>,
}

impl Sequential {
    /// Model configured from the environment, see [`ModelConfig::from_env`]
    pub fn new(input_shape: impl Into<Shape>) -> Self {
        Self::with_config(input_shape, ModelConfig::default())
    }

    pub fn with_config(input_shape: impl Into<Shape>, config: ModelConfig) -> Self {
        Self {
            input_shape: input_shape.into(),
            layers: vec![Input::new().into()],
            compiled: None,
            rng: config.rng(),
            config,
            pool: None,
        }
    }

    /// Append a layer. A built model goes back to unbuilt.
    pub fn add_layer(&mut self, layer: impl Into<AnyLayer>) -> &mut Self {
        self.layers.push(layer.into());
        self.compiled = None;
        self
    }

    pub fn layers(&self) -> &[AnyLayer] {
        &self.layers
    }

    pub fn input_shape(&self) -> &Shape {
        &self.input_shape
    }

    /// Shape of one prediction, once built
    pub fn output_shape(&self) -> Option<&Shape> {
        self.compiled.as_ref()?;
        self.layers.last().and_then(|l| l.output_shape())
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Optimizer factory the model was built with
    pub fn optimizer(&self) -> Option<&OptimizerFactory> {
        self.compiled.as_ref().map(|c| &c.factory)
    }

    pub fn is_built(&self) -> bool {
        self.compiled.is_some()
    }

    pub fn param_count(&self) -> usize {
        self.layers.iter().map(|l| l.param_count()).sum()
    }

    /// Initialise every layer in order, feeding each output shape into the
    /// next layer.
    ///
    /// On failure the model keeps its previous state and the error names the
    /// first layer that rejected its input shape.
    #[instrument(skip_all, fields(input = %self.input_shape, loss = loss.name(), optimizer = %factory))]
    pub fn build(&mut self, loss: Loss, factory: OptimizerFactory) -> Result<()> {
        let mut layers = self.layers.clone();
        let mut rng = self.rng.clone();
        let mut shape = self.input_shape.clone();

        for (index, layer) in layers.iter_mut().enumerate() {
            shape = layer
                .init(&shape, &factory, &mut rng)
                .map_err(|source| Error::Build {
                    index,
                    layer: layer.name(),
                    source: Box::new(source),
                })?;
        }
        let pool = self.config.thread_pool()?;

        self.layers = layers;
        self.rng = rng;
        self.pool = pool;
        self.compiled = Some(Compiled { loss, factory });

        info!(
            layers = self.layers.len(),
            params = self.param_count(),
            output = %shape,
            "model built"
        );
        Ok(())
    }

    fn compiled(&self) -> Result<&Compiled> {
        self.compiled.as_ref().ok_or(Error::NotBuilt)
    }

    /// Inference pass through every layer; nothing is cached
    pub fn predict(&self, x: &[Tensor]) -> Result<Vec<Tensor>> {
        self.compiled()?;
        let layers = &self.layers;
        install(self.pool.as_ref(), || {
            let mut outputs: Option<Vec<Tensor>> = None;
            for layer in layers {
                outputs = Some(layer.call(outputs.as_deref().unwrap_or(x))?);
            }
            Ok(outputs.unwrap_or_else(|| x.to_vec()))
        })
    }

    /// Loss of predictions `y` against targets `t`, using the built loss
    pub fn loss(&self, y: &[Tensor], t: &[Tensor]) -> Result<f64> {
        let compiled = self.compiled()?;
        install(self.pool.as_ref(), || compiled.loss.call(y, t))
    }

    /// Fraction of predictions `y` whose argmax matches the targets `t`
    pub fn accuracy(&self, y: &[Tensor], t: &[Tensor]) -> Result<f64> {
        self.compiled()?;
        install(self.pool.as_ref(), || accuracy(y, t))
    }

    /// Predict `x` and score it against `t`, returning `(loss, accuracy)`
    pub fn evaluate(&self, x: &[Tensor], t: &[Tensor]) -> Result<(f64, f64)> {
        check_batch(x.len(), t.len())?;
        let y = self.predict(x)?;
        Ok((self.loss(&y, t)?, self.accuracy(&y, t)?))
    }

    /// One forward/backward/update cycle; returns the batch loss and the
    /// accuracy of the predictions made before the update
    pub fn train_batch(&mut self, x: &[Tensor], t: &[Tensor]) -> Result<(f64, f64)> {
        check_batch(x.len(), t.len())?;
        if x.is_empty() {
            return Err(Error::EmptyBatch);
        }

        let compiled = self.compiled.as_mut().ok_or(Error::NotBuilt)?;
        let layers = &mut self.layers;
        install(self.pool.as_ref(), || {
            let mut outputs: Option<Vec<Tensor>> = None;
            for layer in layers.iter_mut() {
                outputs = Some(layer.forward(outputs.as_deref().unwrap_or(x))?);
            }
            let y = outputs.unwrap_or_else(|| x.to_vec());

            let loss = compiled.loss.forward(&y, t)?;
            let batch_accuracy = accuracy(&y, t)?;
            let mut grads = compiled.loss.backward()?;
            for layer in layers.iter_mut().rev() {
                grads = layer.backward(&grads)?;
                layer.update()?;
            }
            Ok((loss, batch_accuracy))
        })
    }

    /// Train for `epochs` passes over `x`/`t` in consecutive batches of
    /// `batch_size`. A trailing partial batch is skipped.
    ///
    /// After every epoch the whole training set is evaluated and recorded.
    pub fn fit(&mut self, x: &[Tensor], t: &[Tensor], epochs: usize, batch_size: usize) -> Result<History> {
        self.compiled()?;
        check_batch(x.len(), t.len())?;
        if x.is_empty() {
            return Err(Error::EmptyBatch);
        }
        if batch_size == 0 {
            return Err(Error::InvalidConfig("batch size must be positive".to_string()));
        }

        let steps = x.len() / batch_size;
        if steps == 0 {
            warn!(samples = x.len(), batch_size, "batch size exceeds training set, no step will run");
        }

        let mut history = History::default();
        for epoch in 0..epochs {
            let start = Instant::now();
            for (step, (xb, tb)) in x.chunks_exact(batch_size).zip(t.chunks_exact(batch_size)).enumerate() {
                let (loss, accuracy) = self.train_batch(xb, tb)?;
                debug!(epoch, step, steps, loss, accuracy, "batch");
            }

            let (loss, accuracy) = self.evaluate(x, t)?;
            let elapsed = start.elapsed();
            info!(epoch, loss, accuracy, elapsed_secs = elapsed.as_secs_f64(), "epoch");
            history.epochs.push(EpochStats {
                epoch,
                loss,
                accuracy,
                elapsed,
            });
        }

        Ok(history)
    }

    /// Table of layers with their output shapes and parameter counts
    pub fn summary(&self) -> String {
        let rule = "=".repeat(52);
        let rows: String = self
            .layers
            .iter()
            .map(|layer| {
                let shape = layer
                    .output_shape()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "?".to_string());
                format!("{:<20}{:<20}{:>12}\n", layer.name(), shape, layer.param_count())
            })
            .collect();

        format!(
            "{:<20}{:<20}{:>12}\n{rule}\n{rows}{rule}\nTotal params: {total}\n",
            "Layer (type)",
            "Output Shape",
            "Param #",
            rule = rule,
            rows = rows,
            total = self.param_count(),
        )
    }
}

fn install<R, F>(pool: Option<&ThreadPool>, op: F) -> R
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    match pool {
        Some(pool) => pool.install(op),
        None => op(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{Dense, Dropout, Flatten, ReLU, Softmax};

    fn one_hot(class: usize, k: usize) -> Tensor {
        let mut t = Tensor::zeros([k]);
        t.set(1.0, &[class]).unwrap();
        t
    }

    fn model(input: &[usize]) -> Sequential {
        Sequential::with_config(input.to_vec(), ModelConfig::seeded(11))
    }

    // ========================================================================
    // Build
    // ========================================================================

    #[test]
    fn test_build_propagates_shapes() {
        let mut m = model(&[4, 3]);
        m.add_layer(Flatten::new()).add_layer(Dense::new(5)).add_layer(ReLU::new());
        assert!(!m.is_built());
        assert_eq!(m.output_shape(), None);

        m.build(Loss::cross_entropy(), OptimizerFactory::sgd(0.1)).unwrap();
        assert!(m.is_built());
        assert_eq!(m.optimizer(), Some(&OptimizerFactory::sgd(0.1)));
        assert_eq!(m.layers().len(), 4);
        assert_eq!(m.layers()[1].output_shape(), Some(&Shape::from([12])));
        assert_eq!(m.output_shape(), Some(&Shape::from([5])));
        assert_eq!(m.param_count(), 12 * 5 + 5);
    }

    #[test]
    fn test_build_error_names_layer() {
        let mut m = model(&[2, 2]);
        m.add_layer(Softmax::new());
        let err = m.build(Loss::cross_entropy(), OptimizerFactory::sgd(0.1)).unwrap_err();
        match err {
            Error::Build { index, layer, source } => {
                assert_eq!(index, 1);
                assert_eq!(layer, "Softmax");
                assert_eq!(*source, Error::RankMismatch { expected: 1, actual: 2 });
            }
            other => panic!("expected build error, got {:?}", other),
        }
        assert!(!m.is_built());
        assert!(m.layers()[0].binding().is_none());
        assert_eq!(m.predict(&[Tensor::zeros([2, 2])]), Err(Error::NotBuilt));
    }

    #[test]
    fn test_add_layer_unbuilds() {
        let mut m = model(&[3]);
        m.add_layer(Dense::new(2));
        m.build(Loss::cross_entropy(), OptimizerFactory::sgd(0.1)).unwrap();
        m.add_layer(Softmax::new());
        assert!(!m.is_built());
        assert!(matches!(m.fit(&[Tensor::zeros([3])], &[one_hot(0, 2)], 1, 1), Err(Error::NotBuilt)));
    }

    #[test]
    fn test_same_seed_same_weights() {
        let build = || {
            let mut m = model(&[3]);
            m.add_layer(Dense::new(2));
            m.build(Loss::cross_entropy(), OptimizerFactory::sgd(0.1)).unwrap();
            m
        };
        let (a, b) = (build(), build());
        assert_eq!(a.layers()[1].params(), b.layers()[1].params());
    }

    // ========================================================================
    // Predict / evaluate
    // ========================================================================

    #[test]
    fn test_predict_known_weights() {
        let weight = Tensor::from_values([2, 2], vec![1.0, 0.0, 0.0, 1.0]).unwrap();
        let mut m = model(&[2]);
        m.add_layer(Dense::with_weights(weight, Tensor::zeros([2])).unwrap())
            .add_layer(Softmax::new());
        m.build(Loss::cross_entropy(), OptimizerFactory::sgd(0.1)).unwrap();

        let x = vec![
            Tensor::from_values([2], vec![3.0, 0.0]).unwrap(),
            Tensor::from_values([2], vec![0.0, 3.0]).unwrap(),
        ];
        let y = m.predict(&x).unwrap();
        assert_eq!(y[0].argmax().unwrap(), 0);
        assert_eq!(y[1].argmax().unwrap(), 1);

        let (loss, acc) = m.evaluate(&x, &[one_hot(0, 2), one_hot(1, 2)]).unwrap();
        assert!(loss > 0.0 && loss < 0.1);
        assert_eq!(acc, 1.0);
    }

    #[test]
    fn test_predict_does_not_cache() {
        let mut m = model(&[2]);
        m.add_layer(Dense::new(2));
        m.build(Loss::cross_entropy(), OptimizerFactory::sgd(0.1)).unwrap();
        m.predict(&[Tensor::zeros([2])]).unwrap();
        match &m.layers()[1] {
            AnyLayer::Dense(d) => assert!(d.gradients().is_none()),
            other => panic!("expected dense layer, got {:?}", other),
        }
    }

    #[test]
    fn test_predict_rejects_sample_of_other_shape() {
        let mut m = model(&[4]);
        m.add_layer(Dense::new(3)).add_layer(Softmax::new());
        m.build(Loss::cross_entropy(), OptimizerFactory::sgd(0.1)).unwrap();

        assert_eq!(
            m.predict(&[Tensor::full([2, 2], 1.0)]),
            Err(Error::ShapeMismatch {
                left: Shape::from([2, 2]),
                right: Shape::from([4]),
            })
        );

        let before: Vec<Tensor> = m.layers()[1].params().into_iter().cloned().collect();
        let x = vec![Tensor::full([4, 1], 1.0); 2];
        let t = vec![one_hot(0, 3); 2];
        assert!(matches!(m.fit(&x, &t, 1, 2), Err(Error::ShapeMismatch { .. })));
        let after: Vec<Tensor> = m.layers()[1].params().into_iter().cloned().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_scoring_requires_build() {
        let m = model(&[2]);
        let y = vec![one_hot(0, 2)];
        assert_eq!(m.loss(&y, &y), Err(Error::NotBuilt));
        assert_eq!(m.accuracy(&y, &y), Err(Error::NotBuilt));
    }

    // ========================================================================
    // Fit
    // ========================================================================

    #[test]
    fn test_fit_records_every_epoch() {
        let mut m = model(&[2]);
        m.add_layer(Dense::new(2)).add_layer(Softmax::new());
        m.build(Loss::cross_entropy(), OptimizerFactory::sgd(0.5)).unwrap();

        let x: Vec<Tensor> = (0..8)
            .map(|i| Tensor::from_values([2], vec![(i % 2) as f64, ((i + 1) % 2) as f64]).unwrap())
            .collect();
        let t: Vec<Tensor> = (0..8).map(|i| one_hot(i % 2, 2)).collect();

        let history = m.fit(&x, &t, 5, 4).unwrap();
        assert_eq!(history.epochs.len(), 5);
        assert_eq!(history.epochs.iter().map(|e| e.epoch).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
        let losses = history.losses();
        assert!(losses[4] < losses[0]);
    }

    #[test]
    fn test_fit_skips_partial_batch() {
        let mut m = model(&[2]);
        m.add_layer(Dense::new(2)).add_layer(Softmax::new());
        m.build(Loss::cross_entropy(), OptimizerFactory::sgd(0.5)).unwrap();
        let before: Vec<Tensor> = m.layers()[1].params().into_iter().cloned().collect();

        let x = vec![Tensor::full([2], 1.0); 3];
        let t = vec![one_hot(0, 2); 3];
        m.fit(&x, &t, 2, 4).unwrap();

        let after: Vec<Tensor> = m.layers()[1].params().into_iter().cloned().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        let mut m = model(&[2]);
        m.add_layer(Dense::new(2)).add_layer(Softmax::new());
        m.build(Loss::cross_entropy(), OptimizerFactory::sgd(0.5)).unwrap();

        assert_eq!(m.fit(&[], &[], 1, 1), Err(Error::EmptyBatch));
        assert_eq!(
            m.fit(&[Tensor::zeros([2])], &[], 1, 1),
            Err(Error::BatchMismatch { left: 1, right: 0 })
        );
        assert!(matches!(
            m.fit(&[Tensor::zeros([2])], &[one_hot(0, 2)], 1, 0),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_training_with_dropout_and_pool() {
        let config = ModelConfig::seeded(5).with_num_threads(2);
        let mut m = Sequential::with_config([4], config);
        m.add_layer(Dense::new(8))
            .add_layer(ReLU::new())
            .add_layer(Dropout::new(0.75))
            .add_layer(Dense::new(2))
            .add_layer(Softmax::new());
        m.build(Loss::cross_entropy(), OptimizerFactory::momentum(0.1, 0.9)).unwrap();

        let x = vec![Tensor::full([4], 0.5); 6];
        let t = vec![one_hot(1, 2); 6];
        let history = m.fit(&x, &t, 3, 3).unwrap();
        assert!(history.losses().iter().all(|l| l.is_finite()));
    }

    // ========================================================================
    // Summary
    // ========================================================================

    #[test]
    fn test_summary() {
        let mut m = model(&[28, 28]);
        m.add_layer(Flatten::new()).add_layer(Dense::new(64));
        m.build(Loss::cross_entropy(), OptimizerFactory::sgd(0.1)).unwrap();

        let summary = m.summary();
        assert!(summary.contains("Input"));
        assert!(summary.contains("(28, 28)"));
        assert!(summary.contains("(784,)"));
        assert!(summary.contains("50240"));
        assert!(summary.contains("Total params: 50240"));
        assert_eq!(summary.lines().count(), 2 + 3 + 2);
        assert!(summary.lines().nth(3).unwrap().starts_with("Flatten"));
    }
}

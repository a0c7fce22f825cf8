//! End-to-end training on a linearly separable two-class problem

use tengor::{Dense, Loss, ModelConfig, OptimizerFactory, Sequential, Softmax, Tensor};

const CLASSES: usize = 4;

fn one_hot(class: usize) -> Tensor {
    let mut t = Tensor::zeros([CLASSES]);
    t.set(1.0, &[class]).unwrap();
    t
}

/// Grid over the unit square labelled by `x0 > x1`, with a margin around the
/// diagonal and the two classes interleaved
fn dataset() -> (Vec<Tensor>, Vec<Tensor>) {
    let n = 15;
    let mut above = Vec::new();
    let mut below = Vec::new();
    for i in 0..n {
        for j in 0..n {
            let x0 = i as f64 / (n - 1) as f64;
            let x1 = j as f64 / (n - 1) as f64;
            if (x0 - x1).abs() < 0.15 {
                continue;
            }
            let x = Tensor::from_values([2], vec![x0, x1]).unwrap();
            if x0 > x1 {
                above.push((x, one_hot(1)));
            } else {
                below.push((x, one_hot(0)));
            }
        }
    }

    above
        .into_iter()
        .zip(below)
        .flat_map(|(a, b)| [a, b])
        .unzip()
}

fn model(factory: OptimizerFactory) -> Sequential {
    let mut model = Sequential::with_config([2], ModelConfig::seeded(42));
    model.add_layer(Dense::new(CLASSES)).add_layer(Softmax::new());
    model.build(Loss::cross_entropy(), factory).unwrap();
    model
}

#[test]
fn test_sgd_converges_monotonically() {
    let (x, t) = dataset();
    let mut model = model(OptimizerFactory::sgd(0.2));

    let history = model.fit(&x, &t, 40, 10).unwrap();
    let losses = history.losses();
    for pair in losses.windows(2) {
        assert!(pair[1] <= pair[0] + 1e-9, "loss increased: {:?}", pair);
    }

    let last = history.last().unwrap();
    assert!(last.accuracy > 0.9, "accuracy {}", last.accuracy);
    assert!(last.loss < losses[0]);
}

#[test]
fn test_momentum_converges() {
    let (x, t) = dataset();
    let mut model = model(OptimizerFactory::momentum(0.05, 0.9));

    let history = model.fit(&x, &t, 40, 10).unwrap();
    let (loss, accuracy) = model.evaluate(&x, &t).unwrap();
    assert!(accuracy > 0.9, "accuracy {}", accuracy);
    assert!(loss < history.epochs[0].loss);
}

#[test]
fn test_same_seed_same_history() {
    let (x, t) = dataset();
    let a = model(OptimizerFactory::sgd(0.2)).fit(&x, &t, 3, 10).unwrap();
    let b = model(OptimizerFactory::sgd(0.2)).fit(&x, &t, 3, 10).unwrap();
    assert_eq!(a.losses(), b.losses());
    assert_eq!(a.accuracies(), b.accuracies());
}

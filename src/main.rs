use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tengor::{
    Dense, Flatten, Loss, ModelConfig, OptimizerFactory, ReLU, Result, Sequential, Softmax, Tensor,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the optimizer, e.g. `momentum:0.1:0.9`
const OPTIMIZER_ENV: &str = "TENGOR_OPTIMIZER";

const CLASSES: usize = 10;
const SIDE: usize = 28;

/// Generate one-hot labelled images: class `c` lights up row band `c`
fn generate_data(n_samples: usize, rng: &mut StdRng) -> Result<(Vec<Tensor>, Vec<Tensor>)> {
    let band = SIDE / CLASSES;
    let mut images = Vec::with_capacity(n_samples);
    let mut labels = Vec::with_capacity(n_samples);

    for _ in 0..n_samples {
        let class = rng.gen_range(0..CLASSES);
        let mut image = Tensor::zeros([SIDE, SIDE]);
        for row in class * band..(class + 1) * band {
            for col in 0..SIDE {
                image.set(rng.gen_range(0.5..1.0), &[row, col])?;
            }
        }
        let mut label = Tensor::zeros([CLASSES]);
        label.set(1.0, &[class])?;

        images.push(image);
        labels.push(label);
    }

    Ok((images, labels))
}

fn run() -> Result<()> {
    let factory: OptimizerFactory = match std::env::args().nth(1).or_else(|| std::env::var(OPTIMIZER_ENV).ok()) {
        Some(raw) => raw.parse()?,
        None => OptimizerFactory::sgd(0.1),
    };
    let config = ModelConfig::from_env();
    let mut data_rng = StdRng::seed_from_u64(config.seed.unwrap_or(0));

    let mut model = Sequential::with_config([SIDE, SIDE], config);
    model
        .add_layer(Flatten::new())
        .add_layer(Dense::new(64))
        .add_layer(ReLU::new())
        .add_layer(Dense::new(CLASSES))
        .add_layer(Softmax::new());
    model.build(Loss::cross_entropy(), factory)?;
    println!("{}", model.summary());

    info!("generating synthetic data");
    let (x_train, t_train) = generate_data(600, &mut data_rng)?;
    let (x_test, t_test) = generate_data(100, &mut data_rng)?;

    let epochs = 5;
    let batch_size = 32;
    info!(epochs, batch_size, optimizer = %factory, "training");
    let history = model.fit(&x_train, &t_train, epochs, batch_size)?;

    if let Some(last) = history.last() {
        println!("train loss {:.4}, train accuracy {:.3}", last.loss, last.accuracy);
    }
    let (loss, accuracy) = model.evaluate(&x_test, &t_test)?;
    println!("test loss {:.4}, test accuracy {:.3}", loss, accuracy);

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run() {
        error!(%err, "training failed");
        std::process::exit(1);
    }
}

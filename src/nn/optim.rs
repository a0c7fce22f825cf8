use std::fmt;
use std::str::FromStr;

use tracing::instrument;

use crate::error::{Error, Result};
use crate::tensor::{Shape, Tensor};

/// Stochastic Gradient Descent
#[derive(Debug, Clone, PartialEq)]
pub struct Sgd {
    pub learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Self {
        Self { learning_rate }
    }

    /// Formula: param = param - learning_rate * grad
    pub fn update(&self, params: &Tensor, grads: &Tensor) -> Result<Tensor> {
        params.sub(&grads.mul_scalar(self.learning_rate))
    }
}

/// SGD with a velocity term that persists across steps
#[derive(Debug, Clone, PartialEq)]
pub struct MomentumSgd {
    pub learning_rate: f64,
    pub momentum: f64,
    velocity: Tensor,
}

impl MomentumSgd {
    /// Create an optimizer bound to a parameter of shape `shape`
    pub fn new(learning_rate: f64, momentum: f64, shape: &Shape) -> Self {
        Self {
            learning_rate,
            momentum,
            velocity: Tensor::zeros(shape),
        }
    }

    pub fn velocity(&self) -> &Tensor {
        &self.velocity
    }

    /// Formula: v = v * momentum - grad * learning_rate; param = param + v
    pub fn update(&mut self, params: &Tensor, grads: &Tensor) -> Result<Tensor> {
        let velocity = self
            .velocity
            .mul_scalar(self.momentum)
            .sub(&grads.mul_scalar(self.learning_rate))?;
        let updated = params.add(&velocity)?;
        self.velocity = velocity;
        Ok(updated)
    }
}

/// Update rule for a single parameter tensor.
///
/// One instance exists per trainable tensor, so per-parameter state such as
/// the momentum velocity survives between batches.
#[derive(Debug, Clone, PartialEq)]
pub enum Optimizer {
    Sgd(Sgd),
    Momentum(MomentumSgd),
}

impl Optimizer {
    /// Return the updated parameters. Neither input is modified.
    pub fn update(&mut self, params: &Tensor, grads: &Tensor) -> Result<Tensor> {
        match self {
            Optimizer::Sgd(sgd) => sgd.update(params, grads),
            Optimizer::Momentum(momentum) => momentum.update(params, grads),
        }
    }
}

/// Creates one [`Optimizer`] per trainable parameter at build time
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptimizerFactory {
    Sgd { learning_rate: f64 },
    Momentum { learning_rate: f64, momentum: f64 },
}

impl OptimizerFactory {
    pub fn sgd(learning_rate: f64) -> Self {
        OptimizerFactory::Sgd { learning_rate }
    }

    pub fn momentum(learning_rate: f64, momentum: f64) -> Self {
        OptimizerFactory::Momentum {
            learning_rate,
            momentum,
        }
    }

    /// Bind a new optimizer to a parameter of shape `shape`
    #[instrument(level = "trace", skip(self), fields(shape = %shape))]
    pub fn create(&self, shape: &Shape) -> Optimizer {
        match *self {
            OptimizerFactory::Sgd { learning_rate } => Optimizer::Sgd(Sgd::new(learning_rate)),
            // Zero momentum is plain SGD; skip the velocity buffer
            OptimizerFactory::Momentum {
                learning_rate,
                momentum,
            } if momentum == 0.0 => Optimizer::Sgd(Sgd::new(learning_rate)),
            OptimizerFactory::Momentum {
                learning_rate,
                momentum,
            } => Optimizer::Momentum(MomentumSgd::new(learning_rate, momentum, shape)),
        }
    }
}

impl fmt::Display for OptimizerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerFactory::Sgd { learning_rate } => write!(f, "sgd:{}", learning_rate),
            OptimizerFactory::Momentum {
                learning_rate,
                momentum,
            } => write!(f, "momentum:{}:{}", learning_rate, momentum),
        }
    }
}

impl FromStr for OptimizerFactory {
    type Err = Error;

    /// Parses `sgd:<lr>` or `momentum:<lr>:<momentum>`
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        let number = |raw: &str| {
            raw.trim()
                .parse::<f64>()
                .map_err(|_| Error::InvalidConfig(format!("invalid number {:?} in optimizer {:?}", raw, s)))
        };

        let factory = match parts.as_slice() {
            [name, lr] if name.eq_ignore_ascii_case("sgd") => OptimizerFactory::sgd(number(*lr)?),
            [name, lr, m] if name.eq_ignore_ascii_case("momentum") => {
                OptimizerFactory::momentum(number(*lr)?, number(*m)?)
            }
            _ => {
                return Err(Error::InvalidConfig(format!(
                    "unknown optimizer {:?}, expected sgd:<lr> or momentum:<lr>:<momentum>",
                    s
                )))
            }
        };

        Ok(factory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn t(values: &[f64]) -> Tensor {
        Tensor::from_values([values.len()], values.to_vec()).unwrap()
    }

    #[test]
    fn test_sgd_update() {
        let mut opt = OptimizerFactory::sgd(0.1).create(&Shape::from([2]));
        let params = t(&[1.0, 2.0]);
        let grads = t(&[1.0, -2.0]);
        let updated = opt.update(&params, &grads).unwrap();
        assert_relative_eq!(updated.data()[0], 0.9);
        assert_relative_eq!(updated.data()[1], 2.2);
        // inputs untouched
        assert_eq!(params.data(), &[1.0, 2.0]);
    }

    #[test]
    fn test_momentum_velocity_persists() {
        let mut opt = OptimizerFactory::momentum(0.1, 0.9).create(&Shape::from([1]));
        let grads = t(&[1.0]);

        let p1 = opt.update(&t(&[0.0]), &grads).unwrap();
        // v = 0 * 0.9 - 0.1 = -0.1
        assert_relative_eq!(p1.data()[0], -0.1);

        let p2 = opt.update(&p1, &grads).unwrap();
        // v = -0.1 * 0.9 - 0.1 = -0.19
        assert_relative_eq!(p2.data()[0], -0.29, epsilon = 1e-12);

        match opt {
            Optimizer::Momentum(m) => assert_relative_eq!(m.velocity().data()[0], -0.19, epsilon = 1e-12),
            other => panic!("expected momentum optimizer, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_momentum_is_sgd() {
        let opt = OptimizerFactory::momentum(0.05, 0.0).create(&Shape::from([3]));
        assert_eq!(opt, Optimizer::Sgd(Sgd::new(0.05)));
    }

    #[test]
    fn test_update_shape_mismatch() {
        let mut opt = OptimizerFactory::momentum(0.1, 0.5).create(&Shape::from([2]));
        assert!(opt.update(&t(&[1.0, 2.0, 3.0]), &t(&[1.0, 2.0, 3.0])).is_err());
    }

    #[test]
    fn test_parse_factory() {
        assert_eq!("sgd:0.01".parse::<OptimizerFactory>().unwrap(), OptimizerFactory::sgd(0.01));
        assert_eq!(
            "Momentum:0.1:0.9".parse::<OptimizerFactory>().unwrap(),
            OptimizerFactory::momentum(0.1, 0.9)
        );
        assert!("adam:0.1".parse::<OptimizerFactory>().is_err());
        assert!("sgd:fast".parse::<OptimizerFactory>().is_err());

        let factory = OptimizerFactory::momentum(0.5, 0.25);
        assert_eq!(factory.to_string().parse::<OptimizerFactory>().unwrap(), factory);
    }
}

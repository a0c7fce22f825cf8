//! Model configuration

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::warn;

use crate::error::Result;

/// Environment variable holding the RNG seed
pub const SEED_ENV: &str = "TENGOR_SEED";

/// Environment variable holding the worker count of the per-sample pool
pub const NUM_THREADS_ENV: &str = "TENGOR_NUM_THREADS";

/// Seed and parallelism settings of a [`Sequential`](crate::nn::Sequential)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    /// Seed for weight init and dropout masks; `None` seeds from entropy
    pub seed: Option<u64>,
    /// Worker threads for per-sample work; `None` uses the global rayon pool
    pub num_threads: Option<usize>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ModelConfig {
    /// Read `TENGOR_SEED` and `TENGOR_NUM_THREADS`. Unset values fall back to
    /// `None`; unparsable ones are logged and ignored.
    pub fn from_env() -> Self {
        Self {
            seed: env_value(SEED_ENV),
            num_threads: env_value::<usize>(NUM_THREADS_ENV).filter(|&n| n > 0),
        }
    }

    /// Configuration with a fixed seed and the global pool
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            num_threads: None,
        }
    }

    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Dedicated pool when `num_threads` is set
    pub fn thread_pool(&self) -> Result<Option<ThreadPool>> {
        match self.num_threads {
            Some(n) => {
                let pool = ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("tengor-worker-{}", i))
                    .build()?;
                Ok(Some(pool))
            }
            None => Ok(None),
        }
    }
}

fn env_value<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable environment variable");
            None
        }
    }
}

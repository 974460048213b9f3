//! Seeded train/eval partitioning
//!
//! A plain (non-stratified) shuffle-then-cut: indices are permuted with a
//! ChaCha8 generator seeded from `seed`, the first `ceil((1 - f) * n)`
//! permuted examples form the eval subset and the rest the train subset.
//! Identical input and seed always give an identical split.

use misinfo_core::{DatasetSplit, Error, LabeledExample, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub const DEFAULT_TRAIN_FRACTION: f64 = 0.8;
pub const DEFAULT_SEED: u64 = 42;

/// Smallest corpus that still leaves one example on each side
pub const MIN_EXAMPLES: usize = 2;

#[derive(Debug, Clone, Copy)]
pub struct Splitter {
    train_fraction: f64,
    seed: u64,
}

impl Default for Splitter {
    fn default() -> Self {
        Self {
            train_fraction: DEFAULT_TRAIN_FRACTION,
            seed: DEFAULT_SEED,
        }
    }
}

impl Splitter {
    pub fn new(train_fraction: f64, seed: u64) -> Result<Self> {
        if !(train_fraction > 0.0 && train_fraction < 1.0) {
            return Err(Error::config(format!(
                "train_fraction must be in (0, 1), got {}",
                train_fraction
            )));
        }
        Ok(Self {
            train_fraction,
            seed,
        })
    }

    pub fn train_fraction(&self) -> f64 {
        self.train_fraction
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of eval examples for a corpus of `n`
    pub fn eval_size(&self, n: usize) -> usize {
        // The epsilon keeps 0.2 * 10 = 2.0000000000000004 from rounding up to 3
        let raw = (1.0 - self.train_fraction) * n as f64;
        let n_eval = (raw - 1e-9).ceil().max(0.0) as usize;
        n_eval.clamp(1, n.saturating_sub(1).max(1))
    }

    pub fn split(&self, examples: &[LabeledExample]) -> Result<DatasetSplit> {
        let n = examples.len();
        if n < MIN_EXAMPLES {
            return Err(Error::InsufficientData {
                available: n,
                required: MIN_EXAMPLES,
            });
        }

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        indices.shuffle(&mut rng);

        let n_eval = self.eval_size(n);
        let (eval_idx, train_idx) = indices.split_at(n_eval);

        let split = DatasetSplit {
            train: train_idx.iter().map(|&i| examples[i].clone()).collect(),
            eval: eval_idx.iter().map(|&i| examples[i].clone()).collect(),
        };

        tracing::info!(
            "Split {} examples into {} train / {} eval (seed={})",
            n,
            split.train.len(),
            split.eval.len(),
            self.seed
        );
        Ok(split)
    }
}

/// Split with an explicit fraction and seed
pub fn split(examples: &[LabeledExample], train_fraction: f64, seed: u64) -> Result<DatasetSplit> {
    Splitter::new(train_fraction, seed)?.split(examples)
}

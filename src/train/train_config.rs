use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{NetworkError, Result};

/// Switches that change how `train_loop` runs.
///
/// - `no_shuffle`: keep the dataset order every epoch instead of
///   permuting it with the network's RNG
/// - `adjust_rate`: halve the learning rate whenever the monitored loss
///   (validation if given, else training) fails to improve
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingFlags {
    pub no_shuffle: bool,
    pub adjust_rate: bool,
}

/// Configuration for a `train_loop` run.
///
/// # Fields
/// - `epochs`: total number of full passes over the training data
/// - `learning_rate`: SGD step size applied to batch-averaged gradients
/// - `batch_size`: samples per mini-batch; use `1` for online SGD
/// - `flags`: see [`TrainingFlags`]
///
/// Missing fields in a JSON file take the defaults: 30 epochs, rate 1.5,
/// batches of 10.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    pub batch_size: usize,
    pub flags: TrainingFlags,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            epochs: 30,
            learning_rate: 1.5,
            batch_size: 10,
            flags: TrainingFlags::default(),
        }
    }
}

impl TrainConfig {
    pub fn new(epochs: usize, learning_rate: f64, batch_size: usize) -> Self {
        TrainConfig {
            epochs,
            learning_rate,
            batch_size,
            flags: TrainingFlags::default(),
        }
    }

    pub fn with_flags(mut self, flags: TrainingFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<TrainConfig> {
        let reader = BufReader::new(File::open(path)?);
        let config: TrainConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(NetworkError::InvalidConfig("batch size must be at least 1".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(NetworkError::InvalidConfig(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

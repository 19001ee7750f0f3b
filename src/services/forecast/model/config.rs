//! Forecast model configuration.

use serde::{Deserialize, Serialize};

/// Architecture and training hyper-parameters of the forecast model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Input window length (L).
    pub lookback: usize,
    /// Output window length (H).
    pub horizon: usize,
    /// Values per time step. The close price only.
    pub features: usize,
    /// Hidden units of each stacked recurrent layer, input side first.
    pub recurrent_units: Vec<usize>,
    /// Hidden dense layers (ReLU) between the last recurrent layer and the output.
    pub dense_units: Vec<usize>,
    /// Dropout rate between recurrent layers, training only.
    pub dropout: f64,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Fixes initialisation, dropout masks and shuffling when set.
    pub seed: Option<u64>,
}

impl ModelConfig {
    pub fn new(lookback: usize, horizon: usize) -> Self {
        Self {
            lookback,
            horizon,
            features: 1,
            recurrent_units: vec![100, 100, 50],
            dense_units: vec![50, 25],
            dropout: 0.2,
            epochs: 50,
            batch_size: 32,
            learning_rate: 0.001,
            seed: None,
        }
    }

    pub fn with_recurrent_units(mut self, units: Vec<usize>) -> Self {
        self.recurrent_units = units;
        self
    }

    pub fn with_dense_units(mut self, units: Vec<usize>) -> Self {
        self.dense_units = units;
        self
    }

    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// A very small network, for tests and smoke runs.
    pub fn tiny(lookback: usize, horizon: usize) -> Self {
        Self::new(lookback, horizon)
            .with_recurrent_units(vec![6, 6, 4])
            .with_dense_units(vec![4, 3])
            .with_epochs(3)
            .with_batch_size(8)
            .with_learning_rate(0.01)
            .with_seed(7)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::new(24, 24)
    }
}

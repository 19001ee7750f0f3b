//! Stacked-LSTM sequence regressor.
//!
//! Maps one window of `lookback` normalized closes to `horizon` normalized
//! future closes:
//!
//! ```text
//! LSTM(100) -> dropout -> LSTM(100) -> dropout -> LSTM(50)
//!     -> Dense(50, relu) -> Dense(25, relu) -> Dense(H)
//! ```
//!
//! Dropout only exists on the training path; [`ForecastModel::predict`] is a
//! pure function of the parameters and the input.

mod config;
mod dense;
mod lstm;
mod optimizer;

pub use config::ModelConfig;
pub use dense::{Activation, Dense, DenseGrads};
pub use lstm::{LstmGrads, LstmLayer, LstmTrace};

use super::persist::{read_if_exists, write_atomic};
use super::windower::WindowSet;
use crate::error::{ForecastError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::Array1;
use optimizer::Adam;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info};

/// Outcome of a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingReport {
    pub samples: usize,
    pub epochs: usize,
    /// Mean batch loss per epoch.
    pub loss_history: Vec<f64>,
    pub final_loss: f64,
}

/// Trained (or freshly initialised) forecast model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastModel {
    config: ModelConfig,
    lstm: Vec<LstmLayer>,
    dense: Vec<Dense>,
}

/// Gradients for every parameter tensor of a [`ForecastModel`].
#[derive(Debug, Clone)]
pub struct Gradients {
    lstm: Vec<LstmGrads>,
    dense: Vec<DenseGrads>,
}

impl Gradients {
    fn zeros_like(model: &ForecastModel) -> Self {
        Self {
            lstm: model.lstm.iter().map(LstmGrads::zeros_like).collect(),
            dense: model.dense.iter().map(DenseGrads::zeros_like).collect(),
        }
    }

    fn clear(&mut self) {
        self.lstm.iter_mut().for_each(|g| g.fill(0.0));
        self.dense.iter_mut().for_each(|g| g.fill(0.0));
    }

    fn scale(&mut self, factor: f64) {
        self.lstm.iter_mut().for_each(|g| g.scale(factor));
        self.dense.iter_mut().for_each(|g| g.scale(factor));
    }
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Inverted dropout mask: kept units are scaled by `1 / (1 - rate)`.
fn dropout_mask<R: Rng>(len: usize, rate: f64, rng: &mut R) -> Array1<f64> {
    if rate <= 0.0 {
        return Array1::ones(len);
    }
    let keep = 1.0 - rate;
    Array1::from_shape_fn(len, |_| if rng.gen::<f64>() < keep { 1.0 / keep } else { 0.0 })
}

fn validate_config(config: &ModelConfig) -> Result<()> {
    let problem = if config.lookback == 0 || config.horizon == 0 {
        Some("lookback and horizon must be positive")
    } else if config.features == 0 {
        Some("feature count must be positive")
    } else if config.recurrent_units.is_empty() || config.recurrent_units.contains(&0) {
        Some("at least one recurrent layer with positive units is required")
    } else if config.dense_units.contains(&0) {
        Some("dense layers need positive units")
    } else if !(0.0..1.0).contains(&config.dropout) {
        Some("dropout must be in [0, 1)")
    } else if config.batch_size == 0 {
        Some("batch size must be positive")
    } else if !(config.learning_rate > 0.0) {
        Some("learning rate must be positive")
    } else {
        None
    };

    match problem {
        Some(msg) => Err(ForecastError::InvalidConfig(msg.to_string())),
        None => Ok(()),
    }
}

impl ForecastModel {
    /// Build an untrained model with randomly initialised parameters.
    pub fn new(config: ModelConfig) -> Result<Self> {
        validate_config(&config)?;
        let mut rng = make_rng(config.seed);

        let mut lstm = Vec::with_capacity(config.recurrent_units.len());
        let mut input_size = config.features;
        for &units in &config.recurrent_units {
            lstm.push(LstmLayer::new(input_size, units, &mut rng));
            input_size = units;
        }

        let mut dense = Vec::with_capacity(config.dense_units.len() + 1);
        for &units in &config.dense_units {
            dense.push(Dense::new(input_size, units, Activation::Relu, &mut rng));
            input_size = units;
        }
        dense.push(Dense::new(input_size, config.horizon, Activation::Linear, &mut rng));

        Ok(Self {
            config,
            lstm,
            dense,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn lookback(&self) -> usize {
        self.config.lookback
    }

    pub fn horizon(&self) -> usize {
        self.config.horizon
    }

    pub fn parameter_count(&self) -> usize {
        self.lstm.iter().map(LstmLayer::parameter_count).sum::<usize>()
            + self.dense.iter().map(Dense::parameter_count).sum::<usize>()
    }

    fn to_steps(&self, window: &[f64]) -> Vec<Array1<f64>> {
        window
            .chunks(self.config.features)
            .map(|step| Array1::from(step.to_vec()))
            .collect()
    }

    fn check_input(&self, context: &'static str, window: &[f64]) -> Result<()> {
        let expected = self.config.lookback * self.config.features;
        if window.len() != expected {
            return Err(ForecastError::ShapeMismatch {
                context,
                expected,
                actual: window.len(),
            });
        }
        Ok(())
    }

    /// One deterministic forward pass for a single input window.
    ///
    /// `window` must hold exactly `lookback * features` values; anything else
    /// is a `ShapeMismatch`, never truncated or padded.
    pub fn predict(&self, window: &[f64]) -> Result<Vec<f64>> {
        self.check_input("input window", window)?;

        let mut seq = self.to_steps(window);
        for layer in &self.lstm {
            seq = layer.forward(&seq).0;
        }

        let mut x = seq.pop().ok_or(ForecastError::ShapeMismatch {
            context: "input window",
            expected: self.config.lookback,
            actual: 0,
        })?;
        for layer in &self.dense {
            x = layer.forward(&x).1;
        }

        Ok(x.to_vec())
    }

    /// Mean squared error over a window set.
    pub fn evaluate(&self, windows: &WindowSet) -> Result<f64> {
        if windows.is_empty() {
            return Err(ForecastError::InsufficientData(
                "cannot evaluate on an empty window set".to_string(),
            ));
        }

        let mut total = 0.0;
        for (input, target) in windows.inputs.iter().zip(&windows.targets) {
            let predicted = self.predict(input)?;
            if predicted.len() != target.len() {
                return Err(ForecastError::ShapeMismatch {
                    context: "evaluation target",
                    expected: predicted.len(),
                    actual: target.len(),
                });
            }
            let mse = predicted
                .iter()
                .zip(target)
                .map(|(p, t)| (p - t).powi(2))
                .sum::<f64>()
                / target.len() as f64;
            total += mse;
        }

        Ok(total / windows.len() as f64)
    }

    fn check_windows(&self, windows: &WindowSet) -> Result<()> {
        if windows.is_empty() {
            return Err(ForecastError::InsufficientData(
                "no training windows".to_string(),
            ));
        }
        if windows.lookback != self.config.lookback {
            return Err(ForecastError::ShapeMismatch {
                context: "training lookback",
                expected: self.config.lookback,
                actual: windows.lookback,
            });
        }
        if windows.horizon != self.config.horizon {
            return Err(ForecastError::ShapeMismatch {
                context: "training horizon",
                expected: self.config.horizon,
                actual: windows.horizon,
            });
        }
        for (input, target) in windows.inputs.iter().zip(&windows.targets) {
            self.check_input("training input", input)?;
            if target.len() != self.config.horizon {
                return Err(ForecastError::ShapeMismatch {
                    context: "training target",
                    expected: self.config.horizon,
                    actual: target.len(),
                });
            }
        }
        Ok(())
    }

    /// Fit the parameters to minimise MSE over `windows` with mini-batch Adam.
    pub fn train(&mut self, windows: &WindowSet) -> Result<TrainingReport> {
        self.check_windows(windows)?;

        let mut rng = make_rng(self.config.seed.map(|s| s.wrapping_add(1)));
        let mut adam = Adam::new(self, self.config.learning_rate);
        let mut grads = Gradients::zeros_like(self);
        let mut order: Vec<usize> = (0..windows.len()).collect();
        let mut loss_history = Vec::with_capacity(self.config.epochs);

        info!(
            "Training forecast model: {} windows, {} epochs, {} parameters",
            windows.len(),
            self.config.epochs,
            self.parameter_count()
        );

        for epoch in 0..self.config.epochs {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;
            let mut batches = 0usize;

            for batch in order.chunks(self.config.batch_size) {
                grads.clear();
                let mut batch_loss = 0.0;
                for &idx in batch {
                    batch_loss += self.accumulate(
                        &windows.inputs[idx],
                        &windows.targets[idx],
                        &mut grads,
                        &mut rng,
                    );
                }
                grads.scale(1.0 / batch.len() as f64);
                adam.step(self, &grads);

                epoch_loss += batch_loss / batch.len() as f64;
                batches += 1;
            }

            let avg_loss = epoch_loss / batches as f64;
            loss_history.push(avg_loss);
            debug!(epoch = epoch + 1, loss = avg_loss, "epoch complete");
        }

        let final_loss = loss_history.last().copied().unwrap_or(f64::NAN);
        info!("Training finished, final loss {:.6}", final_loss);

        Ok(TrainingReport {
            samples: windows.len(),
            epochs: self.config.epochs,
            loss_history,
            final_loss,
        })
    }

    /// Forward and backward pass for one sample with dropout active.
    /// Adds the sample's gradients into `grads` and returns its loss.
    fn accumulate<R: Rng>(
        &self,
        input: &[f64],
        target: &[f64],
        grads: &mut Gradients,
        rng: &mut R,
    ) -> f64 {
        let last = self.lstm.len() - 1;
        let mut traces = Vec::with_capacity(self.lstm.len());
        let mut masks: Vec<Vec<Array1<f64>>> = Vec::with_capacity(last);

        let mut seq = self.to_steps(input);
        for (k, layer) in self.lstm.iter().enumerate() {
            let (mut outputs, trace) = layer.forward(&seq);
            traces.push(trace);
            if k < last {
                let layer_masks: Vec<Array1<f64>> = outputs
                    .iter()
                    .map(|_| dropout_mask(layer.hidden_size, self.config.dropout, rng))
                    .collect();
                for (h, mask) in outputs.iter_mut().zip(&layer_masks) {
                    *h *= mask;
                }
                masks.push(layer_masks);
            }
            seq = outputs;
        }

        let steps = seq.len();
        let mut x = seq[steps - 1].clone();
        let mut dense_inputs = Vec::with_capacity(self.dense.len());
        let mut pre_activations = Vec::with_capacity(self.dense.len());
        for layer in &self.dense {
            let (pre, out) = layer.forward(&x);
            dense_inputs.push(x);
            pre_activations.push(pre);
            x = out;
        }

        let target = Array1::from(target.to_vec());
        let diff = &x - &target;
        let loss = diff.mapv(|d| d * d).mean().unwrap_or(0.0);

        let mut d = diff * (2.0 / self.config.horizon as f64);
        for k in (0..self.dense.len()).rev() {
            d = self.dense[k].backward(&dense_inputs[k], &pre_activations[k], &d, &mut grads.dense[k]);
        }

        // Only the final step of the last recurrent layer feeds the head
        let mut d_outputs = vec![Array1::zeros(self.lstm[last].hidden_size); steps];
        d_outputs[steps - 1] = d;
        for k in (0..self.lstm.len()).rev() {
            let mut d_inputs = self.lstm[k].backward(&traces[k], &d_outputs, &mut grads.lstm[k]);
            if k > 0 {
                for (dx, mask) in d_inputs.iter_mut().zip(&masks[k - 1]) {
                    *dx *= mask;
                }
                d_outputs = d_inputs;
            }
        }

        loss
    }

    /// Serialized, gzip-compressed parameters.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let raw = bincode::serialize(self)?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw)?;
        Ok(encoder.finish()?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut decoder = GzDecoder::new(bytes);
        let mut raw = Vec::new();
        decoder.read_to_end(&mut raw)?;
        let model: Self = bincode::deserialize(&raw)?;
        validate_config(&model.config)?;
        if model.lstm.len() != model.config.recurrent_units.len()
            || model.dense.len() != model.config.dense_units.len() + 1
        {
            return Err(ForecastError::InvalidConfig(
                "stored layers do not match stored configuration".to_string(),
            ));
        }
        Ok(model)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, &self.to_bytes()?)
    }

    /// Load stored parameters. A missing file is `ModelNotFound`.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes =
            read_if_exists(path)?.ok_or_else(|| ForecastError::ModelNotFound(path.to_path_buf()))?;
        Self::from_bytes(&bytes)
    }
}

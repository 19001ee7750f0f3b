//! Slicing a normalized series into model windows.

use crate::error::{ForecastError, Result};

/// Supervised training windows: `inputs[i]` has `lookback` values,
/// `targets[i]` has `horizon` values immediately following it.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSet {
    pub lookback: usize,
    pub horizon: usize,
    pub inputs: Vec<Vec<f64>>,
    pub targets: Vec<Vec<f64>>,
}

impl WindowSet {
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// Every `(X, y)` pair a series of length N yields: `N - L - H + 1` windows.
///
/// Window `i` reads `X = series[i .. i+L]` and `y = series[i+L .. i+L+H]`.
pub fn training_windows(series: &[f64], lookback: usize, horizon: usize) -> Result<WindowSet> {
    if lookback == 0 || horizon == 0 {
        return Err(ForecastError::InsufficientData(format!(
            "lookback ({}) and horizon ({}) must both be positive",
            lookback, horizon
        )));
    }

    let required = lookback + horizon;
    if series.len() < required {
        return Err(ForecastError::InsufficientData(format!(
            "need at least {} values for lookback {} + horizon {}, got {}",
            required,
            lookback,
            horizon,
            series.len()
        )));
    }

    let count = series.len() - required + 1;
    let mut inputs = Vec::with_capacity(count);
    let mut targets = Vec::with_capacity(count);

    for start in 0..count {
        let split = start + lookback;
        inputs.push(series[start..split].to_vec());
        targets.push(series[split..split + horizon].to_vec());
    }

    Ok(WindowSet {
        lookback,
        horizon,
        inputs,
        targets,
    })
}

/// The single most recent input window: the last `lookback` values in order.
pub fn inference_window(series: &[f64], lookback: usize) -> Result<Vec<f64>> {
    if lookback == 0 || series.len() < lookback {
        return Err(ForecastError::InsufficientData(format!(
            "need at least {} values for an inference window, got {}",
            lookback.max(1),
            series.len()
        )));
    }

    Ok(series[series.len() - lookback..].to_vec())
}

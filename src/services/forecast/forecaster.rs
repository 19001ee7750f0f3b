//! Inference and training pipelines over a loaded model/scaler pair.

use super::model::{ForecastModel, ModelConfig, TrainingReport};
use super::scaler::ScalerState;
use super::store::{ArtifactManifest, ArtifactStore, LoadedArtifacts};
use super::windower::{inference_window, training_windows};
use crate::error::{ForecastError, Result};
use crate::types::{closes, validate_series, Candle, CandleInterval, Forecast};
use tracing::{debug, info};

/// A loaded model together with the scaler it was trained against.
///
/// Built once and reused for every inference call. The scaler is never
/// refit here; replacing the pair means loading a new `Forecaster`.
#[derive(Debug, Clone)]
pub struct Forecaster {
    model: ForecastModel,
    scaler: ScalerState,
    manifest: ArtifactManifest,
}

impl Forecaster {
    pub fn load(store: &ArtifactStore) -> Result<Self> {
        Ok(Self::from_artifacts(store.load()?))
    }

    pub fn from_artifacts(artifacts: LoadedArtifacts) -> Self {
        Self {
            model: artifacts.model,
            scaler: artifacts.scaler,
            manifest: artifacts.manifest,
        }
    }

    pub fn manifest(&self) -> &ArtifactManifest {
        &self.manifest
    }

    pub fn scaler(&self) -> &ScalerState {
        &self.scaler
    }

    pub fn model(&self) -> &ForecastModel {
        &self.model
    }

    pub fn lookback(&self) -> usize {
        self.model.lookback()
    }

    pub fn horizon(&self) -> usize {
        self.model.horizon()
    }

    /// Forecast the `horizon` candles after the last one in `series`.
    ///
    /// Points are spaced by `interval`, starting one interval after the
    /// last candle. `interval` must be the one the model was trained on.
    pub fn forecast(&self, series: &[Candle], interval: CandleInterval) -> Result<Forecast> {
        if interval != self.manifest.interval {
            return Err(ForecastError::ArtifactMismatch(format!(
                "model was trained on {} candles, asked to forecast {} candles",
                self.manifest.interval, interval
            )));
        }
        validate_series(series)?;

        let lookback = self.lookback();
        if series.len() < lookback {
            return Err(ForecastError::InsufficientData(format!(
                "forecast needs {} candles, got {}",
                lookback,
                series.len()
            )));
        }

        let normalized = self.scaler.transform(&closes(series));
        let window = inference_window(&normalized, lookback)?;
        let predicted = self.model.predict(&window)?;
        let prices = self.scaler.inverse_transform(&predicted);

        if prices.iter().any(|p| !p.is_finite()) {
            return Err(ForecastError::InvalidForecast);
        }

        let last_time = series[series.len() - 1].time;
        debug!(
            "Forecast {} points from {} candles (last close {:.2})",
            prices.len(),
            series.len(),
            series[series.len() - 1].close
        );

        Ok(Forecast::from_prices(&prices, last_time, interval))
    }
}

/// Fit a scaler on the training closes, train a fresh model on every
/// window of the scaled series and persist the pair.
pub fn train_forecaster(
    series: &[Candle],
    config: ModelConfig,
    store: &ArtifactStore,
    symbol: &str,
    interval: CandleInterval,
) -> Result<(Forecaster, TrainingReport)> {
    validate_series(series)?;

    let prices = closes(series);
    let scaler = ScalerState::fit(&prices)?;
    let normalized = scaler.transform(&prices);
    let windows = training_windows(&normalized, config.lookback, config.horizon)?;

    info!(
        "Training on {} candles of {} {} ({} windows)",
        series.len(),
        symbol,
        interval,
        windows.len()
    );

    let mut model = ForecastModel::new(config)?;
    let report = model.train(&windows)?;
    let manifest = store.save(&model, &scaler, symbol, interval)?;

    Ok((
        Forecaster {
            model,
            scaler,
            manifest,
        },
        report,
    ))
}

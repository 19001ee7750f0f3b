//! Reversible min-max normalization of close prices.

use super::persist::{read_if_exists, write_atomic};
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Fitted `(min, max)` of the close-price feature.
///
/// Inputs outside `[min, max]` map outside `[0, 1]`; they are not clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    pub min: f64,
    pub max: f64,
}

impl ScalerState {
    /// Fit over a training sample.
    ///
    /// Empty and constant samples are rejected: a zero range has no inverse.
    pub fn fit(prices: &[f64]) -> Result<Self> {
        if prices.is_empty() {
            return Err(ForecastError::InsufficientData(
                "cannot fit scaler on an empty sample".to_string(),
            ));
        }
        if prices.iter().any(|p| !p.is_finite()) {
            return Err(ForecastError::UpstreamData(
                "cannot fit scaler on non-finite prices".to_string(),
            ));
        }

        let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
        let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        if max == min {
            return Err(ForecastError::InsufficientData(format!(
                "cannot fit scaler on a constant sample ({} values equal to {})",
                prices.len(),
                min
            )));
        }

        Ok(Self { min, max })
    }

    fn range(&self) -> f64 {
        self.max - self.min
    }

    pub fn transform_one(&self, price: f64) -> f64 {
        (price - self.min) / self.range()
    }

    pub fn inverse_one(&self, normalized: f64) -> f64 {
        normalized * self.range() + self.min
    }

    pub fn transform(&self, prices: &[f64]) -> Vec<f64> {
        prices.iter().map(|&p| self.transform_one(p)).collect()
    }

    pub fn inverse_transform(&self, normalized: &[f64]) -> Vec<f64> {
        normalized.iter().map(|&n| self.inverse_one(n)).collect()
    }

    /// SHA-256 of the fitted bounds, hex encoded. Pairs a scaler with the
    /// model trained on its output.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.min.to_le_bytes());
        hasher.update(self.max.to_le_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &content)
    }

    /// Load a fitted scaler. A missing file is `ScalerNotFound`, never a
    /// fresh unfitted scaler.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes =
            read_if_exists(path)?.ok_or_else(|| ForecastError::ScalerNotFound(path.to_path_buf()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

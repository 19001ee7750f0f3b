//! Paired persistence of the scaler and the model trained on its output.

use super::model::ForecastModel;
use super::persist::{read_if_exists, write_atomic};
use super::scaler::ScalerState;
use crate::error::{ForecastError, Result};
use crate::types::CandleInterval;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

const SCALER_FILE: &str = "scaler.json";
const MODEL_FILE: &str = "model.bin.gz";
const MANIFEST_FILE: &str = "manifest.json";

/// Identifies one trained model/scaler pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactManifest {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub symbol: String,
    pub interval: CandleInterval,
    pub lookback: usize,
    pub horizon: usize,
    pub scaler_fingerprint: String,
    pub model_fingerprint: String,
}

/// Everything a forecaster needs, loaded together.
#[derive(Debug, Clone)]
pub struct LoadedArtifacts {
    pub model: ForecastModel,
    pub scaler: ScalerState,
    pub manifest: ArtifactManifest,
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Artifact directory holding `scaler.json`, `model.bin.gz` and `manifest.json`.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.dir.join(SCALER_FILE)
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    /// Persist a trained pair. The manifest is written last, so a reader
    /// never sees a manifest describing files that are not yet in place.
    pub fn save(
        &self,
        model: &ForecastModel,
        scaler: &ScalerState,
        symbol: &str,
        interval: CandleInterval,
    ) -> Result<ArtifactManifest> {
        let model_bytes = model.to_bytes()?;

        let manifest = ArtifactManifest {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            symbol: symbol.to_string(),
            interval,
            lookback: model.lookback(),
            horizon: model.horizon(),
            scaler_fingerprint: scaler.fingerprint(),
            model_fingerprint: sha256_hex(&model_bytes),
        };

        scaler.save(&self.scaler_path())?;
        write_atomic(&self.model_path(), &model_bytes)?;
        write_atomic(&self.manifest_path(), &serde_json::to_vec_pretty(&manifest)?)?;

        info!(
            "Saved artifacts {} to {} ({} {}, L={}, H={})",
            manifest.id,
            self.dir.display(),
            manifest.symbol,
            manifest.interval,
            manifest.lookback,
            manifest.horizon
        );

        Ok(manifest)
    }

    pub fn load_manifest(&self) -> Result<ArtifactManifest> {
        let path = self.manifest_path();
        let bytes = read_if_exists(&path)?.ok_or_else(|| {
            ForecastError::ArtifactMismatch(format!(
                "no manifest at {}; cannot verify the model/scaler pairing",
                path.display()
            ))
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Load and cross-check the pair.
    pub fn load(&self) -> Result<LoadedArtifacts> {
        let scaler = ScalerState::load(&self.scaler_path())?;

        let model_path = self.model_path();
        let model_bytes =
            read_if_exists(&model_path)?.ok_or_else(|| ForecastError::ModelNotFound(model_path.clone()))?;

        let manifest = self.load_manifest()?;

        let scaler_fp = scaler.fingerprint();
        if scaler_fp != manifest.scaler_fingerprint {
            return Err(ForecastError::ArtifactMismatch(format!(
                "scaler fingerprint {} does not match manifest {}",
                scaler_fp, manifest.scaler_fingerprint
            )));
        }

        let model_fp = sha256_hex(&model_bytes);
        if model_fp != manifest.model_fingerprint {
            return Err(ForecastError::ArtifactMismatch(format!(
                "model fingerprint {} does not match manifest {}",
                model_fp, manifest.model_fingerprint
            )));
        }

        let model = ForecastModel::from_bytes(&model_bytes)?;
        if model.lookback() != manifest.lookback || model.horizon() != manifest.horizon {
            return Err(ForecastError::ArtifactMismatch(format!(
                "model shape L={} H={} does not match manifest L={} H={}",
                model.lookback(),
                model.horizon(),
                manifest.lookback,
                manifest.horizon
            )));
        }

        debug!("Loaded artifacts {} from {}", manifest.id, self.dir.display());

        Ok(LoadedArtifacts {
            model,
            scaler,
            manifest,
        })
    }
}

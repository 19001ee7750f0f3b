//! Forecasting core: scaling, windowing, the sequence model and the
//! artifact pairing that ties them together.

mod forecaster;
pub mod model;
mod persist;
pub mod scaler;
pub mod store;
pub mod windower;

pub use forecaster::{train_forecaster, Forecaster};
pub use model::{ForecastModel, ModelConfig, TrainingReport};
pub use scaler::ScalerState;
pub use store::{ArtifactManifest, ArtifactStore, LoadedArtifacts};
pub use windower::{inference_window, training_windows, WindowSet};

pub mod decision;
pub mod forecast;
pub mod indicators;
pub mod monitor;
pub mod trade_log;

pub use decision::{DecisionPolicy, ForecastAggregate};
pub use forecast::{
    train_forecaster, ArtifactManifest, ArtifactStore, ForecastModel, Forecaster, ModelConfig,
    ScalerState, TrainingReport,
};
pub use indicators::enrich;
pub use monitor::{Monitor, MonitorSettings};
pub use trade_log::{CsvTradeLog, TradeLogSink};

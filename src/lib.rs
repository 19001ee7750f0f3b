//! pricecast - LSTM price forecasting and threshold trade signals for a
//! single crypto pair.

pub mod config;
pub mod error;
pub mod format;
pub mod services;
pub mod sources;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, ForecastError};
pub use types::*;

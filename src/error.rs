use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the forecasting core.
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Scaler not found at {}; train the model first", .0.display())]
    ScalerNotFound(PathBuf),

    #[error("Model not found at {}; train the model first", .0.display())]
    ModelNotFound(PathBuf),

    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Forecast is empty")]
    EmptyForecast,

    #[error("Forecast contains non-finite values")]
    InvalidForecast,

    #[error("Upstream data error: {0}")]
    UpstreamData(String),

    #[error("Model and scaler do not belong together: {0}")]
    ArtifactMismatch(String),

    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Bincode(#[from] bincode::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl ForecastError {
    /// True when a required persisted artifact is absent.
    pub fn is_missing_artifact(&self) -> bool {
        matches!(
            self,
            ForecastError::ScalerNotFound(_) | ForecastError::ModelNotFound(_)
        )
    }
}

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Forecast(#[from] ForecastError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forecast(e) => match e {
                ForecastError::ScalerNotFound(_)
                | ForecastError::ModelNotFound(_)
                | ForecastError::ArtifactMismatch(_) => StatusCode::SERVICE_UNAVAILABLE,
                ForecastError::InsufficientData(_) | ForecastError::UpstreamData(_) => {
                    StatusCode::BAD_GATEWAY
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_artifact_classification() {
        assert!(ForecastError::ScalerNotFound(PathBuf::from("s.json")).is_missing_artifact());
        assert!(ForecastError::ModelNotFound(PathBuf::from("m.bin")).is_missing_artifact());
        assert!(!ForecastError::EmptyForecast.is_missing_artifact());
    }

    #[test]
    fn test_status_mapping() {
        let missing = AppError::from(ForecastError::ModelNotFound(PathBuf::from("m")));
        assert_eq!(missing.status(), StatusCode::SERVICE_UNAVAILABLE);

        let upstream = AppError::from(ForecastError::UpstreamData("timeout".into()));
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);

        assert_eq!(AppError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_shape_mismatch_message() {
        let err = ForecastError::ShapeMismatch {
            context: "input window",
            expected: 24,
            actual: 23,
        };
        assert_eq!(
            err.to_string(),
            "Shape mismatch in input window: expected 24, got 23"
        );
    }
}

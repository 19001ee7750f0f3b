//! Forecast, candle and trade log endpoints.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use pricecast::error::AppError;
use pricecast::services::ArtifactManifest;
use pricecast::types::{CandleInterval, EnrichedCandle, Forecast, TradeLogEntry, TradeSignal};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::ApiResponse;
use crate::AppState;

const DEFAULT_TRADE_LIMIT: usize = 50;

/// Latest refresh cycle, without the candle history.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastResponse {
    pub symbol: String,
    pub interval: CandleInterval,
    pub latest_price: Option<f64>,
    pub forecast: Option<Forecast>,
    pub signal: Option<TradeSignal>,
    pub status: String,
    pub model: Option<ArtifactManifest>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

impl LimitQuery {
    fn resolve(&self, default: Option<usize>) -> Result<Option<usize>, AppError> {
        match self.limit.or(default) {
            Some(0) => Err(AppError::BadRequest("limit must be positive".to_string())),
            limit => Ok(limit),
        }
    }
}

/// Create the forecast router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/forecast", get(get_forecast))
        .route("/candles", get(get_candles))
        .route("/trades", get(get_trades))
        .route("/model/reload", post(reload_model))
}

/// Get the latest forecast and trade signal.
async fn get_forecast(State(state): State<AppState>) -> Json<ApiResponse<ForecastResponse>> {
    let snapshot = state.monitor.snapshot().await;
    let model = state.monitor.manifest().await;

    Json(ApiResponse::new(
        ForecastResponse {
            symbol: snapshot.symbol,
            interval: snapshot.interval,
            latest_price: snapshot.latest_price,
            forecast: snapshot.forecast,
            signal: snapshot.signal,
            status: snapshot.status,
            model,
        },
        snapshot.updated_at,
    ))
}

/// Get the enriched candles of the latest cycle, newest last.
async fn get_candles(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<EnrichedCandle>>>, AppError> {
    let limit = query.resolve(None)?;
    let snapshot = state.monitor.snapshot().await;
    let mut candles = snapshot.candles;
    if let Some(limit) = limit {
        let skip = candles.len().saturating_sub(limit);
        candles.drain(..skip);
    }
    Ok(Json(ApiResponse::new(candles, snapshot.updated_at)))
}

/// Get logged trades, newest first.
async fn get_trades(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<TradeLogEntry>>>, AppError> {
    let limit = query.resolve(Some(DEFAULT_TRADE_LIMIT))?.unwrap_or(DEFAULT_TRADE_LIMIT);
    let entries = state.trade_log.clone().read_recent(limit).await?;
    Ok(Json(ApiResponse::new(
        entries,
        chrono::Utc::now().timestamp_millis(),
    )))
}

/// Load the model/scaler pair currently on disk.
async fn reload_model(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ArtifactManifest>>, AppError> {
    match state.monitor.reload_artifacts().await {
        Ok(manifest) => {
            info!("Model reloaded via API: {}", manifest.id);
            Ok(Json(ApiResponse::new(
                manifest,
                chrono::Utc::now().timestamp_millis(),
            )))
        }
        Err(e) => {
            warn!("Model reload failed: {}", e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use pricecast::services::TradeLogSink;
    use pricecast::types::TradeAction;
    use serde_json::Value;
    use tower::ServiceExt;

    fn app(state: AppState) -> Router {
        crate::api::router().with_state(state)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_forecast_before_first_cycle() {
        let response = app(test_state())
            .oneshot(Request::get("/api/forecast").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["data"]["symbol"], "BTCUSDT");
        assert_eq!(json["data"]["interval"], "5m");
        assert!(json["data"]["forecast"].is_null());
        assert!(json["data"]["model"].is_null());
        assert_eq!(json["meta"]["updatedAt"], 0);
    }

    #[tokio::test]
    async fn test_forecast_after_failed_cycle_shows_status() {
        let state = test_state();
        state.monitor.run_cycle().await;

        let response = app(state)
            .oneshot(Request::get("/api/forecast").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(response).await;
        let status = json["data"]["status"].as_str().unwrap();
        assert!(status.starts_with("market data unavailable"));
    }

    #[tokio::test]
    async fn test_candles_empty() {
        let response = app(test_state())
            .oneshot(Request::get("/api/candles?limit=10").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_trades_newest_first() {
        let state = test_state();
        for (i, action) in [TradeAction::Buy, TradeAction::Sell].into_iter().enumerate() {
            state
                .trade_log
                .record(&TradeLogEntry {
                    timestamp: 1_700_000_000_000 + i as i64 * 60_000,
                    action,
                    price: 100.0 + i as f64,
                    quantity: 0.001,
                })
                .unwrap();
        }

        let response = app(state)
            .oneshot(Request::get("/api/trades?limit=5").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let trades = json["data"].as_array().unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0]["action"], "SELL");
        assert_eq!(trades[1]["action"], "BUY");
    }

    #[tokio::test]
    async fn test_zero_limit_rejected() {
        let response = app(test_state())
            .oneshot(Request::get("/api/trades?limit=0").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reload_without_artifacts_is_unavailable() {
        let response = app(test_state())
            .oneshot(
                Request::post("/api/model/reload")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert_eq!(json["status"], 503);
        assert!(json["error"].as_str().unwrap().contains("train the model first"));
    }

    #[tokio::test]
    async fn test_health_route() {
        let response = app(test_state())
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
    }
}

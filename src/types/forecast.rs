use super::{CandleInterval, EnrichedCandle, TradeSignal};
use serde::{Deserialize, Serialize};

/// One forecast price at a future candle time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub time: i64,
    pub price: f64,
}

/// De-normalized price estimates for the candles following the last known one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub points: Vec<ForecastPoint>,
}

impl Forecast {
    /// Build a forecast from raw prices, spacing points one interval apart
    /// starting strictly after `last_time`. Times saturate at `i64::MAX`.
    pub fn from_prices(prices: &[f64], last_time: i64, interval: CandleInterval) -> Self {
        let step = interval.millis();
        let points = prices
            .iter()
            .enumerate()
            .map(|(k, &price)| {
                let offset = i64::try_from(k + 1)
                    .unwrap_or(i64::MAX)
                    .saturating_mul(step);
                ForecastPoint {
                    time: last_time.saturating_add(offset),
                    price,
                }
            })
            .collect();
        Self { points }
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Everything the presentation layer needs after one refresh cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub symbol: String,
    pub interval: CandleInterval,
    pub candles: Vec<EnrichedCandle>,
    pub latest_price: Option<f64>,
    pub forecast: Option<Forecast>,
    pub signal: Option<TradeSignal>,
    /// Human-readable status line ("prediction unavailable: ..." on failure).
    pub status: String,
    pub updated_at: i64,
}

impl DashboardSnapshot {
    /// True when this cycle produced a forecast.
    pub fn has_prediction(&self) -> bool {
        self.forecast.is_some()
    }
}

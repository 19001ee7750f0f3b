//! Threshold policy turning a forecast into a trade action.

use crate::error::{ForecastError, Result};
use crate::format::format_price;
use crate::types::{Forecast, TradeAction, TradeLogEntry, TradeSignal};
use serde::{Deserialize, Serialize};

/// Which single value stands in for the whole forecast window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastAggregate {
    /// Mean of all forecast points.
    Mean,
    /// Final forecast point.
    Last,
}

impl ForecastAggregate {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "mean" | "avg" | "average" => Some(ForecastAggregate::Mean),
            "last" | "final" => Some(ForecastAggregate::Last),
            _ => None,
        }
    }

    fn apply(&self, prices: &[f64]) -> Option<f64> {
        match self {
            ForecastAggregate::Mean => {
                if prices.is_empty() {
                    None
                } else {
                    Some(prices.iter().sum::<f64>() / prices.len() as f64)
                }
            }
            ForecastAggregate::Last => prices.last().copied(),
        }
    }
}

impl Default for ForecastAggregate {
    fn default() -> Self {
        ForecastAggregate::Mean
    }
}

/// Buy/sell thresholds, in percent of the current price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionPolicy {
    pub buy_threshold_pct: f64,
    pub sell_threshold_pct: f64,
    pub aggregate: ForecastAggregate,
    /// Quantity recorded for BUY/SELL log entries.
    pub quantity: f64,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            buy_threshold_pct: 0.5,
            sell_threshold_pct: 0.5,
            aggregate: ForecastAggregate::Mean,
            quantity: 0.001,
        }
    }
}

impl DecisionPolicy {
    /// Decide on one forecast.
    ///
    /// BUY when the aggregate forecast is more than `buy_threshold_pct` above
    /// the current price, SELL when more than `sell_threshold_pct` below,
    /// HOLD otherwise. Equality with a threshold is HOLD.
    pub fn decide(&self, current_price: f64, forecast: &Forecast) -> Result<TradeSignal> {
        self.decide_prices(current_price, &forecast.prices())
    }

    pub fn decide_prices(&self, current_price: f64, forecast: &[f64]) -> Result<TradeSignal> {
        if forecast.is_empty() {
            return Err(ForecastError::EmptyForecast);
        }
        if !current_price.is_finite() || current_price <= 0.0 {
            return Err(ForecastError::UpstreamData(format!(
                "current price must be positive, got {}",
                current_price
            )));
        }
        if forecast.iter().any(|p| !p.is_finite()) {
            return Err(ForecastError::InvalidForecast);
        }

        let forecast_price = self
            .aggregate
            .apply(forecast)
            .ok_or(ForecastError::EmptyForecast)?;
        let change_pct = (forecast_price - current_price) / current_price * 100.0;

        let action = if change_pct > self.buy_threshold_pct {
            TradeAction::Buy
        } else if change_pct < -self.sell_threshold_pct {
            TradeAction::Sell
        } else {
            TradeAction::Hold
        };

        let message = match action {
            TradeAction::Buy => format!(
                "BUY: forecast {} is {:+.2}% above current {}",
                format_price(forecast_price),
                change_pct,
                format_price(current_price)
            ),
            TradeAction::Sell => format!(
                "SELL: forecast {} is {:.2}% below current {}",
                format_price(forecast_price),
                change_pct.abs(),
                format_price(current_price)
            ),
            TradeAction::Hold => format!(
                "HOLD: forecast {} within {:+.2}% of current {}",
                format_price(forecast_price),
                change_pct,
                format_price(current_price)
            ),
        };

        Ok(TradeSignal {
            action,
            message,
            current_price,
            forecast_price,
            change_pct,
        })
    }

    /// Log record for a signal, or `None` for HOLD.
    pub fn log_entry(&self, signal: &TradeSignal, timestamp: i64) -> Option<TradeLogEntry> {
        if !signal.action.is_trade() {
            return None;
        }
        Some(TradeLogEntry {
            timestamp,
            action: signal.action,
            price: signal.current_price,
            quantity: self.quantity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(price: f64, n: usize) -> Vec<f64> {
        vec![price; n]
    }

    #[test]
    fn test_buy_sell_hold_thresholds() {
        let policy = DecisionPolicy::default();
        assert_eq!(policy.decide_prices(100.0, &flat(100.60, 24)).unwrap().action, TradeAction::Buy);
        assert_eq!(policy.decide_prices(100.0, &flat(99.30, 24)).unwrap().action, TradeAction::Sell);
        assert_eq!(policy.decide_prices(100.0, &flat(100.10, 24)).unwrap().action, TradeAction::Hold);
    }

    #[test]
    fn test_mean_aggregate() {
        let policy = DecisionPolicy::default();
        // Mean 100.6 even though the last point is lower
        let signal = policy.decide_prices(100.0, &[101.2, 100.0]).unwrap();
        assert!((signal.forecast_price - 100.6).abs() < 1e-9);
        assert_eq!(signal.action, TradeAction::Buy);
    }

    #[test]
    fn test_last_aggregate() {
        let policy = DecisionPolicy {
            aggregate: ForecastAggregate::Last,
            ..DecisionPolicy::default()
        };
        let signal = policy.decide_prices(100.0, &[101.2, 100.0]).unwrap();
        assert_eq!(signal.forecast_price, 100.0);
        assert_eq!(signal.action, TradeAction::Hold);
    }

    #[test]
    fn test_empty_forecast_rejected() {
        let policy = DecisionPolicy::default();
        assert!(matches!(
            policy.decide_prices(100.0, &[]),
            Err(ForecastError::EmptyForecast)
        ));
    }

    #[test]
    fn test_bad_inputs() {
        let policy = DecisionPolicy::default();
        assert!(matches!(
            policy.decide_prices(0.0, &[1.0]),
            Err(ForecastError::UpstreamData(_))
        ));
        assert!(matches!(
            policy.decide_prices(f64::NAN, &[1.0]),
            Err(ForecastError::UpstreamData(_))
        ));
        assert!(matches!(
            policy.decide_prices(100.0, &[1.0, f64::INFINITY]),
            Err(ForecastError::InvalidForecast)
        ));
    }

    #[test]
    fn test_message_and_change() {
        let policy = DecisionPolicy::default();
        let signal = policy.decide_prices(50_000.0, &flat(50_500.0, 3)).unwrap();
        assert!((signal.change_pct - 1.0).abs() < 1e-9);
        assert!(signal.message.starts_with("BUY"));
        assert!(signal.message.contains("$50,500.00"));
    }

    #[test]
    fn test_log_entry_only_for_trades() {
        let policy = DecisionPolicy::default();
        let buy = policy.decide_prices(100.0, &[101.0]).unwrap();
        let hold = policy.decide_prices(100.0, &[100.0]).unwrap();

        let entry = policy.log_entry(&buy, 1_700_000_000_000).unwrap();
        assert_eq!(entry.action, TradeAction::Buy);
        assert_eq!(entry.price, 100.0);
        assert_eq!(entry.quantity, 0.001);
        assert!(policy.log_entry(&hold, 0).is_none());
    }

    #[test]
    fn test_aggregate_parse() {
        assert_eq!(ForecastAggregate::from_str("MEAN"), Some(ForecastAggregate::Mean));
        assert_eq!(ForecastAggregate::from_str("last"), Some(ForecastAggregate::Last));
        assert_eq!(ForecastAggregate::from_str("median"), None);
    }
}

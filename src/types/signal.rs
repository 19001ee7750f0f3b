use serde::{Deserialize, Serialize};
use std::fmt;

/// Discrete trade action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

impl TradeAction {
    /// True for actions that should be written to the trade log.
    pub fn is_trade(&self) -> bool {
        !matches!(self, TradeAction::Hold)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
            TradeAction::Hold => "HOLD",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "BUY" => Some(TradeAction::Buy),
            "SELL" => Some(TradeAction::Sell),
            "HOLD" => Some(TradeAction::Hold),
            _ => None,
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of one decision cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeSignal {
    pub action: TradeAction,
    pub message: String,
    pub current_price: f64,
    /// Aggregate of the forecast the decision was based on.
    pub forecast_price: f64,
    /// Relative change of `forecast_price` over `current_price`, in percent.
    pub change_pct: f64,
}

/// Append-only trade log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLogEntry {
    /// Unix milliseconds.
    pub timestamp: i64,
    pub action: TradeAction,
    pub price: f64,
    pub quantity: f64,
}

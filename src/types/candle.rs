use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// OHLCV candle. `time` is the candle open time in unix milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(time: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// True when the candle closed above its open.
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }
}

/// A candle with its indicator readings attached.
///
/// Readings are `None` while the series is too short for the indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedCandle {
    #[serde(flatten)]
    pub candle: Candle,
    pub rsi: Option<f64>,
    pub ema: Option<f64>,
}

/// Candle sampling interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandleInterval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "3m")]
    ThreeMinutes,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "2h")]
    TwoHours,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "12h")]
    TwelveHours,
    #[serde(rename = "1d")]
    OneDay,
}

impl CandleInterval {
    /// Parse the exchange interval string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(CandleInterval::OneMinute),
            "3m" => Some(CandleInterval::ThreeMinutes),
            "5m" => Some(CandleInterval::FiveMinutes),
            "15m" => Some(CandleInterval::FifteenMinutes),
            "30m" => Some(CandleInterval::ThirtyMinutes),
            "1h" => Some(CandleInterval::OneHour),
            "2h" => Some(CandleInterval::TwoHours),
            "4h" => Some(CandleInterval::FourHours),
            "6h" => Some(CandleInterval::SixHours),
            "12h" => Some(CandleInterval::TwelveHours),
            "1d" => Some(CandleInterval::OneDay),
            _ => None,
        }
    }

    /// Exchange string for this interval.
    pub fn as_str(&self) -> &'static str {
        match self {
            CandleInterval::OneMinute => "1m",
            CandleInterval::ThreeMinutes => "3m",
            CandleInterval::FiveMinutes => "5m",
            CandleInterval::FifteenMinutes => "15m",
            CandleInterval::ThirtyMinutes => "30m",
            CandleInterval::OneHour => "1h",
            CandleInterval::TwoHours => "2h",
            CandleInterval::FourHours => "4h",
            CandleInterval::SixHours => "6h",
            CandleInterval::TwelveHours => "12h",
            CandleInterval::OneDay => "1d",
        }
    }

    /// Interval length in seconds.
    pub fn seconds(&self) -> i64 {
        match self {
            CandleInterval::OneMinute => 60,
            CandleInterval::ThreeMinutes => 180,
            CandleInterval::FiveMinutes => 300,
            CandleInterval::FifteenMinutes => 900,
            CandleInterval::ThirtyMinutes => 1800,
            CandleInterval::OneHour => 3600,
            CandleInterval::TwoHours => 7200,
            CandleInterval::FourHours => 14400,
            CandleInterval::SixHours => 21600,
            CandleInterval::TwelveHours => 43200,
            CandleInterval::OneDay => 86400,
        }
    }

    pub fn millis(&self) -> i64 {
        self.seconds() * 1000
    }
}

impl Default for CandleInterval {
    fn default() -> Self {
        CandleInterval::FiveMinutes
    }
}

impl fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest accepted candle open time, 9999-12-31T23:59:59.999Z in epoch millis.
pub const MAX_TIMESTAMP_MS: i64 = 253_402_300_799_999;

/// Check that a series is usable: non-empty, strictly ascending timestamps
/// within `0..=MAX_TIMESTAMP_MS`, finite non-negative prices and volume.
pub fn validate_series(candles: &[Candle]) -> Result<()> {
    if candles.is_empty() {
        return Err(ForecastError::UpstreamData("empty candle series".to_string()));
    }

    for (i, candle) in candles.iter().enumerate() {
        if !(0..=MAX_TIMESTAMP_MS).contains(&candle.time) {
            return Err(ForecastError::UpstreamData(format!(
                "candle timestamp {} out of range",
                candle.time
            )));
        }

        let values = [
            candle.open,
            candle.high,
            candle.low,
            candle.close,
            candle.volume,
        ];
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(ForecastError::UpstreamData(format!(
                "candle at {} has a negative or non-finite value",
                candle.time
            )));
        }

        if i > 0 && candle.time <= candles[i - 1].time {
            return Err(ForecastError::UpstreamData(format!(
                "timestamps not strictly ascending at index {} ({} after {})",
                i,
                candle.time,
                candles[i - 1].time
            )));
        }
    }

    Ok(())
}

/// Close prices of a series, in order.
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

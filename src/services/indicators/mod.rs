//! Technical indicators computed over a candle series.
//!
//! Indicators are informational in the forecasting pipeline: they enrich the
//! candles shown to the user and never feed the model.

pub mod ema;
pub mod rsi;

pub use ema::Ema;
pub use rsi::Rsi;

use crate::types::{Candle, EnrichedCandle};

/// Lookback used for the RSI reading.
pub const RSI_PERIOD: usize = 14;
/// Lookback used for the EMA reading.
pub const EMA_PERIOD: usize = 20;

/// Trait for per-candle technical indicators.
pub trait Indicator: Send + Sync {
    /// Unique identifier for this indicator.
    fn id(&self) -> &str;

    /// Minimum number of candles before the first reading is defined.
    fn min_periods(&self) -> usize;

    /// One reading per candle, aligned with the input.
    ///
    /// Readings are `None` until enough history exists; a series shorter
    /// than `min_periods` yields `None` everywhere.
    fn compute(&self, candles: &[Candle]) -> Vec<Option<f64>>;
}

/// Attach RSI(14) and EMA(20) readings to every candle.
pub fn enrich(candles: &[Candle]) -> Vec<EnrichedCandle> {
    let rsi = Rsi::new(RSI_PERIOD).compute(candles);
    let ema = Ema::new(EMA_PERIOD).compute(candles);

    candles
        .iter()
        .zip(rsi)
        .zip(ema)
        .map(|((candle, rsi), ema)| EnrichedCandle {
            candle: candle.clone(),
            rsi,
            ema,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(count: usize) -> Vec<Candle> {
        (0..count)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.7).sin() * 3.0 + i as f64 * 0.1;
                Candle::new(i as i64 * 60_000, close, close + 1.0, close - 1.0, close, 5.0)
            })
            .collect()
    }

    #[test]
    fn test_enrich_preserves_length_and_order() {
        let candles = series(40);
        let enriched = enrich(&candles);
        assert_eq!(enriched.len(), 40);
        for (e, c) in enriched.iter().zip(&candles) {
            assert_eq!(&e.candle, c);
        }
    }

    #[test]
    fn test_enrich_leading_readings_undefined() {
        let enriched = enrich(&series(40));
        assert!(enriched[..RSI_PERIOD - 1].iter().all(|e| e.rsi.is_none()));
        assert!(enriched[RSI_PERIOD - 1..].iter().all(|e| e.rsi.is_some()));
        assert!(enriched[..EMA_PERIOD - 1].iter().all(|e| e.ema.is_none()));
        assert!(enriched[EMA_PERIOD - 1..].iter().all(|e| e.ema.is_some()));
    }

    #[test]
    fn test_enrich_short_series_tolerated() {
        let enriched = enrich(&series(10));
        assert_eq!(enriched.len(), 10);
        assert!(enriched.iter().all(|e| e.rsi.is_none() && e.ema.is_none()));
    }

    #[test]
    fn test_enrich_empty_series() {
        assert!(enrich(&[]).is_empty());
    }
}

//! Exponential Moving Average (EMA) indicator.

use super::Indicator;
use crate::types::Candle;

/// EMA (Exponential Moving Average) of the close.
///
/// Seeded with the SMA of the first `period` closes, then smoothed with
/// multiplier `2 / (period + 1)`.
pub struct Ema {
    period: usize,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    fn multiplier(&self) -> f64 {
        2.0 / (self.period as f64 + 1.0)
    }
}

impl Indicator for Ema {
    fn id(&self) -> &str {
        "ema"
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    fn compute(&self, candles: &[Candle]) -> Vec<Option<f64>> {
        let mut readings = vec![None; candles.len()];
        if self.period == 0 || candles.len() < self.period {
            return readings;
        }

        let multiplier = self.multiplier();

        // First EMA is SMA
        let sma: f64 =
            candles.iter().take(self.period).map(|c| c.close).sum::<f64>() / self.period as f64;
        readings[self.period - 1] = Some(sma);

        let mut ema = sma;
        for (i, candle) in candles.iter().enumerate().skip(self.period) {
            ema = (candle.close - ema) * multiplier + ema;
            readings[i] = Some(ema);
        }

        readings
    }
}

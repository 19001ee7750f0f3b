//! Relative Strength Index (RSI) indicator.

use super::Indicator;
use crate::types::Candle;

/// RSI (Relative Strength Index) indicator.
///
/// Measures momentum by comparing the magnitude of recent gains to recent losses,
/// using Wilder's smoothing (`alpha = 1 / period`) seeded at the first candle,
/// whose change counts as zero. Values range from 0-100:
/// - Below 30: Oversold
/// - Above 70: Overbought
///
/// The first reading is at index `period - 1`. A window with no losses reads
/// 100, including a completely flat one.
pub struct Rsi {
    period: usize,
}

impl Default for Rsi {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    fn value(avg_gain: f64, avg_loss: f64) -> f64 {
        if avg_loss == 0.0 {
            return 100.0;
        }

        let rs = avg_gain / avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    }
}

impl Indicator for Rsi {
    fn id(&self) -> &str {
        "rsi"
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    fn compute(&self, candles: &[Candle]) -> Vec<Option<f64>> {
        let mut readings = vec![None; candles.len()];
        if self.period == 0 || candles.len() < self.min_periods() {
            return readings;
        }

        let alpha = 1.0 / self.period as f64;
        let mut avg_gain = 0.0;
        let mut avg_loss = 0.0;

        for i in 1..candles.len() {
            let change = candles[i].close - candles[i - 1].close;
            let (gain, loss) = if change > 0.0 { (change, 0.0) } else { (0.0, -change) };

            avg_gain += alpha * (gain - avg_gain);
            avg_loss += alpha * (loss - avg_loss);

            if i + 1 >= self.period {
                readings[i] = Some(Self::value(avg_gain, avg_loss));
            }
        }

        if self.period == 1 {
            readings[0] = Some(Self::value(0.0, 0.0));
        }

        readings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_uptrend_candles(count: usize) -> Vec<Candle> {
        (0..count)
            .map(|i| {
                let base = 100.0 + i as f64 * 1.5;
                Candle::new(1000000 + i as i64 * 60000, base, base + 2.0, base - 1.0, base + 1.0, 1000.0)
            })
            .collect()
    }

    fn create_downtrend_candles(count: usize) -> Vec<Candle> {
        (0..count)
            .map(|i| {
                let base = 200.0 - i as f64 * 1.5;
                Candle::new(1000000 + i as i64 * 60000, base, base + 1.0, base - 2.0, base - 1.0, 1000.0)
            })
            .collect()
    }

    fn create_choppy_candles(count: usize) -> Vec<Candle> {
        (0..count)
            .map(|i| {
                let close = if i % 2 == 0 { 100.0 } else { 101.0 + (i % 3) as f64 };
                Candle::new(i as i64 * 60000, close, close + 1.0, close - 1.0, close, 10.0)
            })
            .collect()
    }

    #[test]
    fn test_rsi_min_periods() {
        let rsi = Rsi::default();
        assert_eq!(rsi.id(), "rsi");
        assert_eq!(rsi.min_periods(), 14);
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let readings = Rsi::default().compute(&create_uptrend_candles(13));
        assert_eq!(readings.len(), 13);
        assert!(readings.iter().all(Option::is_none));
    }

    #[test]
    fn test_rsi_first_reading_at_period_minus_one() {
        let readings = Rsi::default().compute(&create_uptrend_candles(14));
        assert!(readings[12].is_none());
        assert!(readings[13].is_some());
    }

    #[test]
    fn test_rsi_wilder_smoothing() {
        // closes 10, 11, 10 with period 2: gains 0, 1, 0 and losses 0, 0, 1
        let candles: Vec<Candle> = [10.0, 11.0, 10.0]
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle::new(i as i64, c, c, c, c, 1.0))
            .collect();
        let readings = Rsi::new(2).compute(&candles);
        assert_eq!(readings[0], None);
        assert_eq!(readings[1], Some(100.0));
        // avg_gain 0.25, avg_loss 0.5
        let value = readings[2].unwrap();
        assert!((value - 100.0 / 3.0).abs() < 1e-9, "got {}", value);
    }

    #[test]
    fn test_rsi_uptrend_is_max() {
        let readings = Rsi::default().compute(&create_uptrend_candles(50));
        assert_eq!(readings.last().copied().flatten(), Some(100.0));
    }

    #[test]
    fn test_rsi_downtrend_low_value() {
        let readings = Rsi::default().compute(&create_downtrend_candles(50));
        let value = readings.last().copied().flatten().unwrap();
        assert!(value < 50.0, "RSI in downtrend should be < 50, got {}", value);
    }

    #[test]
    fn test_rsi_value_range() {
        let readings = Rsi::default().compute(&create_choppy_candles(60));
        for value in readings.into_iter().flatten() {
            assert!((0.0..=100.0).contains(&value));
        }
    }

    #[test]
    fn test_rsi_flat_series_has_no_losses() {
        let candles: Vec<Candle> = (0..20)
            .map(|i| Candle::new(i, 50.0, 50.0, 50.0, 50.0, 1.0))
            .collect();
        let readings = Rsi::default().compute(&candles);
        assert_eq!(readings[19], Some(100.0));
    }

    #[test]
    fn test_rsi_custom_period() {
        let rsi = Rsi::new(7);
        assert_eq!(rsi.min_periods(), 7);
        let readings = rsi.compute(&create_uptrend_candles(20));
        assert!(readings[6].is_some());
        assert!(readings[5].is_none());
    }
}

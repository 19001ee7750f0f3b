pub mod binance;

pub use binance::BinanceClient;

use crate::error::Result;
use crate::types::{Candle, CandleInterval};
use std::future::Future;

/// Supplier of recent candles for one symbol and interval.
///
/// Implementations return candles ascending by time with unique
/// timestamps; any failure is an `UpstreamData` error.
pub trait MarketDataSource: Send + Sync {
    fn name(&self) -> &str;

    fn fetch_candles(
        &self,
        symbol: &str,
        interval: CandleInterval,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Candle>>> + Send;
}

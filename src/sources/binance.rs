use super::MarketDataSource;
use crate::error::{ForecastError, Result};
use crate::types::{validate_series, Candle, CandleInterval};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub const BINANCE_API_URL: &str = "https://api.binance.com/api/v3";

/// Binance's per-request kline cap.
const MAX_KLINES: usize = 1000;

/// Symbol mapping for Binance (symbol -> Binance trading pair).
pub const SYMBOL_PAIRS: &[(&str, &str)] = &[
    ("btc", "BTCUSDT"),
    ("eth", "ETHUSDT"),
    ("bnb", "BNBUSDT"),
    ("sol", "SOLUSDT"),
    ("xrp", "XRPUSDT"),
    ("doge", "DOGEUSDT"),
    ("ada", "ADAUSDT"),
    ("avax", "AVAXUSDT"),
    ("dot", "DOTUSDT"),
    ("link", "LINKUSDT"),
    ("ltc", "LTCUSDT"),
];

/// Resolve a short symbol (`btc`) or a pair (`btcusdt`) to the Binance pair.
pub fn trading_pair(symbol: &str) -> String {
    let lower = symbol.trim().to_lowercase();
    SYMBOL_PAIRS
        .iter()
        .find(|(s, _)| *s == lower)
        .map(|(_, pair)| pair.to_string())
        .unwrap_or_else(|| lower.to_uppercase())
}

/// At most `max_chars` characters of an upstream body, for logging.
fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Binance REST client for klines.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
}

impl BinanceClient {
    /// Create a new Binance client.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .user_agent("pricecast/0.1")
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_klines(&self, pair: &str, interval: CandleInterval, limit: usize) -> Result<Value> {
        let url = format!("{}/klines", self.base_url);
        let limit = limit.clamp(1, MAX_KLINES).to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", pair),
                ("interval", interval.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ForecastError::UpstreamData(format!("Binance request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!("Binance API returned {}: {}", status, excerpt(&text, 200));
            return Err(ForecastError::UpstreamData(format!(
                "Binance API error: {}",
                status
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ForecastError::UpstreamData(format!("Binance response not JSON: {}", e)))
    }
}

impl MarketDataSource for BinanceClient {
    fn name(&self) -> &str {
        "binance"
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: CandleInterval,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let pair = trading_pair(symbol);
        let body = self.fetch_klines(&pair, interval, limit).await?;
        let candles = parse_klines(&body)?;
        validate_series(&candles)?;

        debug!(
            "Binance klines: {} {} x{} (last close {:.2})",
            pair,
            interval,
            candles.len(),
            candles.last().map(|c| c.close).unwrap_or_default()
        );
        Ok(candles)
    }
}

fn number(row: &[Value], idx: usize, field: &str) -> Result<f64> {
    let value = row
        .get(idx)
        .ok_or_else(|| ForecastError::UpstreamData(format!("kline missing {}", field)))?;
    let parsed = match value {
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed.ok_or_else(|| ForecastError::UpstreamData(format!("kline {} not numeric: {}", field, value)))
}

/// Decode the kline array response:
/// `[[openTime, "open", "high", "low", "close", "volume", closeTime, ...], ...]`.
pub fn parse_klines(body: &Value) -> Result<Vec<Candle>> {
    let rows = body
        .as_array()
        .ok_or_else(|| ForecastError::UpstreamData("klines response is not an array".to_string()))?;

    rows.iter()
        .map(|row| {
            let row = row
                .as_array()
                .ok_or_else(|| ForecastError::UpstreamData("kline row is not an array".to_string()))?;
            let time = row
                .first()
                .and_then(Value::as_i64)
                .ok_or_else(|| ForecastError::UpstreamData("kline missing open time".to_string()))?;

            Ok(Candle {
                time,
                open: number(row, 1, "open")?,
                high: number(row, 2, "high")?,
                low: number(row, 3, "low")?,
                close: number(row, 4, "close")?,
                volume: number(row, 5, "volume")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // =========================================================================
    // SYMBOL_PAIRS Tests
    // =========================================================================

    #[test]
    fn test_symbol_pairs_contains_btc() {
        let btc = SYMBOL_PAIRS.iter().find(|(s, _)| *s == "btc");
        assert!(btc.is_some());
        assert_eq!(btc.unwrap().1, "BTCUSDT");
    }

    #[test]
    fn test_symbol_pairs_all_usdt() {
        for (_, pair) in SYMBOL_PAIRS {
            assert!(pair.ends_with("USDT"));
        }
    }

    #[test]
    fn test_trading_pair_resolution() {
        assert_eq!(trading_pair("btc"), "BTCUSDT");
        assert_eq!(trading_pair("ETH"), "ETHUSDT");
        assert_eq!(trading_pair("BTCUSDT"), "BTCUSDT");
        assert_eq!(trading_pair("pepeusdt"), "PEPEUSDT");
    }

    // =========================================================================
    // Kline parsing Tests
    // =========================================================================

    #[test]
    fn test_parse_klines() {
        let body = json!([
            [1700000000000i64, "43000.10", "43100.00", "42950.50", "43050.25", "12.5", 1700000299999i64, "0", 10, "0", "0", "0"],
            [1700000300000i64, "43050.25", "43200.00", "43000.00", "43150.00", "8.25", 1700000599999i64, "0", 12, "0", "0", "0"]
        ]);

        let candles = parse_klines(&body).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].time, 1_700_000_000_000);
        assert_eq!(candles[0].open, 43000.10);
        assert_eq!(candles[0].close, 43050.25);
        assert_eq!(candles[1].volume, 8.25);
    }

    #[test]
    fn test_parse_klines_empty() {
        assert!(parse_klines(&json!([])).unwrap().is_empty());
    }

    #[test]
    fn test_parse_klines_rejects_error_object() {
        let body = json!({"code": -1121, "msg": "Invalid symbol."});
        assert!(matches!(
            parse_klines(&body),
            Err(ForecastError::UpstreamData(_))
        ));
    }

    #[test]
    fn test_parse_klines_rejects_bad_number() {
        let body = json!([[1700000000000i64, "abc", "1", "1", "1", "1"]]);
        assert!(matches!(
            parse_klines(&body),
            Err(ForecastError::UpstreamData(_))
        ));
    }

    #[test]
    fn test_parse_klines_short_row() {
        let body = json!([[1700000000000i64, "1", "1"]]);
        assert!(parse_klines(&body).is_err());
    }

    #[test]
    fn test_client_trims_base_url() {
        let client = BinanceClient::new("http://localhost:9/api/v3/", Duration::from_secs(1));
        assert_eq!(client.base_url, "http://localhost:9/api/v3");
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        let body = format!("{}é tail", "x".repeat(199));
        let cut = excerpt(&body, 200);
        assert_eq!(cut.chars().count(), 200);
        assert!(cut.ends_with('é'));
        assert_eq!(excerpt("short", 200), "short");
    }

    /// Serve one HTTP response with `status` and `body`, then close.
    async fn serve_once(status: &'static str, body: String) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_multibyte_error_body_is_upstream_error() {
        // Logged arguments are only evaluated with a subscriber listening
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let body = format!("{}é</html>", "x".repeat(199));
        let base_url = serve_once("503 Service Unavailable", body).await;
        let client = BinanceClient::new(base_url, Duration::from_secs(5));

        let result = client
            .fetch_candles("btc", CandleInterval::OneMinute, 10)
            .await;
        match result {
            Err(ForecastError::UpstreamData(msg)) => assert!(msg.contains("503")),
            other => panic!("expected upstream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_host_is_upstream_error() {
        let client = BinanceClient::new("http://127.0.0.1:9", Duration::from_millis(500));
        let result = client
            .fetch_candles("btc", CandleInterval::OneMinute, 10)
            .await;
        assert!(matches!(result, Err(ForecastError::UpstreamData(_))));
    }
}

use crate::services::decision::{DecisionPolicy, ForecastAggregate};
use crate::services::forecast::ModelConfig;
use crate::sources::binance::BINANCE_API_URL;
use crate::types::CandleInterval;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Model training configuration.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Input window length.
    pub lookback: usize,
    /// Forecast horizon.
    pub future_steps: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Dropout between recurrent layers.
    pub dropout: f64,
    /// Fixed seed for reproducible runs (unset = random).
    pub seed: Option<u64>,
    /// Candles fetched for a training run.
    pub history_limit: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            lookback: 24,
            future_steps: 24,
            epochs: 50,
            batch_size: 32,
            learning_rate: 0.001,
            dropout: 0.2,
            seed: None,
            history_limit: 1000,
        }
    }
}

impl TrainingConfig {
    /// Model configuration for these settings.
    pub fn model_config(&self) -> ModelConfig {
        let config = ModelConfig::new(self.lookback, self.future_steps)
            .with_epochs(self.epochs)
            .with_batch_size(self.batch_size)
            .with_learning_rate(self.learning_rate)
            .with_dropout(self.dropout);
        match self.seed {
            Some(seed) => config.with_seed(seed),
            None => config,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Trading pair or short symbol (`btc`).
    pub symbol: String,
    /// Candle interval; also the spacing of forecast points.
    pub interval: CandleInterval,
    /// Candles fetched per refresh.
    pub fetch_limit: usize,
    /// Binance REST base URL.
    pub binance_api_url: String,
    /// Upstream request timeout.
    pub http_timeout: Duration,
    /// Refresh loop period.
    pub refresh_interval: Duration,
    /// Directory holding the model/scaler pair.
    pub artifact_dir: PathBuf,
    /// CSV trade log.
    pub trade_log_path: PathBuf,
    /// Log file used while the terminal dashboard owns the screen.
    pub log_file: PathBuf,
    pub training: TrainingConfig,
    pub decision: DecisionPolicy,
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable values fall back to defaults.
    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = TrainingConfig::default();
        let policy = DecisionPolicy::default();

        let training = TrainingConfig {
            lookback: parse_or(get("LOOKBACK"), defaults.lookback),
            future_steps: parse_or(get("FUTURE_STEPS"), defaults.future_steps),
            epochs: parse_or(get("EPOCHS"), defaults.epochs),
            batch_size: parse_or(get("BATCH_SIZE"), defaults.batch_size),
            learning_rate: parse_or(get("LEARNING_RATE"), defaults.learning_rate),
            dropout: parse_or(get("DROPOUT"), defaults.dropout),
            seed: get("TRAINING_SEED").and_then(|v| v.trim().parse().ok()),
            history_limit: parse_or(get("TRAINING_LIMIT"), defaults.history_limit),
        };

        let decision = DecisionPolicy {
            buy_threshold_pct: parse_or(get("BUY_THRESHOLD_PCT"), policy.buy_threshold_pct),
            sell_threshold_pct: parse_or(get("SELL_THRESHOLD_PCT"), policy.sell_threshold_pct),
            aggregate: get("FORECAST_AGGREGATE")
                .and_then(|v| ForecastAggregate::from_str(&v))
                .unwrap_or(policy.aggregate),
            quantity: parse_or(get("TRADE_QUANTITY"), policy.quantity),
        };

        Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(get("PORT"), 3001),
            symbol: get("SYMBOL").unwrap_or_else(|| "BTCUSDT".to_string()),
            interval: get("CANDLE_INTERVAL")
                .and_then(|v| CandleInterval::from_str(v.trim()))
                .unwrap_or_default(),
            fetch_limit: parse_or(get("FETCH_LIMIT"), 120),
            binance_api_url: get("BINANCE_API_URL").unwrap_or_else(|| BINANCE_API_URL.to_string()),
            http_timeout: Duration::from_secs(parse_or(get("HTTP_TIMEOUT_SECS"), 10)),
            refresh_interval: Duration::from_secs(parse_or::<u64>(get("REFRESH_SECS"), 60).max(1)),
            artifact_dir: PathBuf::from(get("ARTIFACT_DIR").unwrap_or_else(|| "models".to_string())),
            trade_log_path: PathBuf::from(
                get("TRADE_LOG_PATH").unwrap_or_else(|| "logs/trade_log.csv".to_string()),
            ),
            log_file: PathBuf::from(get("LOG_FILE").unwrap_or_else(|| "logs/pricecast.log".to_string())),
            training,
            decision,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3001);
        assert_eq!(config.symbol, "BTCUSDT");
        assert_eq!(config.interval, CandleInterval::FiveMinutes);
        assert_eq!(config.fetch_limit, 120);
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert_eq!(config.refresh_interval, Duration::from_secs(60));
        assert_eq!(config.artifact_dir, PathBuf::from("models"));
        assert_eq!(config.trade_log_path, PathBuf::from("logs/trade_log.csv"));
        assert_eq!(config.training.lookback, 24);
        assert_eq!(config.training.future_steps, 24);
        assert_eq!(config.training.history_limit, 1000);
        assert!(config.training.seed.is_none());
        assert_eq!(config.decision, DecisionPolicy::default());
    }

    #[test]
    fn test_overrides() {
        let config = config_with(&[
            ("PORT", "8080"),
            ("SYMBOL", "eth"),
            ("CANDLE_INTERVAL", "1h"),
            ("LOOKBACK", "12"),
            ("TRAINING_SEED", "42"),
            ("BUY_THRESHOLD_PCT", "1.5"),
            ("FORECAST_AGGREGATE", "last"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.symbol, "eth");
        assert_eq!(config.interval, CandleInterval::OneHour);
        assert_eq!(config.training.lookback, 12);
        assert_eq!(config.training.seed, Some(42));
        assert_eq!(config.decision.buy_threshold_pct, 1.5);
        assert_eq!(config.decision.sell_threshold_pct, 0.5);
        assert_eq!(config.decision.aggregate, ForecastAggregate::Last);
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_with(&[
            ("PORT", "not-a-port"),
            ("CANDLE_INTERVAL", "7m"),
            ("EPOCHS", "-3"),
            ("REFRESH_SECS", "0"),
        ]);
        assert_eq!(config.port, 3001);
        assert_eq!(config.interval, CandleInterval::FiveMinutes);
        assert_eq!(config.training.epochs, 50);
        assert_eq!(config.refresh_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_model_config_from_training() {
        let training = TrainingConfig {
            epochs: 5,
            seed: Some(3),
            ..TrainingConfig::default()
        };
        let model = training.model_config();
        assert_eq!(model.lookback, 24);
        assert_eq!(model.horizon, 24);
        assert_eq!(model.epochs, 5);
        assert_eq!(model.seed, Some(3));
        assert_eq!(model.recurrent_units, vec![100, 100, 50]);
    }
}

//! Refresh loop service
//!
//! Periodically runs fetch -> indicators -> forecast -> decide -> log and
//! publishes the result as a [`DashboardSnapshot`]. A failed stage never
//! stops the loop; it turns into the snapshot's status line.

use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::services::decision::DecisionPolicy;
use crate::services::forecast::{ArtifactManifest, ArtifactStore, Forecaster};
use crate::services::indicators::enrich;
use crate::services::trade_log::{record_blocking, TradeLogSink};
use crate::sources::MarketDataSource;
use crate::types::{Candle, CandleInterval, DashboardSnapshot, Forecast, TradeSignal};

/// What the monitor watches and how often.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub symbol: String,
    pub interval: CandleInterval,
    pub fetch_limit: usize,
    pub refresh_interval: Duration,
}

/// Owns the loaded forecaster and the latest snapshot.
pub struct Monitor<S: MarketDataSource> {
    source: S,
    store: ArtifactStore,
    policy: DecisionPolicy,
    trade_log: Arc<dyn TradeLogSink>,
    settings: MonitorSettings,
    forecaster: RwLock<Option<Arc<Forecaster>>>,
    snapshot: RwLock<DashboardSnapshot>,
    shutdown_tx: broadcast::Sender<()>,
}

impl<S: MarketDataSource> Monitor<S> {
    pub fn new(
        source: S,
        store: ArtifactStore,
        policy: DecisionPolicy,
        trade_log: Arc<dyn TradeLogSink>,
        settings: MonitorSettings,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let snapshot = DashboardSnapshot {
            symbol: settings.symbol.clone(),
            interval: settings.interval,
            candles: Vec::new(),
            latest_price: None,
            forecast: None,
            signal: None,
            status: "waiting for first refresh".to_string(),
            updated_at: 0,
        };

        Self {
            source,
            store,
            policy,
            trade_log,
            settings,
            forecaster: RwLock::new(None),
            snapshot: RwLock::new(snapshot),
            shutdown_tx,
        }
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Latest published snapshot.
    pub async fn snapshot(&self) -> DashboardSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Manifest of the loaded pair, if any.
    pub async fn manifest(&self) -> Option<ArtifactManifest> {
        self.forecaster
            .read()
            .await
            .as_ref()
            .map(|f| f.manifest().clone())
    }

    /// Replace the loaded pair with the one currently on disk.
    ///
    /// On failure the previously loaded pair, if any, stays in use.
    pub async fn reload_artifacts(&self) -> Result<ArtifactManifest> {
        let fresh = Forecaster::load(&self.store)?;
        let manifest = fresh.manifest().clone();
        *self.forecaster.write().await = Some(Arc::new(fresh));
        info!("Loaded forecast artifacts {}", manifest.id);
        Ok(manifest)
    }

    /// Loaded forecaster, loading from disk when none is present yet.
    async fn current_forecaster(&self) -> Result<Arc<Forecaster>> {
        if let Some(forecaster) = self.forecaster.read().await.as_ref() {
            return Ok(Arc::clone(forecaster));
        }

        let loaded = Arc::new(Forecaster::load(&self.store)?);
        info!("Loaded forecast artifacts {}", loaded.manifest().id);
        *self.forecaster.write().await = Some(Arc::clone(&loaded));
        Ok(loaded)
    }

    async fn predict(&self, candles: &[Candle]) -> Result<(Forecast, TradeSignal)> {
        let forecaster = self.current_forecaster().await?;
        let forecast = forecaster.forecast(candles, self.settings.interval)?;
        let current_price = candles
            .last()
            .map(|c| c.close)
            .unwrap_or(f64::NAN);
        let signal = self.policy.decide(current_price, &forecast)?;
        Ok((forecast, signal))
    }

    /// Fire-and-forget: a failing sink is logged and never fails the cycle.
    async fn record_trade(&self, signal: &TradeSignal, timestamp: i64) {
        if let Some(entry) = self.policy.log_entry(signal, timestamp) {
            let action = entry.action;
            if let Err(e) = record_blocking(Arc::clone(&self.trade_log), entry).await {
                warn!("Failed to record {} in trade log: {}", action, e);
            }
        }
    }

    /// Run one refresh cycle and publish its snapshot.
    pub async fn run_cycle(&self) -> DashboardSnapshot {
        let now = chrono::Utc::now().timestamp_millis();
        let mut snapshot = DashboardSnapshot {
            symbol: self.settings.symbol.clone(),
            interval: self.settings.interval,
            candles: Vec::new(),
            latest_price: None,
            forecast: None,
            signal: None,
            status: String::new(),
            updated_at: now,
        };

        match self
            .source
            .fetch_candles(&self.settings.symbol, self.settings.interval, self.settings.fetch_limit)
            .await
        {
            Err(e) => {
                warn!("Market data fetch failed: {}", e);
                snapshot.status = format!("market data unavailable: {}", e);
            }
            Ok(candles) => {
                snapshot.latest_price = candles.last().map(|c| c.close);
                snapshot.candles = enrich(&candles);

                match self.predict(&candles).await {
                    Ok((forecast, signal)) => {
                        debug!(
                            action = %signal.action,
                            change_pct = signal.change_pct,
                            "decision"
                        );
                        self.record_trade(&signal, now).await;
                        snapshot.status = signal.message.clone();
                        snapshot.forecast = Some(forecast);
                        snapshot.signal = Some(signal);
                    }
                    Err(e) => {
                        if e.is_missing_artifact() {
                            debug!("No forecast artifacts yet: {}", e);
                        } else {
                            warn!("Prediction failed: {}", e);
                        }
                        snapshot.status = format!("prediction unavailable: {}", e);
                    }
                }
            }
        }

        *self.snapshot.write().await = snapshot.clone();
        snapshot
    }

    /// Refresh until [`Monitor::stop`] is called.
    pub async fn run(&self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut ticker = interval(self.settings.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Monitor started: {} {} every {}s via {}",
            self.settings.symbol,
            self.settings.interval,
            self.settings.refresh_interval.as_secs(),
            self.source.name()
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let snapshot = self.run_cycle().await;
                    if !snapshot.has_prediction() {
                        debug!("Cycle status: {}", snapshot.status);
                    }
                }
                result = shutdown_rx.recv() => {
                    if let Err(e) = result {
                        error!("Monitor shutdown channel error: {}", e);
                    }
                    info!("Monitor received shutdown signal");
                    break;
                }
            }
        }
    }

    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForecastError;
    use crate::services::forecast::{train_forecaster, ModelConfig};
    use crate::types::{TradeAction, TradeLogEntry};
    use std::sync::Mutex;
    use uuid::Uuid;

    struct StubSource {
        candles: Vec<Candle>,
    }

    impl MarketDataSource for StubSource {
        fn name(&self) -> &str {
            "stub"
        }

        async fn fetch_candles(
            &self,
            _symbol: &str,
            _interval: CandleInterval,
            _limit: usize,
        ) -> Result<Vec<Candle>> {
            if self.candles.is_empty() {
                Err(ForecastError::UpstreamData("offline".to_string()))
            } else {
                Ok(self.candles.clone())
            }
        }
    }

    #[derive(Default)]
    struct MemoryLog {
        entries: Mutex<Vec<TradeLogEntry>>,
    }

    impl TradeLogSink for MemoryLog {
        fn record(&self, entry: &TradeLogEntry) -> Result<()> {
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }
    }

    struct FailingLog;

    impl TradeLogSink for FailingLog {
        fn record(&self, _entry: &TradeLogEntry) -> Result<()> {
            Err(ForecastError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only trade log",
            )))
        }
    }

    fn candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let close = 200.0 + 20.0 * (i as f64 * 0.2).sin();
                Candle::new(i as i64 * 60_000, close, close + 1.0, close - 1.0, close, 1.0)
            })
            .collect()
    }

    fn settings() -> MonitorSettings {
        MonitorSettings {
            symbol: "BTCUSDT".to_string(),
            interval: CandleInterval::OneMinute,
            fetch_limit: 40,
            refresh_interval: Duration::from_millis(10),
        }
    }

    fn temp_store() -> ArtifactStore {
        ArtifactStore::new(std::env::temp_dir().join(format!("pricecast_monitor_{}", Uuid::new_v4())))
    }

    #[tokio::test]
    async fn test_initial_snapshot() {
        let monitor = Monitor::new(
            StubSource { candles: vec![] },
            temp_store(),
            DecisionPolicy::default(),
            Arc::new(MemoryLog::default()),
            settings(),
        );
        let snapshot = monitor.snapshot().await;
        assert_eq!(snapshot.updated_at, 0);
        assert!(snapshot.candles.is_empty());
        assert!(monitor.manifest().await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_failure_becomes_status() {
        let monitor = Monitor::new(
            StubSource { candles: vec![] },
            temp_store(),
            DecisionPolicy::default(),
            Arc::new(MemoryLog::default()),
            settings(),
        );
        let snapshot = monitor.run_cycle().await;
        assert!(snapshot.status.starts_with("market data unavailable"));
        assert!(snapshot.forecast.is_none());
        assert_eq!(monitor.snapshot().await.status, snapshot.status);
    }

    #[tokio::test]
    async fn test_missing_artifacts_becomes_status() {
        let monitor = Monitor::new(
            StubSource { candles: candles(40) },
            temp_store(),
            DecisionPolicy::default(),
            Arc::new(MemoryLog::default()),
            settings(),
        );
        let snapshot = monitor.run_cycle().await;
        assert!(snapshot.status.starts_with("prediction unavailable"));
        assert_eq!(snapshot.candles.len(), 40);
        assert!(snapshot.latest_price.is_some());
        assert!(!snapshot.has_prediction());
    }

    #[tokio::test]
    async fn test_picks_up_trained_artifacts() {
        let store = temp_store();
        let log = Arc::new(MemoryLog::default());
        let policy = DecisionPolicy {
            buy_threshold_pct: -100.0,
            ..DecisionPolicy::default()
        };
        let monitor = Monitor::new(
            StubSource { candles: candles(40) },
            store.clone(),
            policy,
            log.clone(),
            settings(),
        );

        assert!(!monitor.run_cycle().await.has_prediction());

        train_forecaster(
            &candles(40),
            ModelConfig::tiny(8, 4),
            &store,
            "BTCUSDT",
            CandleInterval::OneMinute,
        )
        .unwrap();

        let snapshot = monitor.run_cycle().await;
        assert!(snapshot.has_prediction());
        assert_eq!(snapshot.forecast.as_ref().unwrap().len(), 4);
        // A threshold below -100% makes every decision a BUY
        assert_eq!(snapshot.signal.as_ref().unwrap().action, TradeAction::Buy);
        assert_eq!(log.entries.lock().unwrap().len(), 1);
        assert!(monitor.manifest().await.is_some());
        let _ = std::fs::remove_dir_all(store.dir());
    }

    #[tokio::test]
    async fn test_failing_trade_log_does_not_fail_cycle() {
        let store = temp_store();
        train_forecaster(
            &candles(40),
            ModelConfig::tiny(8, 4),
            &store,
            "BTCUSDT",
            CandleInterval::OneMinute,
        )
        .unwrap();

        let policy = DecisionPolicy {
            buy_threshold_pct: -100.0,
            ..DecisionPolicy::default()
        };
        let monitor = Monitor::new(
            StubSource { candles: candles(40) },
            store.clone(),
            policy,
            Arc::new(FailingLog),
            settings(),
        );

        for _ in 0..2 {
            let snapshot = monitor.run_cycle().await;
            assert!(snapshot.has_prediction());
            assert_eq!(snapshot.signal.as_ref().unwrap().action, TradeAction::Buy);
            assert!(snapshot.status.starts_with("BUY"));
        }
        assert!(monitor.snapshot().await.forecast.is_some());
        let _ = std::fs::remove_dir_all(store.dir());
    }

    #[tokio::test]
    async fn test_reload_without_artifacts_fails() {
        let monitor = Monitor::new(
            StubSource { candles: candles(40) },
            temp_store(),
            DecisionPolicy::default(),
            Arc::new(MemoryLog::default()),
            settings(),
        );
        let err = monitor.reload_artifacts().await.unwrap_err();
        assert!(err.is_missing_artifact());
    }

    #[tokio::test]
    async fn test_run_stops_on_signal() {
        let monitor = Arc::new(Monitor::new(
            StubSource { candles: vec![] },
            temp_store(),
            DecisionPolicy::default(),
            Arc::new(MemoryLog::default()),
            settings(),
        ));

        let runner = Arc::clone(&monitor);
        let handle = tokio::spawn(async move { runner.run().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        monitor.stop();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();

        assert!(monitor.snapshot().await.updated_at > 0);
    }
}

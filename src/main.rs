mod api;
mod tui;

use anyhow::Context;
use axum::Router;
use pricecast::config::Config;
use pricecast::services::{
    train_forecaster, ArtifactStore, CsvTradeLog, Monitor, MonitorSettings, TradeLogSink,
};
use pricecast::sources::{BinanceClient, MarketDataSource};
use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub monitor: Arc<Monitor<BinanceClient>>,
    pub trade_log: Arc<CsvTradeLog>,
}

/// Subcommand given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Train,
    Serve,
    Tui,
}

impl Command {
    fn parse(arg: Option<&str>) -> anyhow::Result<Self> {
        match arg {
            None | Some("serve") => Ok(Command::Serve),
            Some("train") => Ok(Command::Train),
            Some("tui") => Ok(Command::Tui),
            Some(other) => anyhow::bail!("unknown command '{}' (expected train, serve or tui)", other),
        }
    }
}

fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pricecast=debug,tower_http=debug".into())
}

/// Log to stdout, or to `config.log_file` while the dashboard owns the terminal.
fn init_tracing(command: Command, config: &Config) -> anyhow::Result<()> {
    if command == Command::Tui {
        if let Some(parent) = config.log_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file)
            .with_context(|| format!("opening log file {}", config.log_file.display()))?;

        tracing_subscriber::registry()
            .with(env_filter())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
    Ok(())
}

fn build_state(config: Arc<Config>) -> AppState {
    let source = BinanceClient::new(config.binance_api_url.clone(), config.http_timeout);
    let trade_log = Arc::new(CsvTradeLog::new(config.trade_log_path.clone()));
    let sink: Arc<dyn TradeLogSink> = trade_log.clone();

    let monitor = Arc::new(Monitor::new(
        source,
        ArtifactStore::new(config.artifact_dir.clone()),
        config.decision.clone(),
        sink,
        MonitorSettings {
            symbol: config.symbol.clone(),
            interval: config.interval,
            fetch_limit: config.fetch_limit,
            refresh_interval: config.refresh_interval,
        },
    ));

    AppState {
        config,
        monitor,
        trade_log,
    }
}

/// Fetch training history, fit, train and persist the model/scaler pair.
async fn train(config: &Config) -> anyhow::Result<()> {
    let source = BinanceClient::new(config.binance_api_url.clone(), config.http_timeout);
    let candles = source
        .fetch_candles(&config.symbol, config.interval, config.training.history_limit)
        .await
        .context("fetching training history")?;
    info!(
        "Fetched {} {} candles for {} from {}",
        candles.len(),
        config.interval,
        config.symbol,
        source.name()
    );

    let model_config = config.training.model_config();
    let store = ArtifactStore::new(config.artifact_dir.clone());
    let symbol = config.symbol.clone();
    let interval = config.interval;

    let (forecaster, report) = tokio::task::spawn_blocking(move || {
        train_forecaster(&candles, model_config, &store, &symbol, interval)
    })
    .await
    .context("training task panicked")??;

    info!(
        "Training complete: {} samples, {} epochs, {} parameters, final loss {:.6}, artifacts {}",
        report.samples,
        report.epochs,
        forecaster.model().parameter_count(),
        report.final_loss,
        forecaster.manifest().id
    );
    Ok(())
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn serve(config: Arc<Config>) -> anyhow::Result<()> {
    let state = build_state(config.clone());

    if let Err(e) = state.monitor.reload_artifacts().await {
        warn!("Starting without a model: {}", e);
    }

    {
        let monitor = state.monitor.clone();
        tokio::spawn(async move { monitor.run().await });
    }

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("pricecast listening on {}", addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn dashboard(config: Arc<Config>) -> anyhow::Result<()> {
    let state = build_state(config);

    if let Err(e) = state.monitor.reload_artifacts().await {
        warn!("Starting without a model: {}", e);
    }

    let monitor = state.monitor.clone();
    let refresh = tokio::spawn(async move { monitor.run().await });

    let result = tui::run_tui(state.clone()).await;

    state.monitor.stop();
    let _ = refresh.await;
    result.context("terminal dashboard")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let arg = std::env::args().nth(1);
    let command = Command::parse(arg.as_deref())?;
    let config = Arc::new(Config::from_env());
    init_tracing(command, &config)?;

    info!(
        "pricecast {} ({:?}): {} {}",
        env!("CARGO_PKG_VERSION"),
        command,
        config.symbol,
        config.interval
    );

    match command {
        Command::Train => train(&config).await,
        Command::Serve => serve(config).await,
        Command::Tui => dashboard(config).await,
    }
}

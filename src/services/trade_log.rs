//! Append-only trade log.

use crate::error::{ForecastError, Result};
use crate::format::{format_timestamp, TIMESTAMP_FORMAT};
use crate::types::{TradeAction, TradeLogEntry};
use chrono::NaiveDateTime;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tracing::debug;

const HEADER: [&str; 4] = ["Timestamp", "Action", "Price", "Quantity"];

/// Destination for BUY/SELL records.
pub trait TradeLogSink: Send + Sync {
    fn record(&self, entry: &TradeLogEntry) -> Result<()>;
}

/// CSV file sink: `Timestamp,Action,Price,Quantity`.
///
/// The header is written only when the file is created.
#[derive(Debug)]
pub struct CsvTradeLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvTradeLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every entry in the file, oldest first. A missing file is an empty log.
    pub fn load_entries(&self) -> Result<Vec<TradeLogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut entries = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.len() < 4 {
                continue;
            }
            let timestamp = NaiveDateTime::parse_from_str(&record[0], TIMESTAMP_FORMAT)
                .map(|dt| dt.and_utc().timestamp_millis())
                .map_err(|e| ForecastError::UpstreamData(format!("bad trade log timestamp: {}", e)))?;
            let action = TradeAction::from_str(&record[1]).ok_or_else(|| {
                ForecastError::UpstreamData(format!("bad trade log action: {}", &record[1]))
            })?;
            let price = record[2]
                .parse::<f64>()
                .map_err(|e| ForecastError::UpstreamData(format!("bad trade log price: {}", e)))?;
            let quantity = record[3]
                .parse::<f64>()
                .map_err(|e| ForecastError::UpstreamData(format!("bad trade log quantity: {}", e)))?;

            entries.push(TradeLogEntry {
                timestamp,
                action,
                price,
                quantity,
            });
        }

        Ok(entries)
    }

    /// The newest `limit` entries, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<TradeLogEntry>> {
        let mut entries = self.load_entries()?;
        entries.reverse();
        entries.truncate(limit);
        Ok(entries)
    }

    /// [`CsvTradeLog::recent`] on the blocking thread pool.
    pub async fn read_recent(self: Arc<Self>, limit: usize) -> Result<Vec<TradeLogEntry>> {
        tokio::task::spawn_blocking(move || self.recent(limit))
            .await
            .map_err(|e| ForecastError::Io(std::io::Error::other(e)))?
    }

    /// Modification time and length of the file, `None` while it does not
    /// exist. Changes whenever an entry is appended.
    pub async fn stamp(&self) -> Option<(SystemTime, u64)> {
        let metadata = tokio::fs::metadata(&self.path).await.ok()?;
        Some((metadata.modified().ok()?, metadata.len()))
    }
}

/// Record `entry` on the blocking thread pool.
pub async fn record_blocking(sink: Arc<dyn TradeLogSink>, entry: TradeLogEntry) -> Result<()> {
    tokio::task::spawn_blocking(move || sink.record(&entry))
        .await
        .map_err(|e| ForecastError::Io(std::io::Error::other(e)))?
}

impl TradeLogSink for CsvTradeLog {
    fn record(&self, entry: &TradeLogEntry) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| ForecastError::UpstreamData("trade log lock poisoned".to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let is_new = !self.path.exists();
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);

        if is_new {
            writer.write_record(HEADER)?;
        }
        writer.write_record([
            format_timestamp(entry.timestamp),
            entry.action.as_str().to_string(),
            format!("{:.2}", entry.price),
            entry.quantity.to_string(),
        ])?;
        writer.flush()?;

        debug!(
            "Logged {} {} @ {:.2} to {}",
            entry.action,
            entry.quantity,
            entry.price,
            self.path.display()
        );
        Ok(())
    }
}

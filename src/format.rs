//! Display formatting shared by the API, the trade log and the dashboard.

use chrono::{DateTime, Utc};

/// Timestamp layout used for display and the trade log.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `1234.5` -> `$1,234.50`.
pub fn format_price(price: f64) -> String {
    if !price.is_finite() {
        return "$-".to_string();
    }

    let fixed = format!("{:.2}", price.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if price < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}${}.{}", sign, grouped, cents)
}

/// Unix milliseconds to `YYYY-MM-DD HH:MM:SS` (UTC).
pub fn format_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| millis.to_string())
}

/// `+1.23%` / `-0.50%`.
pub fn format_change(pct: f64) -> String {
    format!("{:+.2}%", pct)
}

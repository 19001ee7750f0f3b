//! Dashboard view: price, signal, candlesticks and the forecast overlay.

use pricecast::format::{format_change, format_price, format_timestamp};
use pricecast::types::{DashboardSnapshot, EnrichedCandle, Forecast};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Line as CanvasLine},
        Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph, Wrap,
    },
    Frame,
};

use super::Theme;

/// Candles drawn in the candlestick panel.
const MAX_CANDLES: usize = 60;

/// Render the dashboard view.
pub fn render(frame: &mut Frame, area: Rect, snapshot: &DashboardSnapshot, theme: &Theme) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6),
            Constraint::Percentage(50),
            Constraint::Min(0),
        ])
        .split(area);

    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[0]);

    render_price(frame, top[0], snapshot, theme);
    render_status(frame, top[1], snapshot, theme);
    render_candles(frame, chunks[1], snapshot, theme);
    render_forecast_chart(frame, chunks[2], snapshot, theme);
}

fn render_price(frame: &mut Frame, area: Rect, snapshot: &DashboardSnapshot, theme: &Theme) {
    let price = snapshot
        .latest_price
        .map(format_price)
        .unwrap_or_else(|| "--".to_string());

    let last = snapshot.candles.last();
    let indicators = Line::from(vec![
        Span::styled("RSI ", theme.muted()),
        Span::raw(
            last.and_then(|c| c.rsi)
                .map(|v| format!("{:.1}", v))
                .unwrap_or_else(|| "--".to_string()),
        ),
        Span::styled("  EMA ", theme.muted()),
        Span::raw(
            last.and_then(|c| c.ema)
                .map(format_price)
                .unwrap_or_else(|| "--".to_string()),
        ),
    ]);

    let lines = vec![
        Line::from(vec![
            Span::styled(format!("{} ", snapshot.symbol), theme.title()),
            Span::styled(format!("({})", snapshot.interval), theme.muted()),
        ]),
        Line::from(Span::styled(price, theme.info())),
        indicators,
    ];

    let block = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Live Price")
            .border_style(theme.border()),
    );
    frame.render_widget(block, area);
}

fn render_status(frame: &mut Frame, area: Rect, snapshot: &DashboardSnapshot, theme: &Theme) {
    let mut lines = Vec::new();

    match &snapshot.signal {
        Some(signal) => {
            lines.push(Line::from(vec![
                Span::styled(format!("{} ", signal.action), theme.action(signal.action)),
                Span::raw(format!(
                    "forecast {} ({})",
                    format_price(signal.forecast_price),
                    format_change(signal.change_pct)
                )),
            ]));
        }
        None => lines.push(Line::from(Span::styled("No signal", theme.warning()))),
    }

    lines.push(Line::from(Span::styled(
        snapshot.status.clone(),
        if snapshot.has_prediction() {
            theme.muted()
        } else {
            theme.error()
        },
    )));

    let updated = if snapshot.updated_at > 0 {
        format_timestamp(snapshot.updated_at)
    } else {
        "never".to_string()
    };
    lines.push(Line::from(vec![
        Span::styled("Updated: ", theme.muted()),
        Span::raw(updated),
    ]));

    let block = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Trade Status")
                .border_style(theme.border()),
        );
    frame.render_widget(block, area);
}

/// `[low, high]` over the candles, padded so wicks do not touch the border.
pub(crate) fn price_bounds(candles: &[EnrichedCandle]) -> Option<[f64; 2]> {
    let low = candles
        .iter()
        .map(|c| c.candle.low)
        .fold(f64::INFINITY, f64::min);
    let high = candles
        .iter()
        .map(|c| c.candle.high)
        .fold(f64::NEG_INFINITY, f64::max);

    if !low.is_finite() || !high.is_finite() {
        return None;
    }

    let pad = ((high - low) * 0.05).max(high.abs() * 1e-4).max(1e-9);
    Some([low - pad, high + pad])
}

fn render_candles(frame: &mut Frame, area: Rect, snapshot: &DashboardSnapshot, theme: &Theme) {
    let start = snapshot.candles.len().saturating_sub(MAX_CANDLES);
    let candles = &snapshot.candles[start..];
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Candlesticks")
        .border_style(theme.border());

    let Some(y_bounds) = price_bounds(candles) else {
        frame.render_widget(
            Paragraph::new(Span::styled("Waiting for market data", theme.muted())).block(block),
            area,
        );
        return;
    };

    let canvas = Canvas::default()
        .block(block)
        .marker(Marker::Braille)
        .x_bounds([0.0, candles.len() as f64 + 1.0])
        .y_bounds(y_bounds)
        .paint(|ctx| {
            for (i, c) in candles.iter().enumerate() {
                let x = i as f64 + 1.0;
                let color = theme.candle(c.candle.is_bullish());
                ctx.draw(&CanvasLine::new(x, c.candle.low, x, c.candle.high, color));
                // Body drawn as a tight bundle of lines
                for dx in [-0.25, 0.0, 0.25] {
                    ctx.draw(&CanvasLine::new(
                        x + dx,
                        c.candle.open,
                        x + dx,
                        c.candle.close,
                        color,
                    ));
                }
            }
        });

    frame.render_widget(canvas, area);
}

/// `(seconds, close)` for every candle.
pub(crate) fn history_points(candles: &[EnrichedCandle]) -> Vec<(f64, f64)> {
    candles
        .iter()
        .map(|c| (c.candle.time as f64 / 1000.0, c.candle.close))
        .collect()
}

/// Forecast points, prefixed with the last actual close so both lines join.
pub(crate) fn forecast_points(candles: &[EnrichedCandle], forecast: &Forecast) -> Vec<(f64, f64)> {
    let mut points = Vec::with_capacity(forecast.len() + 1);
    if let Some(last) = candles.last() {
        points.push((last.candle.time as f64 / 1000.0, last.candle.close));
    }
    points.extend(
        forecast
            .points
            .iter()
            .map(|p| (p.time as f64 / 1000.0, p.price)),
    );
    points
}

fn bounds(points: &[(f64, f64)], pick: impl Fn(&(f64, f64)) -> f64) -> Option<[f64; 2]> {
    let min = points.iter().map(&pick).fold(f64::INFINITY, f64::min);
    let max = points.iter().map(&pick).fold(f64::NEG_INFINITY, f64::max);
    if !min.is_finite() || !max.is_finite() {
        return None;
    }
    if max > min {
        Some([min, max])
    } else {
        Some([min - 1.0, max + 1.0])
    }
}

fn time_label(seconds: f64) -> String {
    let ts = format_timestamp((seconds * 1000.0) as i64);
    ts.get(11..16).map(str::to_string).unwrap_or(ts)
}

fn render_forecast_chart(frame: &mut Frame, area: Rect, snapshot: &DashboardSnapshot, theme: &Theme) {
    let history = history_points(&snapshot.candles);
    let predicted = snapshot
        .forecast
        .as_ref()
        .map(|f| forecast_points(&snapshot.candles, f))
        .unwrap_or_default();

    let all: Vec<(f64, f64)> = history.iter().chain(predicted.iter()).copied().collect();
    let block = Block::default()
        .borders(Borders::ALL)
        .title("History + Forecast")
        .border_style(theme.border());

    let (Some(x_bounds), Some(y_bounds)) = (bounds(&all, |p| p.0), bounds(&all, |p| p.1)) else {
        frame.render_widget(
            Paragraph::new(Span::styled("No price history yet", theme.muted())).block(block),
            area,
        );
        return;
    };

    let mut datasets = vec![Dataset::default()
        .name("history")
        .marker(Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(theme.primary))
        .data(&history)];

    if !predicted.is_empty() {
        datasets.push(
            Dataset::default()
                .name("forecast")
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(theme.forecast))
                .data(&predicted),
        );
    }

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(theme.muted())
                .bounds(x_bounds)
                .labels(vec![
                    Span::raw(time_label(x_bounds[0])),
                    Span::raw(time_label(x_bounds[1])),
                ]),
        )
        .y_axis(
            Axis::default()
                .style(theme.muted())
                .bounds(y_bounds)
                .labels(vec![
                    Span::raw(format_price(y_bounds[0])),
                    Span::raw(format_price(y_bounds[1])),
                ]),
        );

    frame.render_widget(chart, area);
}

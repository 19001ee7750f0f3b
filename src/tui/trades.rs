//! Trades view: the most recent trade log entries.

use pricecast::format::{format_price, format_timestamp};
use pricecast::types::TradeLogEntry;
use ratatui::{
    layout::{Constraint, Rect},
    text::Span,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use super::Theme;

/// Render the trades view.
pub fn render(frame: &mut Frame, area: Rect, trades: &[TradeLogEntry], theme: &Theme) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Trade Log ({})", trades.len()))
        .border_style(theme.border());

    if trades.is_empty() {
        frame.render_widget(
            Paragraph::new(Span::styled("No trades logged yet", theme.muted())).block(block),
            area,
        );
        return;
    }

    let header = Row::new(vec!["Time", "Action", "Price", "Quantity"]).style(theme.header());

    let rows: Vec<Row> = trades
        .iter()
        .map(|t| {
            Row::new(vec![
                Cell::from(format_timestamp(t.timestamp)),
                Cell::from(Span::styled(t.action.as_str(), theme.action(t.action))),
                Cell::from(format_price(t.price)),
                Cell::from(t.quantity.to_string()),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(20),
        Constraint::Length(8),
        Constraint::Length(16),
        Constraint::Min(10),
    ];

    let table = Table::new(rows, widths).header(header).block(block);
    frame.render_widget(table, area);
}

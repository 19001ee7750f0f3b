//! Theme and color definitions for the TUI.

use pricecast::types::TradeAction;
use ratatui::style::{Color, Modifier, Style};

/// Theme for the TUI with consistent color scheme.
#[derive(Debug, Clone)]
pub struct Theme {
    pub primary: Color,
    pub secondary: Color,
    pub success: Color,
    pub warning: Color,
    pub danger: Color,
    pub info: Color,
    pub muted: Color,
    /// Forecast overlay line.
    pub forecast: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary: Color::Cyan,
            secondary: Color::Magenta,
            success: Color::Green,
            warning: Color::Yellow,
            danger: Color::Red,
            info: Color::Blue,
            muted: Color::DarkGray,
            forecast: Color::LightMagenta,
        }
    }
}

impl Theme {
    /// Get style for titles.
    pub fn title(&self) -> Style {
        Style::default()
            .fg(self.primary)
            .add_modifier(Modifier::BOLD)
    }

    /// Get style for headers.
    pub fn header(&self) -> Style {
        Style::default()
            .fg(self.secondary)
            .add_modifier(Modifier::BOLD)
    }

    /// Get style for success messages.
    pub fn success(&self) -> Style {
        Style::default().fg(self.success)
    }

    /// Get style for warnings.
    pub fn warning(&self) -> Style {
        Style::default().fg(self.warning)
    }

    /// Get style for errors.
    pub fn error(&self) -> Style {
        Style::default().fg(self.danger)
    }

    /// Get style for info messages.
    pub fn info(&self) -> Style {
        Style::default().fg(self.info)
    }

    /// Get style for muted text.
    pub fn muted(&self) -> Style {
        Style::default().fg(self.muted)
    }

    /// Get style for borders.
    pub fn border(&self) -> Style {
        Style::default().fg(self.primary)
    }

    /// Get style for tabs (active).
    pub fn tab_active(&self) -> Style {
        Style::default()
            .fg(Color::Black)
            .bg(self.primary)
            .add_modifier(Modifier::BOLD)
    }

    /// Get style for tabs (inactive).
    pub fn tab_inactive(&self) -> Style {
        Style::default().fg(self.muted)
    }

    /// Candle body/wick color.
    pub fn candle(&self, bullish: bool) -> Color {
        if bullish {
            self.success
        } else {
            self.danger
        }
    }

    /// Style for a trade action label.
    pub fn action(&self, action: TradeAction) -> Style {
        let color = match action {
            TradeAction::Buy => self.success,
            TradeAction::Sell => self.danger,
            TradeAction::Hold => self.warning,
        };
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }
}

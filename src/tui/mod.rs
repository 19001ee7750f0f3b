//! Terminal dashboard for the live forecast.

mod app;
mod dashboard;
mod events;
mod theme;
mod trades;

pub use app::{run_tui, App};
pub use theme::Theme;

/// Route/View enum for navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Dashboard,
    Trades,
}

impl Route {
    /// Get all available routes.
    pub fn all() -> Vec<Self> {
        vec![Self::Dashboard, Self::Trades]
    }

    /// Get the route name.
    pub fn name(&self) -> &str {
        match self {
            Self::Dashboard => "Dashboard",
            Self::Trades => "Trades",
        }
    }

    /// Get the route shortcut key.
    pub fn key(&self) -> char {
        match self {
            Self::Dashboard => '1',
            Self::Trades => '2',
        }
    }
}

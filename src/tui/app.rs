//! Main TUI application logic.

use super::{dashboard, events, trades, Route, Theme};
use crate::AppState;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use pricecast::types::{DashboardSnapshot, TradeLogEntry};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Tabs},
    Frame, Terminal,
};
use std::{io, time::Duration, time::SystemTime};
use tracing::warn;

/// Trade log entries shown in the trades view.
const TRADE_ROWS: usize = 100;

/// Main TUI application.
pub struct App {
    current_route: Route,
    app_state: AppState,
    theme: Theme,
    /// Copy of the monitor's latest snapshot, refreshed on every tick.
    snapshot: DashboardSnapshot,
    trades: Vec<TradeLogEntry>,
    /// Trade log file stamp the cached `trades` were read at.
    trades_stamp: Option<(SystemTime, u64)>,
    should_quit: bool,
}

impl App {
    pub async fn new(app_state: AppState) -> Self {
        let snapshot = app_state.monitor.snapshot().await;
        let mut app = Self {
            current_route: Route::Dashboard,
            app_state,
            theme: Theme::default(),
            snapshot,
            trades: Vec::new(),
            trades_stamp: None,
            should_quit: false,
        };
        app.refresh_trades().await;
        app
    }

    /// Pull the latest snapshot and trade log.
    pub async fn refresh(&mut self) {
        self.snapshot = self.app_state.monitor.snapshot().await;
        self.refresh_trades().await;
    }

    /// Reread the trade log only when the file changed since the last read.
    async fn refresh_trades(&mut self) {
        let stamp = self.app_state.trade_log.stamp().await;
        if stamp.is_some() && stamp == self.trades_stamp {
            return;
        }

        match self.app_state.trade_log.clone().read_recent(TRADE_ROWS).await {
            Ok(trades) => {
                self.trades = trades;
                self.trades_stamp = stamp;
            }
            Err(e) => warn!("Could not read trade log: {}", e),
        }
    }

    /// Handle a key press. Returns nothing; check [`App::should_quit`].
    pub fn handle_key(&mut self, key: &crossterm::event::KeyEvent) {
        if events::is_quit(key) {
            self.should_quit = true;
            return;
        }

        for route in Route::all() {
            if events::is_key(key, crossterm::event::KeyCode::Char(route.key())) {
                self.current_route = route;
                return;
            }
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn current_route(&self) -> Route {
        self.current_route
    }

    /// Render the TUI.
    pub fn render(&self, frame: &mut Frame) {
        let area = frame.size();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Tabs
                Constraint::Min(0),    // Content
                Constraint::Length(3), // Status bar
            ])
            .split(area);

        self.render_tabs(frame, chunks[0]);

        match self.current_route {
            Route::Dashboard => dashboard::render(frame, chunks[1], &self.snapshot, &self.theme),
            Route::Trades => trades::render(frame, chunks[1], &self.trades, &self.theme),
        }

        self.render_status_bar(frame, chunks[2]);
    }

    fn render_tabs(&self, frame: &mut Frame, area: Rect) {
        let routes = Route::all();
        let titles: Vec<Line> = routes
            .iter()
            .map(|r| {
                Line::from(vec![
                    Span::styled(format!("[{}] ", r.key()), self.theme.muted()),
                    Span::raw(r.name()),
                ])
            })
            .collect();

        let selected = routes
            .iter()
            .position(|r| *r == self.current_route)
            .unwrap_or(0);

        let tabs = Tabs::new(titles)
            .block(Block::default().borders(Borders::ALL).title("pricecast"))
            .select(selected)
            .style(self.theme.tab_inactive())
            .highlight_style(self.theme.tab_active());

        frame.render_widget(tabs, area);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let model = if self.snapshot.has_prediction() {
            Span::styled("model loaded", self.theme.success())
        } else {
            Span::styled("no prediction", self.theme.warning())
        };

        let text = Line::from(vec![
            model,
            Span::raw(" | refresh every "),
            Span::styled(
                format!("{}s", self.app_state.config.refresh_interval.as_secs()),
                self.theme.muted(),
            ),
            Span::raw(" | "),
            Span::styled("q", self.theme.muted()),
            Span::raw(" or "),
            Span::styled("Ctrl+C", self.theme.muted()),
            Span::raw(" to quit | "),
            Span::styled("1-2", self.theme.muted()),
            Span::raw(" to switch views"),
        ]);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.theme.border());
        frame.render_widget(block, area);

        let inner = Rect {
            x: area.x + 2,
            y: area.y + 1,
            width: area.width.saturating_sub(4),
            height: 1,
        };
        frame.render_widget(text, inner);
    }
}

/// Run the TUI application until the user quits.
pub async fn run_tui(app_state: AppState) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(app_state).await;
    let mut event_handler = events::EventHandler::new(Duration::from_millis(250));

    let result = loop {
        if let Err(e) = terminal.draw(|f| app.render(f)) {
            break Err(e);
        }

        match event_handler.next().await {
            Some(events::Event::Key(key)) => app.handle_key(&key),
            Some(events::Event::Tick) => app.refresh().await,
            Some(events::Event::Resize(_, _)) => {}
            None => break Ok(()),
        }

        if app.should_quit() {
            break Ok(());
        }
    };

    // Restore the terminal even when drawing failed
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

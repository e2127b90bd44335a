pub mod event;
pub mod theme;
pub mod views;
pub mod widgets;

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossterm::ExecutableCommand;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::enrichment::geo::GeoResolver;
use crate::error::IkamonError;
use crate::model::{DashboardView, DisplayMode};
use crate::output::Countries;
use crate::poller::Poller;
use crate::state::StatusNotice;

use self::event::{Event, EventHandler};
use self::theme::Theme;
use self::views::Pane;
use self::widgets::{TargetAction, TargetBar};

const MIN_COLS: u16 = 80;
const MIN_ROWS: u16 = 24;
const NOTICE_TTL: Duration = Duration::from_secs(5);
const PAGE: usize = 20;

/// Requests the event loop forwards to the poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    SetTarget(String),
}

/// TUI application state.
pub struct App {
    pub pane: Pane,
    pub mode: DisplayMode,
    pub target_bar: TargetBar,
    /// Selected row per pane, indexed by [`Pane::index`].
    pub scroll: [usize; 2],
    pub should_quit: bool,
    pub show_help: bool,
    pub no_color: bool,
    pub notice: Option<(StatusNotice, Instant)>,
    pub countries: Countries,
    last_sequence: Option<u64>,
}

impl App {
    pub fn new(mode: DisplayMode, no_color: bool) -> Self {
        let no_color = no_color || std::env::var("NO_COLOR").is_ok();
        Self {
            pane: Pane::default(),
            mode,
            target_bar: TargetBar::new(),
            scroll: [0; 2],
            should_quit: false,
            show_help: false,
            no_color,
            notice: None,
            countries: Countries::new(),
            last_sequence: None,
        }
    }

    /// Request the country of every row's representative once per published
    /// view, then rebuild `countries` from the codes already known for the
    /// rows on screen. The resolver's cache stays the only long-lived store.
    pub fn refresh_geo(&mut self, view: &DashboardView, geo: Option<&mut GeoResolver>) {
        let fresh = self.last_sequence != Some(view.sequence);
        self.last_sequence = Some(view.sequence);
        self.countries.clear();

        let Some(geo) = geo else {
            return;
        };
        let rows = || view.local.iter().chain(view.remote.iter());
        if fresh {
            for row in rows() {
                geo.lookup(&row.representative);
            }
        }
        for row in rows() {
            if let Some(code) = geo.peek(&row.representative) {
                self.countries.insert(row.representative.clone(), code.to_string());
            }
        }
    }

    pub fn show_notice(&mut self, notice: StatusNotice) {
        self.notice = Some((notice, Instant::now()));
    }

    /// Drop the notice once it has been on screen long enough.
    pub fn expire_notice(&mut self, now: Instant) {
        if let Some((_, shown)) = &self.notice {
            if now.duration_since(*shown) >= NOTICE_TTL {
                self.notice = None;
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, current_target: &str) -> Option<AppAction> {
        // Target bar captures keys when active.
        match self.target_bar.handle_key(key) {
            TargetAction::Ignored => {}
            TargetAction::Consumed | TargetAction::Cancel => return None,
            TargetAction::Submit(target) => {
                if target == current_target {
                    return None;
                }
                self.scroll = [0; 2];
                return Some(AppAction::SetTarget(target));
            }
        }

        let selected = &mut self.scroll[self.pane.index()];
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }

            KeyCode::Char('t') => self.mode = self.mode.toggle(),
            KeyCode::Char('e') => self.target_bar.activate(current_target),

            KeyCode::Tab | KeyCode::BackTab => self.pane = self.pane.next(),

            // Navigation
            KeyCode::Up => *selected = selected.saturating_sub(1),
            KeyCode::Down => *selected = selected.saturating_add(1),
            KeyCode::PageUp => *selected = selected.saturating_sub(PAGE),
            KeyCode::PageDown => *selected = selected.saturating_add(PAGE),
            KeyCode::Home => *selected = 0,
            KeyCode::End => *selected = usize::MAX,

            KeyCode::Char('?') => self.show_help = !self.show_help,
            KeyCode::Esc => self.show_help = false,

            _ => {}
        }
        None
    }

    /// Pull scroll positions back inside the current row counts so that
    /// `End` followed by `Up` moves off the last row.
    fn clamp_scroll(&mut self, view: &DashboardView) {
        for pane in [Pane::Local, Pane::Remote] {
            let len = view.rows(pane.scope()).len();
            let selected = &mut self.scroll[pane.index()];
            *selected = (*selected).min(len.saturating_sub(1));
        }
    }
}

/// Run the interactive TUI event loop until the user quits or `shutdown`
/// is raised.
pub fn run_tui(
    poller: &Poller,
    mut geo: Option<GeoResolver>,
    interval: Duration,
    mode: DisplayMode,
    no_color: bool,
    shutdown: &AtomicBool,
) -> Result<(), IkamonError> {
    let (cols, rows) = crossterm::terminal::size().map_err(|e| {
        IkamonError::Tui(io::Error::other(format!("cannot query terminal size: {e}")))
    })?;
    if cols < MIN_COLS || rows < MIN_ROWS {
        return Err(IkamonError::Tui(io::Error::other(format!(
            "terminal too small ({cols}x{rows}), minimum {MIN_COLS}x{MIN_ROWS}"
        ))));
    }

    enable_raw_mode().map_err(IkamonError::Tui)?;
    io::stdout()
        .execute(EnterAlternateScreen)
        .map_err(IkamonError::Tui)?;

    let backend = ratatui::backend::CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend).map_err(IkamonError::Tui)?;

    let mut app = App::new(mode, no_color);
    let tick = interval.min(Duration::from_millis(250));
    let result = EventHandler::new(tick, poller.notices().clone()).and_then(|events| {
        run_event_loop(&mut terminal, &mut app, &events, poller, &mut geo, shutdown)
    });

    // Restore terminal regardless of success/failure.
    let _ = disable_raw_mode();
    let _ = io::stdout().execute(LeaveAlternateScreen);

    result
}

fn run_event_loop(
    terminal: &mut Terminal<ratatui::backend::CrosstermBackend<io::Stdout>>,
    app: &mut App,
    events: &EventHandler,
    poller: &Poller,
    geo: &mut Option<GeoResolver>,
    shutdown: &AtomicBool,
) -> Result<(), IkamonError> {
    let shared = poller.view();
    loop {
        let view = shared.load_full();
        if let Some(geo) = geo.as_mut() {
            geo.collect_results();
        }
        app.refresh_geo(&view, geo.as_mut());
        app.clamp_scroll(&view);

        terminal
            .draw(|frame| render(frame, app, &view))
            .map_err(IkamonError::Tui)?;

        if app.should_quit {
            return Ok(());
        }

        match events.next() {
            Ok(Event::Key(key)) => {
                if let Some(AppAction::SetTarget(target)) = app.handle_key(key, &view.target) {
                    log::info!("switching target to {target}");
                    poller.set_target(&target);
                }
            }
            Ok(Event::Resize(_, _)) => {}
            Ok(Event::Notice(notice)) => app.show_notice(notice),
            Ok(Event::Tick) => {
                app.expire_notice(Instant::now());
                if shutdown.load(Ordering::Relaxed) {
                    app.should_quit = true;
                }
            }
            Err(_) => {
                app.should_quit = true;
            }
        }
    }
}

fn render(frame: &mut ratatui::Frame, app: &App, view: &DashboardView) {
    let size = frame.area();

    if size.width < MIN_COLS || size.height < MIN_ROWS {
        let msg = format!(
            "Terminal too small ({0}x{1}). Minimum: {MIN_COLS}x{MIN_ROWS}. Please resize.",
            size.width, size.height
        );
        let paragraph = Paragraph::new(msg)
            .style(Style::default().fg(Color::Red))
            .block(Block::default().borders(Borders::ALL).title("ikamon"));
        frame.render_widget(paragraph, size);
        return;
    }

    let theme = Theme::new(app.no_color);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Title
            Constraint::Length(3), // Cards
            Constraint::Length(3), // Target bar
            Constraint::Min(8),    // Peer tables
            Constraint::Length(1), // Notice / hints
        ])
        .split(size);

    render_title(frame, chunks[0], view, app.mode, &theme);
    views::overview::render(frame, chunks[1], view, app.mode, &theme);
    frame.render_widget(app.target_bar.widget(&view.target), chunks[2]);

    let tables = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[3]);
    for (pane, area) in [Pane::Local, Pane::Remote].into_iter().zip(tables.iter()) {
        let scope = pane.scope();
        views::peers::render(
            frame,
            *area,
            pane.title(),
            view.rows(scope),
            &app.countries,
            app.mode,
            app.scroll[pane.index()],
            pane == app.pane,
            &theme,
        );
    }

    render_status_line(frame, chunks[4], app, &theme);

    if app.show_help {
        render_help_overlay(frame, size);
    }
}

fn render_title(frame: &mut ratatui::Frame, area: Rect, view: &DashboardView, mode: DisplayMode, theme: &Theme) {
    let mut spans = vec![Span::styled(view.name.clone(), theme.header_style())];
    if !view.version.is_empty() {
        spans.push(Span::raw(format!(" {}", view.version)));
    }
    let mode_label = match mode {
        DisplayMode::Rate => "rate",
        DisplayMode::Total => "total",
    };
    spans.push(Span::styled(format!("  [{mode_label}]"), theme.dim_style()));
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_status_line(frame: &mut ratatui::Frame, area: Rect, app: &App, theme: &Theme) {
    let line = match &app.notice {
        Some((notice, _)) => Line::from(Span::styled(
            notice.message.clone(),
            theme.notice_style(notice.level),
        )),
        None => Line::from(Span::styled(
            "q quit  t rate/total  e edit target  Tab switch table  ? help",
            theme.dim_style(),
        )),
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn render_help_overlay(frame: &mut ratatui::Frame, area: Rect) {
    let help_width = 50u16.min(area.width.saturating_sub(4));
    let help_height = 16u16.min(area.height.saturating_sub(4));
    let x = (area.width.saturating_sub(help_width)) / 2;
    let y = (area.height.saturating_sub(help_height)) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    let help_text = vec![
        Line::from(Span::styled(
            "Keyboard Shortcuts",
            Style::default()
                .add_modifier(Modifier::BOLD)
                .fg(Color::Yellow),
        )),
        Line::from(""),
        Line::from("  q / Ctrl-C    Quit"),
        Line::from("  t             Toggle rate / total"),
        Line::from("  e             Edit target host:port"),
        Line::from("  Tab           Switch table"),
        Line::from("  Esc           Close target bar/help"),
        Line::from("  Up/Down       Navigate rows"),
        Line::from("  PgUp/PgDn     Page scroll"),
        Line::from("  Home/End      Jump to top/bottom"),
        Line::from("  ?             Toggle this help"),
        Line::from(""),
        Line::from(Span::styled(
            "Press ? or Esc to close",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let help = Paragraph::new(help_text).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Help ")
            .style(Style::default().bg(Color::Black)),
    );

    frame.render_widget(Clear, help_area);
    frame.render_widget(help, help_area);
}

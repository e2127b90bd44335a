use ratatui::style::{Color, Modifier, Style};

use crate::model::ConnectionStatus;
use crate::state::NoticeLevel;

/// Color theme for TUI rendering.
///
/// Respects the NO_COLOR convention: when `no_color` is true, all color
/// methods return `Color::Reset` / unstyled values.
pub struct Theme {
    pub no_color: bool,
}

impl Theme {
    pub fn new(no_color: bool) -> Self {
        Self { no_color }
    }

    /// Color for a per-interval byte count.
    ///
    /// - Green  when at most 1 kB moved
    /// - Yellow up to 100 kB
    /// - Red    above that
    pub fn rate_color(&self, bytes: u64) -> Color {
        if self.no_color {
            return Color::Reset;
        }
        if bytes <= 1024 {
            Color::Green
        } else if bytes <= 100 * 1024 {
            Color::Yellow
        } else {
            Color::Red
        }
    }

    /// Inactive is the only alarming state; the others use the default text
    /// color.
    pub fn status_color(&self, status: ConnectionStatus) -> Color {
        if self.no_color {
            return Color::Reset;
        }
        match status {
            ConnectionStatus::Active => Color::Green,
            ConnectionStatus::Connecting => Color::Yellow,
            ConnectionStatus::Inactive => Color::Red,
        }
    }

    pub fn notice_style(&self, level: NoticeLevel) -> Style {
        let style = Style::default().add_modifier(Modifier::BOLD);
        if self.no_color {
            return style;
        }
        match level {
            NoticeLevel::Success => style.fg(Color::Green),
            NoticeLevel::Error => style.fg(Color::Red),
        }
    }

    /// Style for table/column headers: bold, cyan foreground.
    pub fn header_style(&self) -> Style {
        if self.no_color {
            return Style::default().add_modifier(Modifier::BOLD);
        }
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    }

    /// Style for the currently selected / highlighted row.
    pub fn selected_style(&self) -> Style {
        if self.no_color {
            return Style::default().add_modifier(Modifier::REVERSED);
        }
        Style::default()
            .bg(Color::DarkGray)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    }

    /// Secondary text such as raw addresses under an alias.
    pub fn dim_style(&self) -> Style {
        if self.no_color {
            return Style::default();
        }
        Style::default().fg(Color::DarkGray)
    }
}

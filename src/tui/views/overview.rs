use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::model::{DashboardView, DisplayMode};
use crate::tui::theme::Theme;
use crate::tui::widgets::rate::{format_size, format_uptime, target_port};

/// Card contents as (title, value), left to right.
pub fn card_values(view: &DashboardView, mode: DisplayMode) -> [(&'static str, String); 5] {
    let (outbound, inbound) = match mode {
        DisplayMode::Rate => (view.outbound_delta, view.inbound_delta),
        DisplayMode::Total => (view.outbound_total, view.inbound_total),
    };
    [
        ("Status", view.status.to_string()),
        ("Operation Time", format_uptime(view.time)),
        ("Outbound", format!("↑ {}", format_size(outbound, mode))),
        ("Inbound", format!("↓ {}", format_size(inbound, mode))),
        ("Target", target_port(&view.target).to_string()),
    ]
}

/// Render the row of summary cards.
pub fn render(frame: &mut Frame, area: Rect, view: &DashboardView, mode: DisplayMode, theme: &Theme) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 5); 5])
        .split(area);

    for (i, (title, value)) in card_values(view, mode).into_iter().enumerate() {
        let mut style = Style::default().add_modifier(Modifier::BOLD);
        if i == 0 {
            style = style.fg(theme.status_color(view.status));
        } else if i == 2 || i == 3 {
            let bytes = if i == 2 { view.outbound_delta } else { view.inbound_delta };
            style = style.fg(theme.rate_color(bytes));
        }
        let card = Paragraph::new(Line::from(Span::styled(value, style)))
            .block(Block::default().borders(Borders::ALL).title(format!(" {title} ")));
        frame.render_widget(card, chunks[i]);
    }
}

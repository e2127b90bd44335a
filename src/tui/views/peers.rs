use ratatui::Frame;
use ratatui::layout::{Constraint, Rect};
use ratatui::text::Span;
use ratatui::widgets::{Block, Borders, Cell, Row, Table, TableState};

use crate::enrichment::peer_label;
use crate::model::DisplayMode;
use crate::model::peer::AggregatePeerRow;
use crate::output::Countries;
use crate::tui::theme::Theme;
use crate::tui::widgets::rate::format_size;

/// Display strings for one row: peer label, secondary address column,
/// outbound, inbound.
pub fn row_cells(row: &AggregatePeerRow, countries: &Countries, mode: DisplayMode) -> [String; 4] {
    let country = countries.get(&row.representative).map(String::as_str);
    let label = peer_label(row.alias.as_deref(), &row.representative, country);

    let address = match (&row.alias, row.members.len()) {
        (None, _) => String::new(),
        (Some(_), 1) => row.representative.clone(),
        (Some(_), n) => format!("{} (+{})", row.representative, n - 1),
    };

    let (outbound, inbound) = match mode {
        DisplayMode::Rate => (row.outbound_delta, row.inbound_delta),
        DisplayMode::Total => (row.outbound_total, row.inbound_total),
    };

    [label, address, format_size(outbound, mode), format_size(inbound, mode)]
}

/// Render one peer table.
///
/// Columns: Peer | Address | Outbound | Inbound
///
/// `selected` is clamped to the last row. The highlight is drawn only when
/// the table has focus.
#[allow(clippy::too_many_arguments)]
pub fn render(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    rows: &[AggregatePeerRow],
    countries: &Countries,
    mode: DisplayMode,
    selected: usize,
    focused: bool,
    theme: &Theme,
) {
    let header_style = theme.header_style();
    let header = Row::new(vec![
        Cell::from(Span::styled(title.to_string(), header_style)),
        Cell::from(Span::styled("Address", header_style)),
        Cell::from(Span::styled("Outbound", header_style)),
        Cell::from(Span::styled("Inbound", header_style)),
    ]);

    let table_rows: Vec<Row> = rows
        .iter()
        .map(|r| {
            let [label, address, outbound, inbound] = row_cells(r, countries, mode);
            Row::new(vec![
                Cell::from(label),
                Cell::from(Span::styled(address, theme.dim_style())),
                Cell::from(Span::styled(
                    outbound,
                    ratatui::style::Style::default().fg(theme.rate_color(r.outbound_delta)),
                )),
                Cell::from(Span::styled(
                    inbound,
                    ratatui::style::Style::default().fg(theme.rate_color(r.inbound_delta)),
                )),
            ])
        })
        .collect();

    let widths = [
        Constraint::Min(20),    // Peer
        Constraint::Min(16),    // Address
        Constraint::Length(12), // Outbound
        Constraint::Length(12), // Inbound
    ];

    let border_style = if focused {
        header_style
    } else {
        theme.dim_style()
    };

    let block_title = format!(" {title} ({}) ", rows.len());
    let table = Table::new(table_rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(block_title),
        )
        .row_highlight_style(theme.selected_style());

    let selection = (focused && !rows.is_empty()).then(|| selected.min(rows.len() - 1));
    let mut state = TableState::default().with_selected(selection);
    frame.render_stateful_widget(table, area, &mut state);
}

use std::io::Write;

use crate::enrichment::peer_label;
use crate::error::IkamonError;
use crate::model::DisplayMode;
use crate::output::{Report, ReportRow};
use crate::tui::widgets::rate::{format_size, format_uptime};

const WIDTH: usize = 78;

/// Write the report as a human-readable summary with one table per scope.
pub fn write_pretty(
    report: &Report<'_>,
    mode: DisplayMode,
    writer: &mut impl Write,
) -> Result<(), IkamonError> {
    write_pretty_inner(report, mode, writer).map_err(IkamonError::Serialization)
}

fn write_pretty_inner(report: &Report<'_>, mode: DisplayMode, w: &mut impl Write) -> std::io::Result<()> {
    if report.version.is_empty() {
        writeln!(w, "{} ({})", report.name, report.status)?;
    } else {
        writeln!(w, "{} {} ({})", report.name, report.version, report.status)?;
    }
    writeln!(w, "{}", "=".repeat(WIDTH))?;
    writeln!(
        w,
        "Target {}   Uptime {}",
        report.target,
        format_uptime(report.time)
    )?;
    let (outbound, inbound) = match mode {
        DisplayMode::Rate => (report.outbound_delta, report.inbound_delta),
        DisplayMode::Total => (report.outbound_total, report.inbound_total),
    };
    writeln!(
        w,
        "Outbound {}   Inbound {}",
        format_size(outbound, mode),
        format_size(inbound, mode)
    )?;

    write_table(w, "Source", &report.local, mode)?;
    write_table(w, "Destination", &report.remote, mode)?;
    Ok(())
}

fn write_table(w: &mut impl Write, title: &str, rows: &[ReportRow<'_>], mode: DisplayMode) -> std::io::Result<()> {
    writeln!(w)?;
    writeln!(w, "{:<44} {:>16} {:>16}", title.to_uppercase(), "OUTBOUND", "INBOUND")?;
    writeln!(w, "{}", "-".repeat(WIDTH))?;

    if rows.is_empty() {
        writeln!(w, "(no peers)")?;
        return Ok(());
    }

    for row in rows {
        let alias = (row.peer != row.address).then_some(row.peer);
        let mut label = peer_label(alias, row.address, row.country);
        if row.members > 1 {
            label = format!("{label} (+{})", row.members - 1);
        }
        let (outbound, inbound) = match mode {
            DisplayMode::Rate => (row.outbound_delta, row.inbound_delta),
            DisplayMode::Total => (row.outbound_total, row.inbound_total),
        };
        writeln!(
            w,
            "{:<44} {:>16} {:>16}",
            truncate(&label, 44),
            format_size(outbound, mode),
            format_size(inbound, mode),
        )?;
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max - 3).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DashboardView;
    use crate::output::{Countries, fixtures};

    fn render(view: &DashboardView, mode: DisplayMode) -> String {
        let mut countries = Countries::new();
        countries.insert("8.8.8.8".to_string(), "US".to_string());
        let report = Report::new(view, &countries);
        let mut buf = Vec::new();
        write_pretty(&report, mode, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn pretty_contains_header() {
        let output = render(&fixtures::active_view(), DisplayMode::Rate);
        assert!(output.starts_with("IkaGo-server v1.5.0 (Active)"));
        assert!(output.contains("Target localhost:18080   Uptime 1:02:05"));
        assert!(output.contains("SOURCE"));
        assert!(output.contains("DESTINATION"));
    }

    #[test]
    fn pretty_rate_mode() {
        let output = render(&fixtures::active_view(), DisplayMode::Rate);
        assert!(output.contains("Outbound 2.5 kB/s   Inbound 532.0 B/s"));
        assert!(output.contains("nas.lan (+1)"));
        assert!(output.contains("[US] dns.google"));
    }

    #[test]
    fn pretty_total_mode() {
        let output = render(&fixtures::active_view(), DisplayMode::Total);
        assert!(output.contains("Outbound 250.9 kB   Inbound 51.9 kB"));
        assert!(!output.contains("/s"));
    }

    #[test]
    fn pretty_empty_view() {
        let output = render(&DashboardView::empty("host:1"), DisplayMode::Rate);
        assert!(output.starts_with("IkaGo (Connecting)"));
        assert_eq!(output.matches("(no peers)").count(), 2);
    }

    #[test]
    fn pretty_no_ansi_codes() {
        let output = render(&fixtures::active_view(), DisplayMode::Rate);
        assert!(!output.contains('\x1b'));
    }

    #[test]
    fn pretty_truncate() {
        assert_eq!(truncate("short", 24), "short");
        assert_eq!(
            truncate("this is a very long peer name that should be truncated", 24),
            "this is a very long p..."
        );
    }
}

pub mod json;
pub mod pretty;
pub mod tsv;

use std::collections::HashMap;
use std::io::Write;

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::IkamonError;
use crate::model::peer::AggregatePeerRow;
use crate::model::{ConnectionStatus, DashboardView, DisplayMode, Scope};

/// Country codes keyed by raw address (a row's representative).
pub type Countries = HashMap<String, String>;

/// One row of a report, flattened for output.
#[derive(Debug, Serialize)]
pub struct ReportRow<'a> {
    pub scope: Scope,
    /// Alias, or the raw address when unresolved.
    pub peer: &'a str,
    pub address: &'a str,
    pub country: Option<&'a str>,
    pub members: usize,
    pub outbound_delta: u64,
    pub outbound_total: u64,
    pub inbound_delta: u64,
    pub inbound_total: u64,
    pub last_seen: f64,
}

/// Everything a report prints, borrowed from the view.
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub target: &'a str,
    pub status: ConnectionStatus,
    pub time: f64,
    pub outbound_delta: u64,
    pub outbound_total: u64,
    pub inbound_delta: u64,
    pub inbound_total: u64,
    pub local: Vec<ReportRow<'a>>,
    pub remote: Vec<ReportRow<'a>>,
}

impl<'a> Report<'a> {
    pub fn new(view: &'a DashboardView, countries: &'a Countries) -> Self {
        let rows = |scope: Scope| -> Vec<ReportRow<'a>> {
            view.rows(scope)
                .iter()
                .map(|row| report_row(scope, row, countries))
                .collect()
        };
        Self {
            name: &view.name,
            version: &view.version,
            target: &view.target,
            status: view.status,
            time: view.time,
            outbound_delta: view.outbound_delta,
            outbound_total: view.outbound_total,
            inbound_delta: view.inbound_delta,
            inbound_total: view.inbound_total,
            local: rows(Scope::Local),
            remote: rows(Scope::Remote),
        }
    }
}

fn report_row<'a>(scope: Scope, row: &'a AggregatePeerRow, countries: &'a Countries) -> ReportRow<'a> {
    ReportRow {
        scope,
        peer: &row.display_key,
        address: &row.representative,
        country: countries.get(&row.representative).map(String::as_str),
        members: row.members.len(),
        outbound_delta: row.outbound_delta,
        outbound_total: row.outbound_total,
        inbound_delta: row.inbound_delta,
        inbound_total: row.inbound_total,
        last_seen: row.last_seen,
    }
}

/// Write a one-shot report of `view` in the specified format.
///
/// `mode` only affects the pretty format; TSV and JSON carry both deltas and
/// totals as raw byte counts.
pub fn write_report(
    view: &DashboardView,
    countries: &Countries,
    mode: DisplayMode,
    format: OutputFormat,
    writer: &mut impl Write,
) -> Result<(), IkamonError> {
    let report = Report::new(view, countries);
    match format {
        OutputFormat::Tsv => tsv::write_tsv(&report, writer),
        OutputFormat::Json => json::write_json(&report, writer),
        OutputFormat::Pretty => pretty::write_pretty(&report, mode, writer),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_rows_follow_view_order() {
        let view = fixtures::active_view();
        let countries = Countries::new();
        let report = Report::new(&view, &countries);
        let peers: Vec<&str> = report.local.iter().map(|r| r.peer).collect();
        assert_eq!(peers, vec!["nas.lan", "192.168.1.7"]);
        assert_eq!(report.local[0].members, 2);
        assert_eq!(report.remote[0].scope, Scope::Remote);
    }

    #[test]
    fn report_country_by_representative() {
        let view = fixtures::active_view();
        let mut countries = Countries::new();
        countries.insert("8.8.8.8".to_string(), "US".to_string());
        let report = Report::new(&view, &countries);
        assert_eq!(report.remote[0].country, Some("US"));
        assert_eq!(report.local[0].country, None);
    }
}

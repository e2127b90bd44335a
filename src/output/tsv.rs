use std::io::Write;

use crate::error::IkamonError;
use crate::output::{Report, ReportRow};

const HEADER: &str = "scope\tpeer\taddress\tcountry\tmembers\tout_delta\tout_total\tin_delta\tin_total";

/// Write the report's rows as TSV.
///
/// Output: header row, then local rows followed by remote rows, each in view
/// order (most recently seen first). Byte counts are raw integers.
pub fn write_tsv(report: &Report<'_>, writer: &mut impl Write) -> Result<(), IkamonError> {
    writeln!(writer, "{HEADER}").map_err(IkamonError::Serialization)?;

    for row in report.local.iter().chain(&report.remote) {
        write_row(row, writer).map_err(IkamonError::Serialization)?;
    }

    Ok(())
}

fn write_row(row: &ReportRow<'_>, writer: &mut impl Write) -> std::io::Result<()> {
    writeln!(
        writer,
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        row.scope,
        escape_tsv(row.peer),
        escape_tsv(row.address),
        row.country.unwrap_or("-"),
        row.members,
        row.outbound_delta,
        row.outbound_total,
        row.inbound_delta,
        row.inbound_total,
    )
}

/// Escape tabs and newlines in a string for TSV output.
fn escape_tsv(s: &str) -> String {
    s.replace(['\t', '\n', '\r'], " ")
}

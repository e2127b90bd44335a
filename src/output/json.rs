use std::io::Write;

use crate::error::IkamonError;
use crate::output::Report;

/// Write the report as pretty-printed JSON.
pub fn write_json(report: &Report<'_>, writer: &mut impl Write) -> Result<(), IkamonError> {
    serde_json::to_writer_pretty(&mut *writer, report)
        .map_err(|e| IkamonError::Serialization(std::io::Error::other(e.to_string())))?;
    writeln!(writer).map_err(IkamonError::Serialization)
}

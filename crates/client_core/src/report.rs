//! CSV export of a stats report.

use std::{
    fs::File,
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use shared::domain::{StatsFilter, StatsReport};
use thiserror::Error;
use tracing::info;

/// Lets spreadsheet applications detect UTF-8.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const HEADERS: [&str; 5] = ["Barcode", "Company", "Scan count", "First scan", "Last scan"];
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("report has no rows to export")]
    Empty,
    #[error("failed to write report: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode report: {0}")]
    Csv(#[from] csv::Error),
}

pub fn default_file_name(filter: &StatsFilter) -> String {
    let bound = |date: Option<chrono::NaiveDate>| {
        date.map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "all".to_string())
    };
    format!(
        "report_{}_to_{}.csv",
        bound(filter.start_date),
        bound(filter.end_date)
    )
}

/// Keeps only rows whose barcode contains `query`, ignoring case. The summary totals
/// still describe the whole range. A blank query keeps every row.
pub fn filter_by_barcode(report: &mut StatsReport, query: &str) {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return;
    }
    report
        .rows
        .retain(|row| row.barcode.to_lowercase().contains(&needle));
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn write_report<W: Write>(mut out: W, report: &StatsReport) -> Result<(), ExportError> {
    if report.rows.is_empty() {
        return Err(ExportError::Empty);
    }

    out.write_all(UTF8_BOM)?;
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::CRLF)
        .from_writer(out);

    writer.write_record(HEADERS)?;
    for row in &report.rows {
        writer.write_record([
            row.barcode.clone(),
            row.company_name.clone(),
            row.count.to_string(),
            format_timestamp(&row.first_scan_time),
            format_timestamp(&row.last_scan_time),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the report to `target`. A directory target gets the default file name for the
/// filter's date range.
pub fn export_report(
    target: &Path,
    report: &StatsReport,
    filter: &StatsFilter,
) -> Result<PathBuf, ExportError> {
    let path = if target.is_dir() {
        target.join(default_file_name(filter))
    } else {
        target.to_path_buf()
    };

    if report.rows.is_empty() {
        return Err(ExportError::Empty);
    }
    let file = File::create(&path)?;
    write_report(file, report)?;
    info!(path = %path.display(), rows = report.rows.len(), "stats report exported");
    Ok(path)
}

#[cfg(test)]
#[path = "tests/report_tests.rs"]
mod tests;

//! Plain-text views for the terminal.

use std::fmt::Write;

use scan_session::{ScanEntry, ScanOutcome, SummaryRecord};
use shared::domain::{Company, CompanyId, StatsReport};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn companies(companies: &[Company], selected: Option<CompanyId>) -> String {
    if companies.is_empty() {
        return "no companies\n".to_string();
    }
    let mut out = String::new();
    for company in companies {
        let marker = if Some(company.id) == selected { '*' } else { ' ' };
        let status = if company.active { "active" } else { "inactive" };
        let _ = writeln!(
            out,
            "{marker} {:>4}  {:<30} {status}",
            company.id.0, company.name
        );
    }
    out
}

pub fn scan_outcome(outcome: &ScanOutcome) -> String {
    if outcome.repeated {
        format!("{}  x{} (repeat)\n", outcome.barcode, outcome.count)
    } else {
        format!("{}  x1\n", outcome.barcode)
    }
}

pub fn ledger(entries: &[ScanEntry], total_units: u64) -> String {
    if entries.is_empty() {
        return "nothing scanned yet\n".to_string();
    }
    let mut out = String::new();
    write_entries(&mut out, entries);
    let _ = writeln!(
        out,
        "{} unique barcodes, {} units",
        entries.len(),
        total_units
    );
    out
}

pub fn summary(summary: &SummaryRecord, company: Option<&Company>) -> String {
    let mut out = String::new();
    match company {
        Some(company) => {
            let _ = writeln!(
                out,
                "committed {} units for {}",
                summary.total_units, company.name
            );
        }
        None => {
            let _ = writeln!(out, "committed {} units", summary.total_units);
        }
    }
    let _ = writeln!(out, "unique barcodes: {}", summary.total_unique_barcodes);
    for (count, barcodes) in &summary.count_breakdown {
        let _ = writeln!(out, "  scanned {count} times: {barcodes} barcodes");
    }
    write_entries(&mut out, &summary.entries);
    out
}

fn write_entries(out: &mut String, entries: &[ScanEntry]) {
    for entry in entries {
        let _ = writeln!(
            out,
            "{:<24} {:>4}  {:<20} {}",
            entry.barcode,
            entry.count,
            entry.company_name,
            entry.last_scan_time.format(TIME_FORMAT)
        );
    }
}

pub fn stats(report: &StatsReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "total scans: {}  unique shipments: {}  duplicates: {}",
        report.summary.total_scans,
        report.summary.unique_shipments,
        report.summary.duplicate_count
    );
    if report.rows.is_empty() {
        out.push_str("no shipments in range\n");
        return out;
    }
    for row in &report.rows {
        let _ = writeln!(
            out,
            "{:<24} {:<20} {:>4}  {}  {}",
            row.barcode,
            row.company_name,
            row.count,
            row.first_scan_time.format(TIME_FORMAT),
            row.last_scan_time.format(TIME_FORMAT)
        );
    }
    out
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::domain::{Company, CompanyId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanEntry {
    pub barcode: String,
    pub company_id: CompanyId,
    pub company_name: String,
    pub count: u32,
    pub last_scan_time: DateTime<Utc>,
}

/// In-session scan entries, unique by barcode, most recently touched first.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    entries: Vec<ScanEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ScanEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, barcode: &str) -> Option<&ScanEntry> {
        self.entries.iter().find(|entry| entry.barcode == barcode)
    }

    pub fn total_units(&self) -> u64 {
        self.entries.iter().map(|entry| u64::from(entry.count)).sum()
    }

    /// Counts a scan of `barcode`. A repeat bumps the existing entry and moves it to the
    /// front; a new barcode is attributed to `company`. Returns the updated entry.
    pub fn record(&mut self, barcode: &str, company: &Company, at: DateTime<Utc>) -> &ScanEntry {
        let entry = match self.position(barcode) {
            Some(index) => {
                let mut entry = self.entries.remove(index);
                entry.count = entry.count.saturating_add(1);
                entry.last_scan_time = at;
                entry
            }
            None => ScanEntry {
                barcode: barcode.to_string(),
                company_id: company.id,
                company_name: company.name.clone(),
                count: 1,
                last_scan_time: at,
            },
        };
        self.entries.insert(0, entry);
        &self.entries[0]
    }

    pub fn increment(&mut self, barcode: &str) -> Option<u32> {
        let entry = self.entry_mut(barcode)?;
        entry.count = entry.count.saturating_add(1);
        Some(entry.count)
    }

    /// Count never drops below 1; deleting is a separate operation.
    pub fn decrement(&mut self, barcode: &str) -> Option<u32> {
        let entry = self.entry_mut(barcode)?;
        entry.count = entry.count.saturating_sub(1).max(1);
        Some(entry.count)
    }

    pub fn remove(&mut self, barcode: &str) -> Option<ScanEntry> {
        let index = self.position(barcode)?;
        Some(self.entries.remove(index))
    }

    /// One `(barcode, company)` pair per scanned unit.
    pub fn unit_requests(&self) -> Vec<(String, CompanyId)> {
        self.entries
            .iter()
            .flat_map(|entry| {
                (0..entry.count).map(move |_| (entry.barcode.clone(), entry.company_id))
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn position(&self, barcode: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.barcode == barcode)
    }

    fn entry_mut(&mut self, barcode: &str) -> Option<&mut ScanEntry> {
        self.entries.iter_mut().find(|entry| entry.barcode == barcode)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRecord {
    pub total_unique_barcodes: usize,
    pub total_units: u64,
    /// count -> number of barcodes scanned exactly that many times, counts above 1 only.
    pub count_breakdown: BTreeMap<u32, usize>,
    pub entries: Vec<ScanEntry>,
}

impl SummaryRecord {
    pub fn from_entries(entries: &[ScanEntry]) -> Self {
        let mut count_breakdown = BTreeMap::new();
        for entry in entries.iter().filter(|entry| entry.count > 1) {
            *count_breakdown.entry(entry.count).or_insert(0) += 1;
        }
        Self {
            total_unique_barcodes: entries.len(),
            total_units: entries.iter().map(|entry| u64::from(entry.count)).sum(),
            count_breakdown,
            entries: entries.to_vec(),
        }
    }
}

#[cfg(test)]
#[path = "tests/ledger_tests.rs"]
mod tests;

use std::fmt;

use chrono::{DateTime, Utc};
use client_core::{ClientError, ShipmentApi};
use futures::future::join_all;
use shared::domain::{Company, CompanyId};
use tracing::{debug, info, warn};

use crate::{
    error::{SessionError, ValidationError},
    feedback::{FeedbackSink, Tone},
    ledger::{Ledger, ScanEntry, SummaryRecord},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Ready,
    Scanning,
    Review,
    Committing,
    Summary,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ready => "ready",
            Self::Scanning => "scanning",
            Self::Review => "review",
            Self::Committing => "committing",
            Self::Summary => "summary",
        };
        f.write_str(name)
    }
}

/// Operator requests, used to report rejected transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SelectCompany,
    StartSession,
    Scan,
    FinishScanning,
    ContinueScanning,
    AdjustQuantity,
    Commit,
    StartNewSession,
    Abandon,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SelectCompany => "select a company",
            Self::StartSession => "start a session",
            Self::Scan => "scan",
            Self::FinishScanning => "finish scanning",
            Self::ContinueScanning => "continue scanning",
            Self::AdjustQuantity => "adjust quantities",
            Self::Commit => "commit",
            Self::StartNewSession => "start a new session",
            Self::Abandon => "abandon the session",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub barcode: String,
    pub count: u32,
    pub repeated: bool,
}

/// Lives from `Ready -> Scanning` until the session is committed or abandoned.
#[derive(Debug)]
struct Session {
    company: Company,
    ledger: Ledger,
}

/// Puts an interrupted commit back into review when its future is dropped mid-flight.
struct CommitGuard<'a> {
    state: &'a mut SessionState,
    settled: bool,
}

impl CommitGuard<'_> {
    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for CommitGuard<'_> {
    fn drop(&mut self) {
        if !self.settled && *self.state == SessionState::Committing {
            warn!("commit interrupted before all calls settled; back to review");
            *self.state = SessionState::Review;
        }
    }
}

pub struct ScanSessionController<F: FeedbackSink> {
    state: SessionState,
    selected: Option<Company>,
    session: Option<Session>,
    summary: Option<SummaryRecord>,
    input: String,
    feedback: F,
}

impl<F: FeedbackSink> ScanSessionController<F> {
    pub fn new(feedback: F) -> Self {
        Self {
            state: SessionState::Ready,
            selected: None,
            session: None,
            summary: None,
            input: String::new(),
            feedback,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn selected_company(&self) -> Option<&Company> {
        self.selected.as_ref()
    }

    /// The company new scans are attributed to, while a session is open.
    pub fn session_company_id(&self) -> Option<CompanyId> {
        self.session.as_ref().map(|session| session.company.id)
    }

    pub fn entries(&self) -> &[ScanEntry] {
        self.session
            .as_ref()
            .map(|session| session.ledger.entries())
            .unwrap_or_default()
    }

    pub fn total_units(&self) -> u64 {
        self.session
            .as_ref()
            .map(|session| session.ledger.total_units())
            .unwrap_or(0)
    }

    pub fn summary(&self) -> Option<&SummaryRecord> {
        self.summary.as_ref()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, value: &str) {
        self.input.clear();
        self.input.push_str(value);
    }

    pub fn select_company(&mut self, company: Company) -> Result<(), SessionError> {
        self.require(SessionState::Ready, Action::SelectCompany)?;
        debug!(company_id = %company.id, company = %company.name, "company selected");
        self.selected = Some(company);
        Ok(())
    }

    pub fn start_session(&mut self) -> Result<(), SessionError> {
        self.require(SessionState::Ready, Action::StartSession)?;
        let Some(company) = self.selected.clone() else {
            return Err(self.reject(ValidationError::NoCompanySelected));
        };

        info!(company_id = %company.id, company = %company.name, "scan session started");
        self.session = Some(Session {
            company,
            ledger: Ledger::new(),
        });
        self.input.clear();
        self.state = SessionState::Scanning;
        Ok(())
    }

    pub fn scan(&mut self, barcode: &str) -> Result<ScanOutcome, SessionError> {
        self.scan_at(barcode, Utc::now())
    }

    pub fn scan_at(
        &mut self,
        barcode: &str,
        at: DateTime<Utc>,
    ) -> Result<ScanOutcome, SessionError> {
        let barcode = barcode.trim();
        if barcode.is_empty() {
            return Err(self.reject(ValidationError::EmptyBarcode));
        }
        self.require(SessionState::Scanning, Action::Scan)?;

        let Some(session) = self.session.as_mut() else {
            return Err(self.reject(ValidationError::NoCompanySelected));
        };
        let entry = session.ledger.record(barcode, &session.company, at);
        let outcome = ScanOutcome {
            barcode: entry.barcode.clone(),
            count: entry.count,
            repeated: entry.count > 1,
        };

        self.input.clear();
        self.feedback.signal(Tone::Success);
        debug!(
            barcode = %outcome.barcode,
            count = outcome.count,
            repeated = outcome.repeated,
            "scan recorded"
        );
        Ok(outcome)
    }

    pub fn finish_scanning(&mut self) -> Result<(), SessionError> {
        self.require(SessionState::Scanning, Action::FinishScanning)?;
        self.require_entries()?;
        self.state = SessionState::Review;
        debug!(entries = self.entries().len(), "session under review");
        Ok(())
    }

    pub fn continue_scanning(&mut self) -> Result<(), SessionError> {
        self.require(SessionState::Review, Action::ContinueScanning)?;
        self.state = SessionState::Scanning;
        Ok(())
    }

    pub fn increment(&mut self, barcode: &str) -> Result<u32, SessionError> {
        self.adjust(barcode, Ledger::increment)
    }

    /// Decrementing a count of 1 leaves it at 1.
    pub fn decrement(&mut self, barcode: &str) -> Result<u32, SessionError> {
        self.adjust(barcode, Ledger::decrement)
    }

    pub fn remove(&mut self, barcode: &str) -> Result<ScanEntry, SessionError> {
        self.require_adjustable()?;
        let removed = self
            .session
            .as_mut()
            .and_then(|session| session.ledger.remove(barcode));
        match removed {
            Some(entry) => {
                debug!(barcode = %entry.barcode, count = entry.count, "entry removed");
                Ok(entry)
            }
            None => Err(self.reject(ValidationError::UnknownBarcode(barcode.to_string()))),
        }
    }

    /// Replays the ledger as one create-shipment call per scanned unit, all in flight at
    /// once, and waits for every call to settle. Any failure sends the session back to
    /// review with the ledger untouched; shipments that did succeed are not rolled back.
    /// Dropping the returned future before it completes also leaves the session in review.
    pub async fn commit<A>(&mut self, api: &A) -> Result<&SummaryRecord, SessionError>
    where
        A: ShipmentApi + ?Sized,
    {
        self.require(SessionState::Review, Action::Commit)?;
        self.require_entries()?;

        let requests = self
            .session
            .as_ref()
            .map(|session| session.ledger.unit_requests())
            .unwrap_or_default();
        let attempted = requests.len();
        self.state = SessionState::Committing;
        info!(
            entries = self.entries().len(),
            units = attempted,
            "committing scan session"
        );

        let guard = CommitGuard {
            state: &mut self.state,
            settled: false,
        };
        let results = join_all(
            requests
                .iter()
                .map(|(barcode, company_id)| api.create_shipment(barcode, *company_id)),
        )
        .await;
        guard.settle();

        let mut failures = results.into_iter().filter_map(Result::err);
        if let Some(first) = failures.next() {
            let failed = 1 + failures.count();
            return Err(self.fail_commit(first, failed, attempted));
        }

        let Some(mut session) = self.session.take() else {
            self.state = SessionState::Review;
            return Err(self.reject(ValidationError::EmptyLedger));
        };
        let summary = SummaryRecord::from_entries(session.ledger.entries());
        session.ledger.clear();
        info!(
            unique = summary.total_unique_barcodes,
            units = summary.total_units,
            "scan session committed"
        );
        self.state = SessionState::Summary;
        let summary = self.summary.insert(summary);
        Ok(&*summary)
    }

    pub fn start_new_session(&mut self) -> Result<(), SessionError> {
        self.require(SessionState::Summary, Action::StartNewSession)?;
        self.summary = None;
        self.session = None;
        self.selected = None;
        self.input.clear();
        self.state = SessionState::Ready;
        Ok(())
    }

    /// Drops an uncommitted session. Nothing is sent to the service.
    pub fn abandon(&mut self) -> Result<(), SessionError> {
        if !matches!(self.state, SessionState::Scanning | SessionState::Review) {
            return Err(self.reject(ValidationError::InvalidTransition {
                state: self.state,
                action: Action::Abandon,
            }));
        }
        if let Some(session) = self.session.take() {
            warn!(
                entries = session.ledger.len(),
                units = session.ledger.total_units(),
                "scan session abandoned"
            );
        }
        self.input.clear();
        self.state = SessionState::Ready;
        Ok(())
    }

    fn adjust(
        &mut self,
        barcode: &str,
        apply: fn(&mut Ledger, &str) -> Option<u32>,
    ) -> Result<u32, SessionError> {
        self.require_adjustable()?;
        let updated = self
            .session
            .as_mut()
            .and_then(|session| apply(&mut session.ledger, barcode));
        match updated {
            Some(count) => {
                debug!(barcode, count, "quantity adjusted");
                Ok(count)
            }
            None => Err(self.reject(ValidationError::UnknownBarcode(barcode.to_string()))),
        }
    }

    fn fail_commit(&mut self, source: ClientError, failed: usize, attempted: usize) -> SessionError {
        warn!(failed, attempted, error = %source, "commit failed; ledger kept for retry");
        self.state = SessionState::Review;
        self.feedback.signal(Tone::Failure);
        SessionError::Commit {
            failed,
            attempted,
            source,
        }
    }

    fn require(&self, expected: SessionState, action: Action) -> Result<(), SessionError> {
        if self.state == expected {
            return Ok(());
        }
        Err(self.reject(ValidationError::InvalidTransition {
            state: self.state,
            action,
        }))
    }

    fn require_adjustable(&self) -> Result<(), SessionError> {
        if matches!(self.state, SessionState::Scanning | SessionState::Review) {
            return Ok(());
        }
        Err(self.reject(ValidationError::InvalidTransition {
            state: self.state,
            action: Action::AdjustQuantity,
        }))
    }

    fn require_entries(&self) -> Result<(), SessionError> {
        if self.entries().is_empty() {
            return Err(self.reject(ValidationError::EmptyLedger));
        }
        Ok(())
    }

    fn reject(&self, error: ValidationError) -> SessionError {
        debug!(state = %self.state, %error, "request rejected");
        self.feedback.signal(Tone::Failure);
        SessionError::Validation(error)
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;

use super::*;
use async_trait::async_trait;
use shared::{
    domain::{ShipmentId, ShipmentRecord, StatsFilter, StatsReport},
    error::{ApiError, ErrorCode},
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

#[derive(Default)]
struct RecordingFeedback {
    tones: Mutex<Vec<Tone>>,
}

impl RecordingFeedback {
    fn tones(&self) -> Vec<Tone> {
        self.tones.lock().expect("tones").clone()
    }
}

impl FeedbackSink for RecordingFeedback {
    fn signal(&self, tone: Tone) {
        self.tones.lock().expect("tones").push(tone);
    }
}

/// Records create-shipment calls; optionally fails the call with the given 1-based index.
#[derive(Default)]
struct RecordingApi {
    calls: Mutex<Vec<(String, CompanyId)>>,
    attempts: AtomicUsize,
    fail_on_call: Option<usize>,
    stall: bool,
}

impl RecordingApi {
    fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::default()
        }
    }

    /// Every create-shipment call stays pending forever.
    fn stalling() -> Self {
        Self {
            stall: true,
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<(String, CompanyId)> {
        self.calls.lock().expect("calls").clone()
    }
}

#[async_trait]
impl ShipmentApi for RecordingApi {
    async fn list_companies(&self, _active_only: bool) -> Result<Vec<Company>, ClientError> {
        Ok(vec![aramex()])
    }

    async fn create_shipment(
        &self,
        barcode: &str,
        company_id: CompanyId,
    ) -> Result<ShipmentRecord, ClientError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.stall {
            std::future::pending::<()>().await;
        }
        if self.fail_on_call == Some(attempt) {
            return Err(ApiError::new(ErrorCode::Internal, "database unavailable").into());
        }
        self.calls
            .lock()
            .expect("calls")
            .push((barcode.to_string(), company_id));
        Ok(ShipmentRecord {
            id: Some(ShipmentId(attempt as i64)),
            barcode: barcode.to_string(),
            company_id,
            company_name: None,
            scan_date: Utc::now().date_naive(),
            is_duplicate: None,
        })
    }

    async fn create_company(&self, _name: &str) -> Result<Company, ClientError> {
        Err(ClientError::Validation("unused"))
    }

    async fn set_company_active(
        &self,
        _company_id: CompanyId,
        _active: bool,
    ) -> Result<Company, ClientError> {
        Err(ClientError::Validation("unused"))
    }

    async fn query_stats(&self, _filter: &StatsFilter) -> Result<StatsReport, ClientError> {
        Err(ClientError::Validation("unused"))
    }
}

fn aramex() -> Company {
    Company {
        id: CompanyId(1),
        name: "Aramex".to_string(),
        active: true,
    }
}

fn smsa() -> Company {
    Company {
        id: CompanyId(2),
        name: "SMSA".to_string(),
        active: true,
    }
}

fn controller() -> (
    ScanSessionController<Arc<RecordingFeedback>>,
    Arc<RecordingFeedback>,
) {
    let feedback = Arc::new(RecordingFeedback::default());
    (ScanSessionController::new(Arc::clone(&feedback)), feedback)
}

fn scanning_with(company: Company) -> (
    ScanSessionController<Arc<RecordingFeedback>>,
    Arc<RecordingFeedback>,
) {
    let (mut controller, feedback) = controller();
    controller.select_company(company).expect("select");
    controller.start_session().expect("start");
    (controller, feedback)
}

fn ledger_view(controller: &ScanSessionController<Arc<RecordingFeedback>>) -> Vec<(String, u32)> {
    controller
        .entries()
        .iter()
        .map(|e| (e.barcode.clone(), e.count))
        .collect()
}

fn assert_rejected(err: SessionError, expected: ValidationError) {
    match err {
        SessionError::Validation(actual) => assert_eq!(actual, expected),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn aramex_session_reviews_and_summarises() {
    let (mut controller, _) = scanning_with(aramex());
    controller.scan("ABC123").expect("scan");
    controller.scan("ABC123").expect("scan");
    controller.scan("XYZ999").expect("scan");
    controller.finish_scanning().expect("review");

    assert_eq!(controller.state(), SessionState::Review);
    assert_eq!(
        ledger_view(&controller),
        vec![("XYZ999".to_string(), 1), ("ABC123".to_string(), 2)]
    );

    let api = RecordingApi::default();
    let summary = controller.commit(&api).await.expect("commit").clone();
    assert_eq!(summary.total_unique_barcodes, 2);
    assert_eq!(summary.total_units, 3);
    assert_eq!(
        summary.count_breakdown,
        std::collections::BTreeMap::from([(2, 1)])
    );
    assert_eq!(controller.state(), SessionState::Summary);
    assert!(controller.entries().is_empty());
}

#[test]
fn distinct_entries_match_distinct_barcodes_in_any_order() {
    let (mut controller, _) = scanning_with(aramex());
    let sequence = ["B", "A1", "C22", "A1", "B", "D", "C22", "A1", "E"];
    for barcode in sequence {
        controller.scan(barcode).expect("scan");
    }

    let mut distinct: Vec<&str> = sequence.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    assert_eq!(controller.entries().len(), distinct.len());
    assert_eq!(controller.total_units(), sequence.len() as u64);
    assert_eq!(controller.entries()[0].barcode, "E");
}

#[test]
fn repeated_scans_collapse_into_one_entry() {
    let (mut controller, _) = scanning_with(aramex());
    for n in 1..=7 {
        let outcome = controller.scan("ABC123").expect("scan");
        assert_eq!(outcome.count, n);
        assert_eq!(outcome.repeated, n > 1);
    }
    assert_eq!(ledger_view(&controller), vec![("ABC123".to_string(), 7)]);
}

#[test]
fn scan_before_session_start_is_rejected_without_transition() {
    let (mut controller, feedback) = controller();
    controller.select_company(aramex()).expect("select");

    let err = controller.scan("ABC123").expect_err("must reject");
    assert_rejected(
        err,
        ValidationError::InvalidTransition {
            state: SessionState::Ready,
            action: Action::Scan,
        },
    );
    assert_eq!(controller.state(), SessionState::Ready);
    assert!(controller.entries().is_empty());
    assert_eq!(feedback.tones(), vec![Tone::Failure]);
}

#[test]
fn empty_barcode_is_rejected_and_keeps_input() {
    let (mut controller, feedback) = scanning_with(aramex());
    controller.set_input("   ");

    let err = controller.scan("   ").expect_err("must reject");
    assert_rejected(err, ValidationError::EmptyBarcode);
    assert_eq!(controller.input(), "   ");
    assert!(controller.entries().is_empty());
    assert_eq!(feedback.tones(), vec![Tone::Failure]);
}

#[test]
fn accepted_scan_clears_input_and_signals_success() {
    let (mut controller, feedback) = scanning_with(aramex());
    controller.set_input("ABC123");
    let input = controller.input().to_string();

    controller.scan(&input).expect("scan");
    assert_eq!(controller.input(), "");
    assert_eq!(feedback.tones(), vec![Tone::Success]);
}

#[test]
fn start_requires_selected_company() {
    let (mut controller, _) = controller();
    let err = controller.start_session().expect_err("must reject");
    assert_rejected(err, ValidationError::NoCompanySelected);
    assert_eq!(controller.state(), SessionState::Ready);
}

#[test]
fn company_cannot_change_mid_session() {
    let (mut controller, _) = scanning_with(aramex());
    let err = controller.select_company(smsa()).expect_err("must reject");
    assert!(err.is_validation());
    assert_eq!(controller.session_company_id(), Some(CompanyId(1)));
    assert_eq!(controller.selected_company().map(|c| c.id), Some(CompanyId(1)));
}

#[test]
fn finishing_an_empty_session_is_rejected() {
    let (mut controller, _) = scanning_with(aramex());
    let err = controller.finish_scanning().expect_err("must reject");
    assert_rejected(err, ValidationError::EmptyLedger);
    assert_eq!(controller.state(), SessionState::Scanning);
}

#[test]
fn review_can_return_to_scanning() {
    let (mut controller, _) = scanning_with(aramex());
    controller.scan("ABC123").expect("scan");
    controller.finish_scanning().expect("review");

    let err = controller.scan("XYZ999").expect_err("no scans in review");
    assert!(err.is_validation());

    controller.continue_scanning().expect("continue");
    controller.scan("XYZ999").expect("scan");
    assert_eq!(controller.entries().len(), 2);
}

#[test]
fn decrement_never_goes_below_one() {
    let (mut controller, _) = scanning_with(aramex());
    controller.scan("ABC123").expect("scan");
    controller.finish_scanning().expect("review");

    assert_eq!(controller.decrement("ABC123").expect("dec"), 1);
    assert_eq!(controller.increment("ABC123").expect("inc"), 2);
    assert_eq!(controller.increment("ABC123").expect("inc"), 3);
    assert_eq!(controller.decrement("ABC123").expect("dec"), 2);
    assert_eq!(ledger_view(&controller), vec![("ABC123".to_string(), 2)]);
}

#[test]
fn deleting_removes_only_that_barcode() {
    let (mut controller, _) = scanning_with(aramex());
    for barcode in ["A1", "B2", "B2", "C3", "C3", "C3"] {
        controller.scan(barcode).expect("scan");
    }
    controller.finish_scanning().expect("review");

    let removed = controller.remove("B2").expect("remove");
    assert_eq!(removed.count, 2);
    assert_eq!(
        ledger_view(&controller),
        vec![("C3".to_string(), 3), ("A1".to_string(), 1)]
    );

    let err = controller.remove("B2").expect_err("already gone");
    assert_rejected(err, ValidationError::UnknownBarcode("B2".to_string()));
}

#[tokio::test]
async fn commit_issues_one_call_per_unit_with_entry_company() {
    let (mut controller, _) = scanning_with(smsa());
    controller.scan("ABC123").expect("scan");
    controller.scan("XYZ999").expect("scan");
    controller.finish_scanning().expect("review");
    controller.increment("ABC123").expect("inc");
    controller.increment("ABC123").expect("inc");

    let api = RecordingApi::default();
    controller.commit(&api).await.expect("commit");

    let calls = api.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls.iter().filter(|(b, _)| b == "ABC123").count(), 3);
    assert_eq!(calls.iter().filter(|(b, _)| b == "XYZ999").count(), 1);
    assert!(calls.iter().all(|(_, company)| *company == CompanyId(2)));
}

#[tokio::test]
async fn failed_commit_returns_to_review_with_ledger_intact() {
    let (mut controller, feedback) = scanning_with(aramex());
    controller.scan("ABC123").expect("scan");
    controller.scan("XYZ999").expect("scan");
    controller.finish_scanning().expect("review");
    let before = controller.entries().to_vec();

    let api = RecordingApi::failing_on(2);
    let err = controller.commit(&api).await.expect_err("must fail");
    match err {
        SessionError::Commit {
            failed, attempted, ..
        } => {
            assert_eq!(failed, 1);
            assert_eq!(attempted, 2);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(controller.state(), SessionState::Review);
    assert_eq!(controller.entries(), before.as_slice());
    assert!(controller.summary().is_none());
    assert_eq!(feedback.tones().last(), Some(&Tone::Failure));
}

#[tokio::test]
async fn retry_after_failed_commit_can_succeed() {
    let (mut controller, _) = scanning_with(aramex());
    controller.scan("ABC123").expect("scan");
    controller.finish_scanning().expect("review");

    let failing = RecordingApi::failing_on(1);
    controller.commit(&failing).await.expect_err("first attempt fails");

    let api = RecordingApi::default();
    let summary = controller.commit(&api).await.expect("retry");
    assert_eq!(summary.total_units, 1);
    assert_eq!(controller.state(), SessionState::Summary);
}

#[tokio::test]
async fn commit_outside_review_is_rejected_without_calls() {
    let (mut controller, _) = scanning_with(aramex());
    controller.scan("ABC123").expect("scan");

    let api = RecordingApi::default();
    let err = controller.commit(&api).await.expect_err("must reject");
    assert!(err.is_validation());
    assert!(api.calls().is_empty());
    assert_eq!(controller.state(), SessionState::Scanning);
}

#[tokio::test]
async fn new_session_clears_summary_and_selection() {
    let (mut controller, _) = scanning_with(aramex());
    controller.scan("ABC123").expect("scan");
    controller.finish_scanning().expect("review");
    controller
        .commit(&RecordingApi::default())
        .await
        .expect("commit");

    controller.start_new_session().expect("new session");
    assert_eq!(controller.state(), SessionState::Ready);
    assert!(controller.summary().is_none());
    assert!(controller.selected_company().is_none());
    assert!(controller.session_company_id().is_none());

    let err = controller.start_session().expect_err("selection cleared");
    assert_rejected(err, ValidationError::NoCompanySelected);
}

#[test]
fn abandon_discards_uncommitted_entries() {
    let (mut controller, _) = scanning_with(aramex());
    controller.scan("ABC123").expect("scan");
    controller.abandon().expect("abandon");

    assert_eq!(controller.state(), SessionState::Ready);
    assert!(controller.entries().is_empty());
    assert_eq!(controller.selected_company().map(|c| c.id), Some(CompanyId(1)));
    controller.start_session().expect("restart with same company");
}

#[test]
fn summary_only_reachable_through_commit() {
    let (mut controller, _) = scanning_with(aramex());
    let err = controller.start_new_session().expect_err("must reject");
    assert_rejected(
        err,
        ValidationError::InvalidTransition {
            state: SessionState::Scanning,
            action: Action::StartNewSession,
        },
    );
}

#[tokio::test(start_paused = true)]
async fn dropped_commit_returns_to_review_with_ledger_intact() {
    let (mut controller, _) = scanning_with(aramex());
    controller.scan("ABC123").expect("scan");
    controller.scan("ABC123").expect("scan");
    controller.finish_scanning().expect("review");

    let api = RecordingApi::stalling();
    let outcome =
        tokio::time::timeout(std::time::Duration::from_secs(5), controller.commit(&api)).await;
    assert!(outcome.is_err(), "commit should still be pending");

    assert_eq!(controller.state(), SessionState::Review);
    assert_eq!(ledger_view(&controller), vec![("ABC123".to_string(), 2)]);
    assert_eq!(api.attempts.load(Ordering::SeqCst), 2);

    let retry = RecordingApi::default();
    controller.commit(&retry).await.expect("retry commit");
    assert_eq!(controller.state(), SessionState::Summary);
    assert_eq!(retry.calls().len(), 2);
}

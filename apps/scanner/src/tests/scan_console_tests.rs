use super::*;

use async_trait::async_trait;
use chrono::Utc;
use client_core::ClientError;
use shared::domain::{ShipmentRecord, StatsFilter, StatsReport};

fn command(line: &str) -> ConsoleCommand {
    match parse_line(line).expect("parse") {
        ConsoleLine::Command(command) => command,
        other => panic!("expected a command, got {other:?}"),
    }
}

#[test]
fn plain_lines_are_scanner_input() {
    assert_eq!(
        parse_line("  PKG-0001  ").expect("parse"),
        ConsoleLine::Input("PKG-0001".into())
    );
    assert_eq!(parse_line("   ").expect("parse"), ConsoleLine::Blank);
}

#[test]
fn parses_session_commands() {
    assert_eq!(command(":review"), ConsoleCommand::Review);
    assert_eq!(command(":continue"), ConsoleCommand::Continue);
    assert_eq!(command(":COMMIT"), ConsoleCommand::Commit);
    assert_eq!(command(":new"), ConsoleCommand::New);
    assert_eq!(command(":q"), ConsoleCommand::Quit);
    assert_eq!(command(":company 7"), ConsoleCommand::Company(CompanyId(7)));
}

#[test]
fn quantity_commands_keep_the_barcode_verbatim() {
    assert_eq!(
        command(":inc  PKG-0001 "),
        ConsoleCommand::Increment("PKG-0001".into())
    );
    assert_eq!(
        command(":dec PKG-0001"),
        ConsoleCommand::Decrement("PKG-0001".into())
    );
    assert_eq!(
        command(":del PKG-0001"),
        ConsoleCommand::Remove("PKG-0001".into())
    );
    assert_eq!(command(":scan abc"), ConsoleCommand::Scan("abc".into()));
    assert_eq!(command(":type PKG-00"), ConsoleCommand::Type("PKG-00".into()));
}

#[test]
fn rejects_bad_commands() {
    assert_eq!(
        parse_line(":inc").expect_err("needs barcode"),
        ParseError::MissingBarcode("inc")
    );
    assert!(matches!(
        parse_line(":company seven").expect_err("bad id"),
        ParseError::BadCompanyId(_)
    ));
    assert_eq!(
        parse_line(":launch").expect_err("unknown"),
        ParseError::Unknown("launch".into())
    );
}

struct AcceptingApi;

fn aramex() -> Company {
    Company {
        id: CompanyId(1),
        name: "Aramex".into(),
        active: true,
    }
}

#[async_trait]
impl ShipmentApi for AcceptingApi {
    async fn list_companies(&self, _active_only: bool) -> Result<Vec<Company>, ClientError> {
        Ok(vec![aramex()])
    }

    async fn create_shipment(
        &self,
        barcode: &str,
        company_id: CompanyId,
    ) -> Result<ShipmentRecord, ClientError> {
        Ok(ShipmentRecord {
            id: None,
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
        Ok(StatsReport::default())
    }
}

fn scanning_station(api: &AcceptingApi) -> (Station<'_, AcceptingApi>, UnboundedReceiver<String>) {
    let directory = CompanyDirectory::from_companies(vec![aramex()], true);
    let (mut station, submissions) = Station::new(api, directory, &Settings::default());
    station.select(aramex());
    (station, submissions)
}

fn ledger_of(station: &Station<'_, AcceptingApi>) -> Vec<(String, u32)> {
    station
        .controller
        .entries()
        .iter()
        .map(|entry| (entry.barcode.clone(), entry.count))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn back_to_back_lines_each_count_as_a_scan() {
    let api = AcceptingApi;
    let (mut station, mut submissions) = scanning_station(&api);
    assert!(station.handle_line(":start").await);

    for line in ["ABC123", "ABC123", "XYZ999"] {
        assert!(station.handle_line(line).await);
    }
    assert!(!station.debouncer.is_pending());
    station.flush_pending(&mut submissions);

    assert_eq!(
        ledger_of(&station),
        vec![("XYZ999".to_string(), 1), ("ABC123".to_string(), 2)]
    );
    assert_eq!(station.controller.total_units(), 3);
}

#[tokio::test(start_paused = true)]
async fn typed_input_submits_after_quiet_period() {
    let api = AcceptingApi;
    let (mut station, mut submissions) = scanning_station(&api);
    assert!(station.handle_line(":start").await);

    assert!(station.handle_line(":type PKG").await);
    assert!(station.handle_line(":type PKG-0001").await);
    assert!(station.debouncer.is_pending());

    let submitted = submissions.recv().await.expect("debounced value");
    assert_eq!(submitted, "PKG-0001");
    station.scan(&submitted);
    assert_eq!(ledger_of(&station), vec![("PKG-0001".to_string(), 1)]);
}

#[tokio::test(start_paused = true)]
async fn pending_typed_input_is_flushed_when_stdin_closes() {
    let api = AcceptingApi;
    let (mut station, mut submissions) = scanning_station(&api);
    assert!(station.handle_line(":start").await);
    assert!(station.handle_line("ABC123").await);
    assert!(station.handle_line(":type XYZ999").await);
    assert!(station.debouncer.is_pending());

    station.flush_pending(&mut submissions);

    assert!(!station.debouncer.is_pending());
    assert_eq!(
        ledger_of(&station),
        vec![("XYZ999".to_string(), 1), ("ABC123".to_string(), 1)]
    );
}

#[tokio::test]
async fn commit_through_console_reaches_summary() {
    let api = AcceptingApi;
    let (mut station, _submissions) = scanning_station(&api);
    for line in [":start", "ABC123", "ABC123", ":review", ":commit"] {
        assert!(station.handle_line(line).await);
    }
    assert_eq!(station.controller.state(), SessionState::Summary);
    let summary = station.controller.summary().expect("summary");
    assert_eq!(summary.total_units, 2);

    assert!(station.handle_line(":new").await);
    assert_eq!(station.controller.state(), SessionState::Ready);
    assert_eq!(
        station.controller.selected_company().map(|c| c.id),
        Some(CompanyId(1))
    );
    assert!(!station.handle_line(":quit").await);
}

//! Interactive scanning station on stdin.
//!
//! Plain lines are Enter-terminated scans and are recorded immediately. `:type` feeds
//! partial input through the debouncer, the way a scanner without an Enter suffix fills
//! the input field. Lines starting with `:` are operator commands.

use std::time::Duration;

use anyhow::{bail, Context};
use client_core::{CompanyDirectory, ShipmentApi};
use scan_session::{ScanDebouncer, ScanSessionController, SessionState};
use shared::domain::{Company, CompanyId};
use thiserror::Error;
use tokio::{
    io::{self, AsyncBufReadExt, BufReader},
    sync::mpsc::UnboundedReceiver,
};
use tracing::{debug, info, warn};

use crate::{config::Settings, feedback::TerminalBell, render};

const HELP: &str = "\
commands:
  :companies          list active companies
  :company <id>       select a company (ready only)
  :start              start scanning for the selected company
  :scan <barcode>     submit a barcode (same as a plain line)
  :type <text>        set the input field; auto-submits after a quiet period
  :list               show the scanned entries
  :review             finish scanning and review the entries
  :continue           go back to scanning from review
  :inc <barcode>      add one unit
  :dec <barcode>      remove one unit (never below 1)
  :del <barcode>      drop the entry
  :commit             send every unit to the service
  :new                start over after a commit
  :abandon            discard the current session
  :help               show this text
  :quit               leave the station
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Companies,
    Company(CompanyId),
    Start,
    Scan(String),
    Type(String),
    List,
    Review,
    Continue,
    Increment(String),
    Decrement(String),
    Remove(String),
    Commit,
    New,
    Abandon,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleLine {
    Blank,
    Input(String),
    Command(ConsoleCommand),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown command ':{0}', try :help")]
    Unknown(String),
    #[error(":{0} needs a barcode")]
    MissingBarcode(&'static str),
    #[error("':{0}' is not a company id")]
    BadCompanyId(String),
}

pub fn parse_line(line: &str) -> Result<ConsoleLine, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ConsoleLine::Blank);
    }
    let Some(rest) = line.strip_prefix(':') else {
        return Ok(ConsoleLine::Input(line.to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let barcode = |cmd: &'static str| {
        if arg.is_empty() {
            Err(ParseError::MissingBarcode(cmd))
        } else {
            Ok(arg.to_string())
        }
    };

    let command = match name.to_ascii_lowercase().as_str() {
        "companies" => ConsoleCommand::Companies,
        "company" => arg
            .parse::<i64>()
            .map(|id| ConsoleCommand::Company(CompanyId(id)))
            .map_err(|_| ParseError::BadCompanyId(format!("company {arg}")))?,
        "start" => ConsoleCommand::Start,
        "scan" => ConsoleCommand::Scan(barcode("scan")?),
        "type" => ConsoleCommand::Type(arg.to_string()),
        "list" | "ls" => ConsoleCommand::List,
        "review" | "done" => ConsoleCommand::Review,
        "continue" => ConsoleCommand::Continue,
        "inc" | "+" => ConsoleCommand::Increment(barcode("inc")?),
        "dec" | "-" => ConsoleCommand::Decrement(barcode("dec")?),
        "del" | "rm" => ConsoleCommand::Remove(barcode("del")?),
        "commit" => ConsoleCommand::Commit,
        "new" => ConsoleCommand::New,
        "abandon" => ConsoleCommand::Abandon,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "q" | "exit" => ConsoleCommand::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(ConsoleLine::Command(command))
}

struct Station<'a, A: ShipmentApi + ?Sized> {
    api: &'a A,
    directory: CompanyDirectory,
    controller: ScanSessionController<TerminalBell>,
    debouncer: ScanDebouncer,
    /// Reselected after `:new` so the operator can keep going with one keystroke.
    last_company: Option<Company>,
}

pub async fn run<A>(api: &A, settings: &Settings, company: Option<CompanyId>) -> anyhow::Result<()>
where
    A: ShipmentApi + ?Sized,
{
    let directory = CompanyDirectory::load(api, true)
        .await
        .context("failed to load companies")?;
    if directory.is_empty() {
        bail!("no active companies; add one with `scanner companies add <name>`");
    }

    let initial = match company {
        Some(id) => match directory.find(id) {
            Some(company) => company.clone(),
            None => bail!("company {id} is not an active company"),
        },
        None => match directory.default_selection() {
            Some(company) => company.clone(),
            None => bail!("no company to select"),
        },
    };

    let (mut station, mut submissions) = Station::new(api, directory, settings);
    station.select(initial);
    print!("{HELP}");
    print!(
        "{}",
        render::companies(
            station.directory.companies(),
            station.controller.selected_company().map(|c| c.id)
        )
    );

    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    station.flush_pending(&mut submissions);
                    break;
                };
                if !station.handle_line(&line).await {
                    break;
                }
            }
            Some(barcode) = submissions.recv() => {
                station.scan(&barcode);
            }
        }
    }

    station.debouncer.cancel();
    if matches!(
        station.controller.state(),
        SessionState::Scanning | SessionState::Review
    ) {
        warn!(
            entries = station.controller.entries().len(),
            "leaving with an uncommitted session"
        );
        let _ = station.controller.abandon();
    }
    info!("scanning station closed");
    Ok(())
}

impl<'a, A: ShipmentApi + ?Sized> Station<'a, A> {
    fn new(
        api: &'a A,
        directory: CompanyDirectory,
        settings: &Settings,
    ) -> (Self, UnboundedReceiver<String>) {
        let (debouncer, submissions) = ScanDebouncer::new(
            Duration::from_millis(settings.debounce_ms),
            settings.min_auto_submit_len,
        );
        let station = Self {
            api,
            directory,
            controller: ScanSessionController::new(TerminalBell),
            debouncer,
            last_company: None,
        };
        (station, submissions)
    }

    /// Submits whatever is still waiting on the debounce timer or already queued, so the
    /// last partial input is not lost when stdin closes.
    fn flush_pending(&mut self, submissions: &mut UnboundedReceiver<String>) {
        if self.debouncer.is_pending() {
            let value = self.controller.input().to_string();
            self.debouncer.submit_now(&value);
        }
        while let Ok(barcode) = submissions.try_recv() {
            self.scan(&barcode);
        }
    }

    /// Returns false once the operator asked to quit.
    async fn handle_line(&mut self, line: &str) -> bool {
        let parsed = match parse_line(line) {
            Ok(parsed) => parsed,
            Err(err) => {
                eprintln!("{err}");
                return true;
            }
        };

        match parsed {
            ConsoleLine::Blank => {}
            ConsoleLine::Input(value) => {
                self.debouncer.cancel();
                self.scan(&value);
            }
            ConsoleLine::Command(ConsoleCommand::Quit) => return false,
            ConsoleLine::Command(command) => self.command(command).await,
        }
        true
    }

    /// Mirrors a keystroke-driven input field: every change restarts the timer.
    fn type_input(&mut self, value: &str) {
        self.controller.set_input(value);
        if self.debouncer.delay().is_zero() {
            self.debouncer.submit_now(value);
        } else if !self.debouncer.input_changed(value) {
            debug!(len = value.trim().chars().count(), "input too short to auto-submit");
        }
    }

    fn scan(&mut self, barcode: &str) {
        match self.controller.scan(barcode) {
            Ok(outcome) => print!("{}", render::scan_outcome(&outcome)),
            Err(err) => eprintln!("{err}"),
        }
    }

    fn select(&mut self, company: Company) {
        match self.controller.select_company(company.clone()) {
            Ok(()) => {
                println!("selected {} ({})", company.name, company.id);
                self.last_company = Some(company);
            }
            Err(err) => eprintln!("{err}"),
        }
    }

    async fn command(&mut self, command: ConsoleCommand) {
        let result = match command {
            ConsoleCommand::Companies => {
                if let Err(err) = self.directory.refresh(self.api).await {
                    warn!(error = %err, "company refresh failed; showing cached list");
                }
                print!(
                    "{}",
                    render::companies(
                        self.directory.companies(),
                        self.controller.selected_company().map(|c| c.id)
                    )
                );
                Ok(())
            }
            ConsoleCommand::Company(id) => {
                match self.directory.find(id).cloned() {
                    Some(company) => self.select(company),
                    None => eprintln!("company {id} is not an active company"),
                }
                Ok(())
            }
            ConsoleCommand::Start => self.controller.start_session().map(|()| {
                println!("scanning; press :review when done");
            }),
            ConsoleCommand::Scan(barcode) => {
                self.debouncer.cancel();
                self.scan(&barcode);
                Ok(())
            }
            ConsoleCommand::Type(value) => {
                self.type_input(&value);
                Ok(())
            }
            ConsoleCommand::List => {
                print!(
                    "{}",
                    render::ledger(self.controller.entries(), self.controller.total_units())
                );
                Ok(())
            }
            ConsoleCommand::Review => {
                self.debouncer.cancel();
                self.controller.finish_scanning().map(|()| {
                    print!(
                        "{}",
                        render::ledger(self.controller.entries(), self.controller.total_units())
                    );
                })
            }
            ConsoleCommand::Continue => self.controller.continue_scanning(),
            ConsoleCommand::Increment(barcode) => self
                .controller
                .increment(&barcode)
                .map(|count| println!("{barcode}  x{count}")),
            ConsoleCommand::Decrement(barcode) => self
                .controller
                .decrement(&barcode)
                .map(|count| println!("{barcode}  x{count}")),
            ConsoleCommand::Remove(barcode) => self
                .controller
                .remove(&barcode)
                .map(|entry| println!("removed {} ({} units)", entry.barcode, entry.count)),
            ConsoleCommand::Commit => {
                println!(
                    "committing {} units...",
                    self.controller.total_units()
                );
                self.controller
                    .commit(self.api)
                    .await
                    .map(|_| ())
                    .map(|()| {
                        if let Some(summary) = self.controller.summary() {
                            let company = self.controller.selected_company();
                            print!("{}", render::summary(summary, company));
                        }
                    })
            }
            ConsoleCommand::New => self.controller.start_new_session().map(|()| {
                if let Some(company) = self.last_company.clone() {
                    self.select(company);
                }
                println!(":start to begin the next session");
            }),
            ConsoleCommand::Abandon => {
                self.debouncer.cancel();
                self.controller
                    .abandon()
                    .map(|()| println!("session discarded"))
            }
            ConsoleCommand::Help => {
                print!("{HELP}");
                Ok(())
            }
            ConsoleCommand::Quit => Ok(()),
        };

        if let Err(err) = result {
            eprintln!("{err}");
        }
    }
}

#[cfg(test)]
#[path = "tests/scan_console_tests.rs"]
mod tests;

use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use client_core::{auth, report, user_store::UserStore, ShipmentApi, ShipmentServiceClient};
use shared::domain::{CompanyId, StatsFilter, User};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod feedback;
mod render;
mod scan_console;

#[derive(Parser, Debug)]
#[command(name = "scanner", about = "Shipment barcode scanning station")]
struct Cli {
    /// TOML settings file; `scanner.toml` in the working directory is read when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    Whoami,
    ChangePassword {
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
        #[arg(long)]
        confirm: String,
    },
    #[command(subcommand)]
    Companies(CompaniesCommand),
    /// Scan totals for a date range; both bounds default to today.
    Stats {
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        /// 0 means every company.
        #[arg(long, default_value_t = 0)]
        company: i64,
        /// Only rows whose barcode contains this text, case-insensitively.
        #[arg(long)]
        search: Option<String>,
        /// File or directory to write the CSV report to.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Interactive scanning session on stdin.
    Scan {
        #[arg(long)]
        company: Option<i64>,
    },
}

#[derive(Subcommand, Debug)]
enum CompaniesCommand {
    List {
        #[arg(long)]
        active_only: bool,
    },
    Add {
        name: String,
    },
    Toggle {
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = config::load_settings(cli.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let store = UserStore::new(&settings.user_store_path);

    match cli.command {
        Command::Login { username, password } => {
            let user = auth::login(&username, &password)?;
            store.save(&user)?;
            println!("logged in as {}", user.username);
        }
        Command::Logout => {
            store.clear()?;
            println!("logged out");
        }
        Command::Whoami => match store.load() {
            Some(user) => println!("{} (id {})", user.username, user.id),
            None => println!("not logged in"),
        },
        Command::ChangePassword {
            current,
            new,
            confirm,
        } => {
            require_user(&store)?;
            auth::change_password(&current, &new, &confirm)?;
            println!("password changed");
        }
        Command::Companies(command) => {
            require_user(&store)?;
            let api = connect(&settings)?;
            run_companies(&api, command).await?;
        }
        Command::Stats {
            from,
            to,
            company,
            search,
            csv,
        } => {
            require_user(&store)?;
            let api = connect(&settings)?;
            let today = Utc::now().date_naive();
            let filter = StatsFilter {
                start_date: Some(from.unwrap_or(today)),
                end_date: Some(to.unwrap_or(today)),
                company_id: (company > 0).then_some(CompanyId(company)),
            };
            if filter.start_date > filter.end_date {
                bail!("--from must not be after --to");
            }

            let mut stats = api.query_stats(&filter).await?;
            if let Some(query) = search.as_deref() {
                report::filter_by_barcode(&mut stats, query);
            }
            print!("{}", render::stats(&stats));
            if let Some(target) = csv {
                let path = report::export_report(&target, &stats, &filter)?;
                println!("report written to {}", path.display());
            }
        }
        Command::Scan { company } => {
            let user = require_user(&store)?;
            info!(username = %user.username, "starting scanning station");
            let api = connect(&settings)?;
            scan_console::run(&api, &settings, company.map(CompanyId)).await?;
        }
    }

    Ok(())
}

fn require_user(store: &UserStore) -> Result<User> {
    match store.load() {
        Some(user) => Ok(user),
        None => bail!("not logged in; run `scanner login` first"),
    }
}

fn connect(settings: &config::Settings) -> Result<ShipmentServiceClient> {
    ShipmentServiceClient::with_timeout(
        &settings.api_base_url,
        Duration::from_secs(settings.request_timeout_secs),
    )
    .with_context(|| format!("failed to create client for {}", settings.api_base_url))
}

async fn run_companies<A>(api: &A, command: CompaniesCommand) -> Result<()>
where
    A: ShipmentApi + ?Sized,
{
    match command {
        CompaniesCommand::List { active_only } => {
            let companies = api.list_companies(active_only).await?;
            print!("{}", render::companies(&companies, None));
        }
        CompaniesCommand::Add { name } => {
            let company = api.create_company(&name).await?;
            println!("added {} ({})", company.name, company.id);
        }
        CompaniesCommand::Toggle { id } => {
            let id = CompanyId(id);
            let current = api
                .list_companies(false)
                .await?
                .into_iter()
                .find(|company| company.id == id)
                .with_context(|| format!("company {id} not found"))?;
            let updated = api.set_company_active(id, !current.active).await?;
            let status = if updated.active { "active" } else { "inactive" };
            println!("{} ({}) is now {status}", updated.name, updated.id);
        }
    }
    Ok(())
}

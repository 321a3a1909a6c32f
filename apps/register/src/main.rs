//! # Tally Register
//!
//! Terminal point of sale: one cashier, one cart, commands on stdin.
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. init_tracing()              RUST_LOG or info,tally=debug,sqlx=warn  │
//! │  2. RegisterConfig::load()      defaults → TOML → TALLY_* env           │
//! │  3. Database::new()             pool + migrations                       │
//! │  4. cashier check               configured cashier must exist           │
//! │  5. command loop                stdin lines → Session                   │
//! │  6. db.close()                  on quit or end of input                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod commands;
mod config;
mod error;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tally_core::CashierId;
use tally_db::{Database, DbConfig};

use crate::commands::{Reply, Session};
use crate::config::RegisterConfig;
use crate::error::{AppError, AppResult};

#[derive(Debug, Parser)]
#[command(name = "register", version, about = "Tally POS terminal register")]
struct Cli {
    /// Config file (default: register.toml in the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database file, overrides the configured path
    #[arg(short, long)]
    db: Option<PathBuf>,

    /// Cashier id, overrides the configured cashier
    #[arg(long)]
    cashier: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Register stopped");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    let mut config = RegisterConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.database.path = Some(db);
    }
    if let Some(cashier) = cli.cashier {
        config.register.cashier_id = cashier;
    }
    config.validate()?;

    let currency = config.currency()?;
    let db_path = config.database_path();
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    info!(
        store = %config.store.name,
        currency = currency.code(),
        cashier_id = %config.register.cashier_id,
        db = %db_path.display(),
        "Configuration loaded"
    );

    let db = Database::new(DbConfig::new(&db_path).max_connections(config.database.max_connections))
        .await?;

    let result = serve(&db, &config).await;
    db.close().await;
    result
}

async fn serve(db: &Database, config: &RegisterConfig) -> AppResult<()> {
    let cashier_id = CashierId::from(config.register.cashier_id.trim());
    match db.cashiers().get_by_id(&cashier_id).await? {
        None => return Err(AppError::UnknownCashier(cashier_id.to_string())),
        Some(cashier) if !cashier.is_active => {
            return Err(AppError::InactiveCashier(cashier_id.to_string()))
        }
        Some(cashier) => info!(cashier = %cashier.display_name, "Cashier signed in"),
    }

    let mut session = Session::new(db.clone(), cashier_id, config.currency()?, config.timeouts());

    println!("{} - register open. Type 'help' for commands.", config.store.name);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match session.handle_line(&line).await {
            Reply::Continue(text) => println!("{}", text),
            Reply::Quit => break,
        }
    }

    if !session.register().cart().is_empty() {
        warn!(
            lines = session.register().cart().lines().len(),
            "Register closed with an open cart; sale discarded"
        );
    }
    info!("Register closed");
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// Logs go to stderr so they don't interleave with the command prompt.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tally=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

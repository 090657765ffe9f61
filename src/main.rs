use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;

use ledger_audit::{
    describe_transfers, get_all_accounts, insert_accounts, load_accounts_csv, open_ledger,
    recent_transfers, AuditConfig, ConsistencyMonitor, MockTransferGenerator, RunOutcome,
    TransferCategory, TransferService,
};

#[derive(Parser)]
#[command(name = "ledger-audit")]
#[command(about = "Ledger Audit - background consistency checks for a double-entry ledger", long_about = None)]
struct Cli {
    /// Ledger database path (defaults to LEDGER_DB_PATH or ./ledger.db)
    #[arg(short, long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the ledger schema
    Init,

    /// Import accounts from a Name,Balance CSV
    Import {
        csv: PathBuf,
    },

    /// Create seed accounts if the ledger has fewer than two
    Seed,

    /// List accounts and balances
    Accounts,

    /// Move value between two accounts
    Transfer {
        /// Origin account id
        origin: i64,
        /// Destination account id
        destination: i64,
        /// Amount to move
        amount: Decimal,
        #[arg(long, default_value = "MOCK")]
        category: TransferCategory,
    },

    /// List the most recent transfers
    Transfers {
        /// Include every category, not only MOCK
        #[arg(long)]
        all: bool,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Run the consistency checks and print the snapshot
    Check {
        /// Number of consecutive runs
        #[arg(long, default_value_t = 1)]
        rounds: u32,
    },
}

fn main() -> Result<()> {
    let config = AuditConfig::from_env()?;
    ledger_audit::init_tracing(config.log_json);

    let cli = Cli::parse();
    let db_path = cli.db.clone().unwrap_or_else(|| config.database_path.clone());

    match cli.command {
        Commands::Init => {
            open_ledger(&db_path)?;
            println!("✓ Ledger initialized at {}", db_path.display());
        }
        Commands::Import { csv } => run_import(&db_path, &csv)?,
        Commands::Seed => {
            let conn = open_ledger(&db_path)?;
            let created = MockTransferGenerator::new().ensure_seed_accounts(&conn)?;
            println!("✓ Created {} seed account(s)", created);
        }
        Commands::Accounts => {
            let conn = open_ledger(&db_path)?;
            for account in get_all_accounts(&conn)? {
                let balance = account
                    .balance
                    .map(|b| b.to_string())
                    .unwrap_or_else(|| "null".to_string());
                println!("{:>6}  {:<20} {}", account.id, account.name, balance);
            }
        }
        Commands::Transfer {
            origin,
            destination,
            amount,
            category,
        } => {
            let mut conn = open_ledger(&db_path)?;
            let service = TransferService::new(config.chaos.clone());
            let record = service
                .transfer(&mut conn, origin, destination, amount, category)
                .context("Transfer failed")?;
            println!(
                "✓ Transfer {} persisted: {} -> {} amount {} ({})",
                record.id, record.origin_account_id, record.destination_account_id, record.amount, record.category
            );
        }
        Commands::Transfers { all, limit } => {
            let conn = open_ledger(&db_path)?;
            let category = if all { None } else { Some(TransferCategory::Mock) };
            let transfers = describe_transfers(&conn, recent_transfers(&conn, category, limit)?)?;
            println!("{}", serde_json::to_string_pretty(&transfers)?);
        }
        Commands::Check { rounds } => run_check(&db_path, &config, rounds)?,
    }

    Ok(())
}

fn run_import(db_path: &std::path::Path, csv_path: &std::path::Path) -> Result<()> {
    println!("📂 Loading accounts from {}...", csv_path.display());
    let accounts = load_accounts_csv(csv_path)?;
    println!("✓ Loaded {} accounts from CSV", accounts.len());

    let mut conn = open_ledger(db_path)?;
    let tx = conn.transaction()?;
    let inserted = insert_accounts(&tx, &accounts)?;
    tx.commit()?;
    println!("✓ Inserted {} accounts", inserted);

    Ok(())
}

fn run_check(db_path: &std::path::Path, config: &AuditConfig, rounds: u32) -> Result<()> {
    let mut conn = open_ledger(db_path)?;
    let monitor = ConsistencyMonitor::from_config(config);

    for round in 1..=rounds.max(1) {
        match monitor.run_checks(&mut conn) {
            RunOutcome::Success(found) => eprintln!("Run {}: {} issue(s)", round, found),
            RunOutcome::Failure(description) => eprintln!("Run {}: failed: {}", round, description),
        }
    }

    println!("{}", serde_json::to_string_pretty(&monitor.get_snapshot())?);
    Ok(())
}

// Ledger Audit - Core Library
// Exposes the ledger store, the consistency monitor, and the traffic
// collaborators for use in the CLI, the API server, and tests

pub mod db;
pub mod issues;
pub mod validators;
pub mod baseline;   // Drift detection against a rolling checkpoint
pub mod monitor;    // Tick orchestration + snapshot publishing
pub mod config;
pub mod transfer;
pub mod generator;

#[cfg(feature = "server")]
pub mod scheduler;
#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use db::{
    Account, TransferTransaction, TransferCategory, TransferSummary, NewTransfer,
    open_ledger, setup_database, get_all_accounts, find_account_by_name,
    recent_transfers, describe_transfers, load_accounts_csv, insert_accounts,
};
pub use issues::{
    ConsistencyIssue, Severity, IssueLog, IssueSink, DEFAULT_ISSUE_CAPACITY,
};
pub use baseline::{
    BaselineSnapshot, DriftDetector, DriftVerdict, MonitoredAccounts,
};
pub use monitor::{
    ConsistencyMonitor, ConsistencySnapshot, RunOutcome,
};
pub use config::{AuditConfig, ConfigError};
pub use transfer::{ChaosConfig, TransferError, TransferService};
pub use generator::MockTransferGenerator;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// `info` filter; `json` switches to JSON lines.
pub fn init_tracing(json: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

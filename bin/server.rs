// Ledger Audit - Web Server
// Serves the consistency snapshot and runs the audit and traffic clocks

use anyhow::{Context, Result};
use ledger_audit::api::{build_router, AppState};
use ledger_audit::scheduler::{spawn_consistency_checks, spawn_mock_transfers};
use ledger_audit::{open_ledger, AuditConfig, ConsistencyMonitor, TransferService, VERSION};
use std::sync::{Arc, Mutex};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AuditConfig::from_env()?;
    ledger_audit::init_tracing(config.log_json);

    // Writers and API reads share one handle; the auditor gets its own so its
    // read transaction sees concurrent commits the way an external reader would
    let ledger = Arc::new(Mutex::new(open_ledger(&config.database_path)?));
    let audit_ledger = Arc::new(Mutex::new(open_ledger(&config.database_path)?));
    info!(path = %config.database_path.display(), "Ledger opened");

    let monitor = Arc::new(ConsistencyMonitor::from_config(&config));
    spawn_consistency_checks(
        Arc::clone(&monitor),
        audit_ledger,
        config.initial_delay,
        config.check_period,
    );

    if config.generator_enabled {
        spawn_mock_transfers(
            Arc::clone(&ledger),
            Arc::new(TransferService::new(config.chaos.clone())),
            config.generator_initial_delay,
            config.generator_period,
        );
    }

    let app = build_router(AppState {
        ledger,
        monitor,
        version: VERSION.to_string(),
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!(
        addr = %config.bind_addr,
        audit_period_ms = u64::try_from(config.check_period.as_millis()).unwrap_or(u64::MAX),
        chaos = config.chaos.enabled,
        "Ledger Audit server running"
    );

    axum::serve(listener, app)
        .await
        .context("Server terminated")?;

    Ok(())
}

// Background loops: the consistency check clock and the synthetic traffic clock
//
// Both follow the same shape: wait the initial delay, then tick at a fixed
// rate and run the blocking SQLite work on the blocking pool. Each tick is
// awaited before the next one is taken, so ticks never overlap.

use crate::generator::MockTransferGenerator;
use crate::monitor::ConsistencyMonitor;
use crate::transfer::{TransferError, TransferService};
use rusqlite::Connection;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, warn};

pub type SharedConnection = Arc<Mutex<Connection>>;

fn fixed_rate(period: Duration) -> time::Interval {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Run `monitor.run_checks` every `period` after `initial_delay`.
///
/// `ledger` should be a connection dedicated to the auditor so a tick's read
/// transaction does not block writers on the same handle.
pub fn spawn_consistency_checks(
    monitor: Arc<ConsistencyMonitor>,
    ledger: SharedConnection,
    initial_delay: Duration,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        time::sleep(initial_delay).await;
        let mut interval = fixed_rate(period);

        loop {
            interval.tick().await;

            let monitor_bg = Arc::clone(&monitor);
            let ledger_bg = Arc::clone(&ledger);
            let tick = tokio::task::spawn_blocking(move || {
                let mut conn = ledger_bg.lock().unwrap_or_else(PoisonError::into_inner);
                monitor_bg.run_checks(&mut conn)
            })
            .await;

            match tick {
                Ok(outcome) => debug!(?outcome, "Consistency tick complete"),
                Err(e) => {
                    error!("Consistency tick aborted: {e}");
                    monitor.record_failure(&e.to_string());
                }
            }
        }
    })
}

/// Drive the synthetic transfer generator every `period` after `initial_delay`.
/// Failed transfers are logged and the loop carries on.
pub fn spawn_mock_transfers(
    ledger: SharedConnection,
    service: Arc<TransferService>,
    initial_delay: Duration,
    period: Duration,
) -> JoinHandle<()> {
    let generator = Arc::new(Mutex::new(MockTransferGenerator::new()));

    tokio::spawn(async move {
        time::sleep(initial_delay).await;
        let mut interval = fixed_rate(period);

        loop {
            interval.tick().await;

            let ledger_bg = Arc::clone(&ledger);
            let service_bg = Arc::clone(&service);
            let generator_bg = Arc::clone(&generator);
            let tick = tokio::task::spawn_blocking(move || {
                let mut conn = ledger_bg.lock().unwrap_or_else(PoisonError::into_inner);
                let mut generator = generator_bg.lock().unwrap_or_else(PoisonError::into_inner);
                generator.generate(&mut conn, &service_bg)
            })
            .await;

            match tick {
                Ok(Ok(_)) => {}
                Ok(Err(TransferError::ChaosInjected)) => {
                    warn!("Failed to generate mock transfer: chaos failure injected after origin update")
                }
                Ok(Err(e)) => warn!("Failed to generate mock transfer: {e}"),
                Err(e) => error!("Mock transfer tick aborted: {e}"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::MonitoredAccounts;
    use crate::db::{find_max_transfer_id, insert_account, setup_database};
    use rust_decimal_macros::dec;

    fn shared_ledger() -> SharedConnection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    #[tokio::test]
    async fn test_consistency_loop_publishes_runs() {
        let ledger = shared_ledger();
        {
            let conn = ledger.lock().unwrap();
            insert_account(&conn, "Joao", Some(dec!(100))).unwrap();
            insert_account(&conn, "Maria", Some(dec!(200))).unwrap();
        }
        let monitor = Arc::new(ConsistencyMonitor::new(MonitoredAccounts::default(), 200));

        let handle = spawn_consistency_checks(
            Arc::clone(&monitor),
            Arc::clone(&ledger),
            Duration::ZERO,
            Duration::from_millis(10),
        );
        time::sleep(Duration::from_millis(200)).await;
        handle.abort();

        let snapshot = monitor.get_snapshot();
        assert!(snapshot.last_checked_at.is_some());
        assert!(snapshot.healthy);
        assert!(monitor.baseline().is_some());
    }

    #[tokio::test]
    async fn test_initial_delay_holds_first_run() {
        let monitor = Arc::new(ConsistencyMonitor::new(MonitoredAccounts::default(), 200));

        let handle = spawn_consistency_checks(
            Arc::clone(&monitor),
            shared_ledger(),
            Duration::from_secs(60),
            Duration::from_millis(10),
        );
        time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert!(monitor.get_snapshot().last_checked_at.is_none());
    }

    #[tokio::test]
    async fn test_mock_transfer_loop_generates_traffic() {
        let ledger = shared_ledger();

        let handle = spawn_mock_transfers(
            Arc::clone(&ledger),
            Arc::new(TransferService::default()),
            Duration::ZERO,
            Duration::from_millis(10),
        );
        time::sleep(Duration::from_millis(200)).await;
        handle.abort();

        let conn = ledger.lock().unwrap();
        assert!(find_max_transfer_id(&conn).unwrap() > 0);
    }
}

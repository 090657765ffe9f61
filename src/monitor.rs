// Consistency monitor - runs every check once per tick and publishes the result
//
// Pipeline per tick, inside one read transaction:
//   structural validators -> baseline drift detector -> issue log
//
// A failing tick never escapes as an error: it becomes a single
// CHECK_RUNTIME_FAILURE issue and the run bookkeeping is still recorded.

use crate::baseline::{BaselineSnapshot, DriftDetector, MonitoredAccounts};
use crate::config::AuditConfig;
use crate::issues::{codes, ConsistencyIssue, IssueLog, IssueSink, Severity};
use crate::validators;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info_span, warn};

// ============================================================================
// RUN OUTCOME
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every check completed; number of issues found
    Success(usize),
    /// A check failed; description of the failure
    Failure(String),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success(_))
    }
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Read model handed to callers. `healthy` and the count describe only the
/// latest run; `recent_issues` is the whole bounded history, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencySnapshot {
    pub healthy: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub issues_detected_in_last_run: usize,
    pub recent_issues: Vec<ConsistencyIssue>,
}

struct PublishedState {
    log: IssueLog,
    last_checked_at: Option<DateTime<Utc>>,
    issues_detected_in_last_run: usize,
}

// ============================================================================
// MONITOR
// ============================================================================

pub struct ConsistencyMonitor {
    /// Held for the whole tick, which also keeps ticks from overlapping
    detector: Mutex<DriftDetector>,
    /// Issue history and last-run bookkeeping, always read and written together
    state: Mutex<PublishedState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ConsistencyMonitor {
    pub fn new(accounts: MonitoredAccounts, issue_capacity: usize) -> Self {
        ConsistencyMonitor {
            detector: Mutex::new(DriftDetector::new(accounts)),
            state: Mutex::new(PublishedState {
                log: IssueLog::with_capacity(issue_capacity),
                last_checked_at: None,
                issues_detected_in_last_run: 0,
            }),
        }
    }

    pub fn from_config(config: &AuditConfig) -> Self {
        Self::new(config.monitored.clone(), config.issue_capacity)
    }

    /// One tick: every check against a single read snapshot of `conn`.
    pub fn run_checks(&self, conn: &mut Connection) -> RunOutcome {
        let mut detector = lock(&self.detector);

        let run_id = uuid::Uuid::new_v4();
        let span = info_span!("consistency_check", %run_id);
        let _guard = span.enter();

        let checked_at = Utc::now();
        let mut sink = IssueSink::new();

        let outcome = match audit_ledger(conn, &mut detector, &mut sink) {
            Ok(found) => RunOutcome::Success(found),
            Err(e) => {
                warn!(error = ?e, "Consistency check execution failed");
                let description = format!("{:#}", e);
                sink.report(
                    codes::CHECK_RUNTIME_FAILURE,
                    Severity::High,
                    format!("Consistency check execution failed: {}", description),
                );
                RunOutcome::Failure(description)
            }
        };

        debug!(issues = sink.len(), "Consistency check finished");
        self.publish(checked_at, sink.into_issues());
        outcome
    }

    /// Record a tick that died before it could report (e.g. a panic caught
    /// by the scheduler) as a failed run.
    pub fn record_failure(&self, description: &str) -> RunOutcome {
        let issue = ConsistencyIssue::new(
            codes::CHECK_RUNTIME_FAILURE,
            Severity::High,
            format!("Consistency check execution failed: {}", description),
        );
        self.publish(issue.detected_at, vec![issue]);
        RunOutcome::Failure(description.to_string())
    }

    fn publish(&self, checked_at: DateTime<Utc>, issues: Vec<ConsistencyIssue>) {
        let mut state = lock(&self.state);
        state.issues_detected_in_last_run = issues.len();
        state.last_checked_at = Some(checked_at);
        for issue in issues {
            state.log.append(issue);
        }
    }

    /// Copy of the published state taken under the state lock
    pub fn get_snapshot(&self) -> ConsistencySnapshot {
        let state = lock(&self.state);
        ConsistencySnapshot {
            healthy: state.issues_detected_in_last_run == 0,
            last_checked_at: state.last_checked_at,
            issues_detected_in_last_run: state.issues_detected_in_last_run,
            recent_issues: state.log.to_vec(),
        }
    }

    pub fn list_issues(&self) -> Vec<ConsistencyIssue> {
        self.get_snapshot().recent_issues
    }

    /// Current checkpoint. Waits for a running tick to finish.
    pub fn baseline(&self) -> Option<BaselineSnapshot> {
        lock(&self.detector).baseline().cloned()
    }
}

/// Structural checks then drift detection inside one deferred transaction.
/// In WAL mode every read in it sees the same committed state.
fn audit_ledger(conn: &mut Connection, detector: &mut DriftDetector, sink: &mut IssueSink) -> Result<usize> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Deferred)
        .context("Failed to open read transaction")?;

    let mut found = validators::run_structural_checks(&tx, sink)?;
    found += detector.check(&tx, sink)?;

    // Nothing was written
    tx.rollback()?;
    Ok(found)
}

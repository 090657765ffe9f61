// Consistency issues - immutable findings plus the bounded history they land in
//
// An issue is a finding, not a fault: validators append them and keep going.
// The log keeps the newest `capacity` entries, newest first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Default number of issues retained by the log
pub const DEFAULT_ISSUE_CAPACITY: usize = 200;

// ============================================================================
// ISSUE CODES
// ============================================================================

pub mod codes {
    pub const NULL_BALANCE: &str = "NULL_BALANCE";
    pub const NEGATIVE_BALANCE: &str = "NEGATIVE_BALANCE";
    pub const SELF_TRANSFER_DETECTED: &str = "SELF_TRANSFER_DETECTED";
    pub const NON_POSITIVE_TRANSFER_AMOUNT: &str = "NON_POSITIVE_TRANSFER_AMOUNT";
    pub const MISSING_ACCOUNT_REFERENCE: &str = "MISSING_ACCOUNT_REFERENCE";
    pub const BASELINE_ACCOUNTS_NOT_FOUND: &str = "BASELINE_ACCOUNTS_NOT_FOUND";
    pub const BASELINE_ACCOUNTS_INVALID: &str = "BASELINE_ACCOUNTS_INVALID";
    pub const TOTAL_BALANCE_DRIFT: &str = "TOTAL_BALANCE_DRIFT";
    pub const CHECK_RUNTIME_FAILURE: &str = "CHECK_RUNTIME_FAILURE";

    /// `LEDGER_MISMATCH_<ACCOUNT>` with the account name upper-cased and
    /// anything outside `[A-Z0-9]` folded to `_`
    pub fn ledger_mismatch(account_name: &str) -> String {
        let suffix: String = account_name
            .trim()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("LEDGER_MISMATCH_{}", suffix)
    }
}

// ============================================================================
// SEVERITY
// ============================================================================

/// Ordered: `Medium < High < Critical`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// CONSISTENCY ISSUE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyIssue {
    pub code: String,
    pub severity: Severity,
    pub message: String,
    pub detected_at: DateTime<Utc>,
}

impl ConsistencyIssue {
    pub fn new(code: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        ConsistencyIssue {
            code: code.into(),
            severity,
            message: message.into(),
            detected_at: Utc::now(),
        }
    }
}

// ============================================================================
// ISSUE SINK (per run)
// ============================================================================

/// Issues found during one run, in detection order.
///
/// Checks push here instead of into the shared log so a run's findings are
/// published together with its bookkeeping under a single lock.
#[derive(Debug, Default)]
pub struct IssueSink {
    issues: Vec<ConsistencyIssue>,
}

impl IssueSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an issue; returns the number appended (always 1) so checks can
    /// sum their contributions
    pub fn report(
        &mut self,
        code: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
    ) -> usize {
        self.issues.push(ConsistencyIssue::new(code, severity, message));
        1
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issues(&self) -> &[ConsistencyIssue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<ConsistencyIssue> {
        self.issues
    }
}

// ============================================================================
// ISSUE LOG
// ============================================================================

/// Bounded most-recent-first history. Not synchronised on its own; the
/// monitor keeps it behind its state lock.
#[derive(Debug, Clone)]
pub struct IssueLog {
    capacity: usize,
    entries: VecDeque<ConsistencyIssue>,
}

impl IssueLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_ISSUE_CAPACITY)
    }

    /// A capacity of zero is bumped to one
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        IssueLog {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Push to the head, evicting from the tail once full
    pub fn append(&mut self, issue: ConsistencyIssue) {
        tracing::warn!(code = %issue.code, severity = %issue.severity, "[{}] {}", issue.code, issue.message);

        self.entries.push_front(issue);
        while self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Owned copy, newest first
    pub fn to_vec(&self) -> Vec<ConsistencyIssue> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for IssueLog {
    fn default() -> Self {
        Self::new()
    }
}

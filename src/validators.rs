// Structural validators - stateless checks against one view of the ledger
//
// Each check returns how many issues it reported. Only the balance check can
// report more than one.

use crate::db;
use crate::issues::{codes, IssueSink, Severity};
use anyhow::Result;
use rusqlite::Connection;
use rust_decimal::Decimal;

/// One issue per account with a null or negative balance
pub fn check_negative_balances(conn: &Connection, sink: &mut IssueSink) -> Result<usize> {
    let mut issues = 0;

    for account in db::get_all_accounts(conn)? {
        match account.balance {
            None => {
                issues += sink.report(
                    codes::NULL_BALANCE,
                    Severity::High,
                    format!("Account {} ({}) has null balance.", account.id, account.name),
                );
            }
            Some(balance) if balance < Decimal::ZERO => {
                issues += sink.report(
                    codes::NEGATIVE_BALANCE,
                    Severity::Critical,
                    format!(
                        "Account {} ({}) has negative balance: {}",
                        account.id, account.name, balance
                    ),
                );
            }
            Some(_) => {}
        }
    }

    Ok(issues)
}

pub fn check_self_transfers(conn: &Connection, sink: &mut IssueSink) -> Result<usize> {
    let count = db::count_self_transfers(conn)?;
    if count <= 0 {
        return Ok(0);
    }

    Ok(sink.report(
        codes::SELF_TRANSFER_DETECTED,
        Severity::High,
        format!(
            "Detected {} transfer(s) where origin and destination are the same account.",
            count
        ),
    ))
}

pub fn check_non_positive_transfers(conn: &Connection, sink: &mut IssueSink) -> Result<usize> {
    let count = db::count_non_positive_transfers(conn)?;
    if count <= 0 {
        return Ok(0);
    }

    Ok(sink.report(
        codes::NON_POSITIVE_TRANSFER_AMOUNT,
        Severity::High,
        format!("Detected {} transfer(s) with amount <= 0.", count),
    ))
}

pub fn check_missing_account_references(conn: &Connection, sink: &mut IssueSink) -> Result<usize> {
    let count = db::count_transfers_with_missing_accounts(conn)?;
    if count <= 0 {
        return Ok(0);
    }

    Ok(sink.report(
        codes::MISSING_ACCOUNT_REFERENCE,
        Severity::Critical,
        format!("Detected {} transfer(s) referencing missing account(s).", count),
    ))
}

/// All structural checks in their fixed order
pub fn run_structural_checks(conn: &Connection, sink: &mut IssueSink) -> Result<usize> {
    let mut issues = 0;
    issues += check_negative_balances(conn, sink)?;
    issues += check_self_transfers(conn, sink)?;
    issues += check_non_positive_transfers(conn, sink)?;
    issues += check_missing_account_references(conn, sink)?;
    Ok(issues)
}

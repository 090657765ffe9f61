// Transfer service - moves value between two accounts and records the transfer
//
// Chaos mode exists to exercise the auditor: it can stall before the balance
// updates (widening the read-skew window) or commit only the origin debit and
// bail out, leaving exactly the kind of partial write the drift detector must
// report.

use crate::db::{self, NewTransfer, TransferCategory, TransferTransaction};
use rand::Rng;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Origin and destination accounts must be different")]
    SameAccount,

    #[error("Transfer amount must be greater than zero")]
    NonPositiveAmount,

    #[error("Origin account not found")]
    OriginNotFound,

    #[error("Destination account not found")]
    DestinationNotFound,

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Destination balance would overflow")]
    BalanceOverflow,

    #[error("Chaos mode injected failure after origin update (partial commit simulation)")]
    ChaosInjected,

    #[error(transparent)]
    Ledger(#[from] anyhow::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ChaosConfig {
    pub enabled: bool,
    pub sleep_before_update: Duration,
    /// Clamped to `[0, 1]`
    pub fail_after_origin_update_probability: f64,
}

impl ChaosConfig {
    pub fn new(enabled: bool, sleep_before_update: Duration, probability: f64) -> Self {
        let probability = if probability.is_nan() { 0.0 } else { probability.clamp(0.0, 1.0) };
        ChaosConfig {
            enabled,
            sleep_before_update,
            fail_after_origin_update_probability: probability,
        }
    }
}

pub struct TransferService {
    chaos: ChaosConfig,
}

impl TransferService {
    pub fn new(chaos: ChaosConfig) -> Self {
        TransferService { chaos }
    }

    pub fn chaos(&self) -> &ChaosConfig {
        &self.chaos
    }

    /// Debit origin, credit destination, append the transfer record, all in
    /// one SQLite transaction.
    pub fn transfer(
        &self,
        conn: &mut Connection,
        origin_account_id: i64,
        destination_account_id: i64,
        amount: Decimal,
        category: TransferCategory,
    ) -> Result<TransferTransaction, TransferError> {
        if origin_account_id == destination_account_id {
            return Err(TransferError::SameAccount);
        }
        if amount <= Decimal::ZERO {
            return Err(TransferError::NonPositiveAmount);
        }

        let tx = conn.transaction()?;

        let origin = db::find_account_by_id(&tx, origin_account_id)?
            .ok_or(TransferError::OriginNotFound)?;
        let destination = db::find_account_by_id(&tx, destination_account_id)?
            .ok_or(TransferError::DestinationNotFound)?;

        let origin_balance = match origin.balance {
            Some(balance) if balance >= amount => balance,
            _ => return Err(TransferError::InsufficientBalance),
        };
        let credited = destination
            .balance
            .unwrap_or(Decimal::ZERO)
            .checked_add(amount)
            .ok_or(TransferError::BalanceOverflow)?;

        self.maybe_sleep_before_update();

        db::update_balance(&tx, origin.id, Some(origin_balance - amount))?;

        if self.should_fail_after_origin_update() {
            // Keep the debit, drop the credit and the record
            tx.commit()?;
            return Err(TransferError::ChaosInjected);
        }

        db::update_balance(&tx, destination.id, Some(credited))?;

        let record = db::insert_transfer(
            &tx,
            &NewTransfer::new(origin.id, destination.id, amount).with_category(category),
        )?;

        tx.commit()?;
        Ok(record)
    }

    fn maybe_sleep_before_update(&self) {
        if !self.chaos.enabled || self.chaos.sleep_before_update.is_zero() {
            return;
        }
        std::thread::sleep(self.chaos.sleep_before_update);
    }

    fn should_fail_after_origin_update(&self) -> bool {
        if !self.chaos.enabled || self.chaos.fail_after_origin_update_probability <= 0.0 {
            return false;
        }
        rand::thread_rng().gen::<f64>() < self.chaos.fail_after_origin_update_probability
    }
}

impl Default for TransferService {
    fn default() -> Self {
        Self::new(ChaosConfig::default())
    }
}

// Synthetic transfer generator - background traffic for the ledger
//
// Seeds a minimal set of accounts on an empty ledger, then moves a random
// whole amount between two random accounts each time it is driven.

use crate::db::{self, Account, TransferCategory, TransferTransaction};
use crate::transfer::{TransferError, TransferService};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusqlite::Connection;
use rust_decimal::Decimal;
use tracing::info;

pub const SEED_NAMES: [&str; 7] = ["Maria", "Joao", "Pedro", "Ana", "Carlos", "Bruno", "Fernanda"];
pub const INITIAL_SEED_BALANCE: i64 = 5000;
pub const MIN_ACCOUNT_COUNT: usize = 2;
pub const MIN_TRANSFER_AMOUNT: i64 = 1;
pub const MAX_TRANSFER_AMOUNT: i64 = 1000;

pub struct MockTransferGenerator {
    rng: StdRng,
}

impl MockTransferGenerator {
    pub fn new() -> Self {
        MockTransferGenerator {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic generator for tests and replays
    pub fn with_seed(seed: u64) -> Self {
        MockTransferGenerator {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create seed accounts until the ledger has at least two accounts.
    /// Returns how many were created.
    pub fn ensure_seed_accounts(&self, conn: &Connection) -> anyhow::Result<usize> {
        let existing = db::get_all_accounts(conn)?;
        if existing.len() >= MIN_ACCOUNT_COUNT {
            return Ok(0);
        }

        let mut created = 0;
        for name in SEED_NAMES {
            if existing.len() + created >= MIN_ACCOUNT_COUNT {
                break;
            }
            if existing.iter().any(|a| a.name.eq_ignore_ascii_case(name)) {
                continue;
            }
            db::insert_account(conn, name, Some(Decimal::from(INITIAL_SEED_BALANCE)))?;
            created += 1;
        }

        if created > 0 {
            info!(created, "Seed accounts created");
        }
        Ok(created)
    }

    /// One synthetic transfer. `Ok(None)` when no account can fund a transfer.
    pub fn generate(
        &mut self,
        conn: &mut Connection,
        service: &TransferService,
    ) -> Result<Option<TransferTransaction>, TransferError> {
        self.ensure_seed_accounts(conn)?;

        let accounts = db::get_all_accounts(conn)?;
        if accounts.len() < MIN_ACCOUNT_COUNT {
            return Ok(None);
        }

        let Some(origin) = self.choose_origin(&accounts) else {
            return Ok(None);
        };
        let Some(destination) = self.choose_destination(&accounts, origin.id) else {
            return Ok(None);
        };

        let available = origin.balance.unwrap_or(Decimal::ZERO);
        let max_amount = available
            .min(Decimal::from(MAX_TRANSFER_AMOUNT))
            .trunc()
            .try_into()
            .unwrap_or(0i64);
        if max_amount < MIN_TRANSFER_AMOUNT {
            return Ok(None);
        }

        let amount = Decimal::from(self.rng.gen_range(MIN_TRANSFER_AMOUNT..=max_amount));
        let (origin_id, destination_id) = (origin.id, destination.id);

        let record = service.transfer(conn, origin_id, destination_id, amount, TransferCategory::Mock)?;
        info!(origin_id, destination_id, %amount, transfer_id = record.id, "Mock transfer persisted");
        Ok(Some(record))
    }

    fn choose_origin<'a>(&mut self, accounts: &'a [Account]) -> Option<&'a Account> {
        let candidates: Vec<&Account> = accounts
            .iter()
            .filter(|a| a.balance.is_some_and(|b| b >= Decimal::ONE))
            .collect();

        if candidates.is_empty() {
            return None;
        }
        Some(candidates[self.rng.gen_range(0..candidates.len())])
    }

    fn choose_destination<'a>(&mut self, accounts: &'a [Account], origin_id: i64) -> Option<&'a Account> {
        let candidates: Vec<&Account> = accounts.iter().filter(|a| a.id != origin_id).collect();

        if candidates.is_empty() {
            return None;
        }
        Some(candidates[self.rng.gen_range(0..candidates.len())])
    }
}

impl Default for MockTransferGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::MonitoredAccounts;
    use crate::db::{find_max_transfer_id, insert_account, setup_database};
    use crate::monitor::{ConsistencyMonitor, RunOutcome};
    use crate::transfer::ChaosConfig;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn ledger() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn pair_total(conn: &Connection) -> Decimal {
        db::get_all_accounts(conn)
            .unwrap()
            .iter()
            .map(|a| a.balance.unwrap_or_default())
            .sum()
    }

    #[test]
    fn test_seeding_creates_monitored_pair() {
        let conn = ledger();
        let generator = MockTransferGenerator::with_seed(7);

        assert_eq!(generator.ensure_seed_accounts(&conn).unwrap(), 2);
        assert_eq!(generator.ensure_seed_accounts(&conn).unwrap(), 0);

        let accounts = db::get_all_accounts(&conn).unwrap();
        assert_eq!(accounts[0].name, "Maria");
        assert_eq!(accounts[1].name, "Joao");
        assert!(accounts.iter().all(|a| a.balance == Some(dec!(5000))));
    }

    #[test]
    fn test_seeding_skips_existing_names() {
        let conn = ledger();
        insert_account(&conn, "maria", Some(dec!(1))).unwrap();

        let generator = MockTransferGenerator::with_seed(7);
        assert_eq!(generator.ensure_seed_accounts(&conn).unwrap(), 1);

        let accounts = db::get_all_accounts(&conn).unwrap();
        assert_eq!(accounts[1].name, "Joao");
    }

    #[test]
    fn test_generated_transfers_preserve_total() {
        let mut conn = ledger();
        let mut generator = MockTransferGenerator::with_seed(42);
        let service = TransferService::default();

        for _ in 0..25 {
            let record = generator.generate(&mut conn, &service).unwrap().unwrap();
            assert!(record.amount >= dec!(1) && record.amount <= dec!(1000));
            assert_ne!(record.origin_account_id, record.destination_account_id);
        }

        assert_eq!(find_max_transfer_id(&conn).unwrap(), 25);
        assert_eq!(pair_total(&conn), dec!(10000));
    }

    #[test]
    fn test_no_funded_origin_generates_nothing() {
        let mut conn = ledger();
        insert_account(&conn, "Joao", Some(dec!(0.99))).unwrap();
        insert_account(&conn, "Maria", None).unwrap();

        let mut generator = MockTransferGenerator::with_seed(1);
        let result = generator.generate(&mut conn, &TransferService::default()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_auditor_stays_healthy_under_clean_traffic() {
        let mut conn = ledger();
        let mut generator = MockTransferGenerator::with_seed(3);
        let service = TransferService::default();
        let monitor = ConsistencyMonitor::new(MonitoredAccounts::default(), 200);

        generator.ensure_seed_accounts(&conn).unwrap();
        monitor.run_checks(&mut conn);

        for _ in 0..10 {
            generator.generate(&mut conn, &service).unwrap();
            assert_eq!(monitor.run_checks(&mut conn), RunOutcome::Success(0));
        }
        assert!(monitor.list_issues().is_empty());
    }

    #[test]
    fn test_auditor_catches_chaos_partial_commit() {
        let mut conn = ledger();
        let mut generator = MockTransferGenerator::with_seed(3);
        let monitor = ConsistencyMonitor::new(MonitoredAccounts::default(), 200);

        generator.ensure_seed_accounts(&conn).unwrap();
        monitor.run_checks(&mut conn);

        let chaos = TransferService::new(ChaosConfig::new(true, Duration::ZERO, 1.0));
        let result = generator.generate(&mut conn, &chaos);
        assert!(matches!(result, Err(TransferError::ChaosInjected)));

        // Debited side mismatches and the pair total dropped
        assert_eq!(monitor.run_checks(&mut conn), RunOutcome::Success(2));
        let issues = monitor.list_issues();
        assert_eq!(issues[0].code, crate::issues::codes::TOTAL_BALANCE_DRIFT);
        assert!(issues[1].code.starts_with("LEDGER_MISMATCH_"));
    }
}

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// RECORDS
// ============================================================================

/// Ledger account. `balance` is nullable in storage; a null balance is a
/// condition the auditor reports, not something the store rejects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub balance: Option<Decimal>,
}

/// Tag on a transfer record. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferCategory {
    /// Synthetic background traffic
    #[default]
    Mock,
    /// Corrective movement between accounts
    Rebalance,
}

impl TransferCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferCategory::Mock => "MOCK",
            TransferCategory::Rebalance => "REBALANCE",
        }
    }
}

impl fmt::Display for TransferCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MOCK" => Ok(TransferCategory::Mock),
            "REBALANCE" => Ok(TransferCategory::Rebalance),
            other => anyhow::bail!("unknown transfer category: {}", other),
        }
    }
}

/// Immutable transfer record. `id` is assigned by the store and is the
/// ordering cursor the auditor replays from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferTransaction {
    pub id: i64,
    pub origin_account_id: i64,
    pub destination_account_id: i64,
    pub amount: Decimal,
    pub occurred_at: DateTime<Utc>,
    pub category: TransferCategory,
}

/// Transfer record before the store assigns its id
#[derive(Debug, Clone)]
pub struct NewTransfer {
    pub origin_account_id: i64,
    pub destination_account_id: i64,
    pub amount: Decimal,
    pub occurred_at: DateTime<Utc>,
    pub category: TransferCategory,
}

impl NewTransfer {
    pub fn new(origin_account_id: i64, destination_account_id: i64, amount: Decimal) -> Self {
        Self {
            origin_account_id,
            destination_account_id,
            amount,
            occurred_at: Utc::now(),
            category: TransferCategory::Mock,
        }
    }

    pub fn with_category(mut self, category: TransferCategory) -> Self {
        self.category = category;
        self
    }
}

/// Transfer joined with the names of both accounts (read model for listings)
#[derive(Debug, Clone, Serialize)]
pub struct TransferSummary {
    pub id: i64,
    pub origin_account_id: i64,
    pub origin_account_name: String,
    pub destination_account_id: i64,
    pub destination_account_name: String,
    pub amount: Decimal,
    pub occurred_at: DateTime<Utc>,
    pub category: TransferCategory,
}

/// Row shape for CSV account import
#[derive(Debug, Deserialize)]
struct AccountRecord {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Balance")]
    balance: Option<String>,
}

// ============================================================================
// SCHEMA
// ============================================================================

/// Open (or create) a file-backed ledger and make sure the schema exists
pub fn open_ledger(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open ledger database at {}", path.display()))?;
    conn.busy_timeout(Duration::from_secs(5))?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL lets the auditor hold a read snapshot while writers commit
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            balance TEXT
        )",
        [],
    )?;

    // No foreign keys: dangling references are detected, not prevented
    conn.execute(
        "CREATE TABLE IF NOT EXISTS transfer_transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            origin_account_id INTEGER NOT NULL,
            destination_account_id INTEGER NOT NULL,
            amount TEXT NOT NULL,
            occurred_at TEXT NOT NULL,
            category TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transfers_origin ON transfer_transactions(origin_account_id, id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transfers_destination ON transfer_transactions(destination_account_id, id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transfers_occurred_at ON transfer_transactions(occurred_at)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// ROW DECODING
// ============================================================================

fn parse_decimal(idx: usize, raw: &str) -> rusqlite::Result<Decimal> {
    Decimal::from_str(raw.trim())
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    parse_decimal(idx, &raw)
}

fn optional_decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_decimal(idx, &s)).transpose()
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn category_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<TransferCategory> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        // Rows written before categories existed read back as background traffic
        None => Ok(TransferCategory::Mock),
        Some(s) => s.parse().map_err(|e: anyhow::Error| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into())
        }),
    }
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        balance: optional_decimal_column(row, 2)?,
    })
}

fn transfer_from_row(row: &Row<'_>) -> rusqlite::Result<TransferTransaction> {
    Ok(TransferTransaction {
        id: row.get(0)?,
        origin_account_id: row.get(1)?,
        destination_account_id: row.get(2)?,
        amount: decimal_column(row, 3)?,
        occurred_at: timestamp_column(row, 4)?,
        category: category_column(row, 5)?,
    })
}

const TRANSFER_COLUMNS: &str =
    "id, origin_account_id, destination_account_id, amount, occurred_at, category";

// ============================================================================
// ACCOUNT QUERIES
// ============================================================================

pub fn get_all_accounts(conn: &Connection) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare("SELECT id, name, balance FROM accounts ORDER BY id")?;

    let accounts = stmt
        .query_map([], account_from_row)?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to read accounts")?;

    Ok(accounts)
}

pub fn count_accounts(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))?;
    Ok(count)
}

/// Case-insensitive lookup; when names collide the oldest account wins
pub fn find_account_by_name(conn: &Connection, name: &str) -> Result<Option<Account>> {
    let account = conn
        .query_row(
            "SELECT id, name, balance FROM accounts
             WHERE LOWER(name) = LOWER(?1)
             ORDER BY id
             LIMIT 1",
            [name],
            account_from_row,
        )
        .optional()
        .with_context(|| format!("Failed to look up account {}", name))?;

    Ok(account)
}

pub fn find_account_by_id(conn: &Connection, id: i64) -> Result<Option<Account>> {
    let account = conn
        .query_row(
            "SELECT id, name, balance FROM accounts WHERE id = ?1",
            [id],
            account_from_row,
        )
        .optional()
        .with_context(|| format!("Failed to look up account {}", id))?;

    Ok(account)
}

pub fn find_accounts_by_ids(conn: &Connection, ids: &HashSet<i64>) -> Result<Vec<Account>> {
    let mut accounts = Vec::with_capacity(ids.len());
    let mut stmt = conn.prepare_cached("SELECT id, name, balance FROM accounts WHERE id = ?1")?;

    for id in ids {
        if let Some(account) = stmt.query_row([id], account_from_row).optional()? {
            accounts.push(account);
        }
    }

    accounts.sort_by_key(|a| a.id);
    Ok(accounts)
}

pub fn insert_account(conn: &Connection, name: &str, balance: Option<Decimal>) -> Result<Account> {
    conn.execute(
        "INSERT INTO accounts (name, balance) VALUES (?1, ?2)",
        params![name, balance.map(|b| b.to_string())],
    )
    .with_context(|| format!("Failed to insert account {}", name))?;

    Ok(Account {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        balance,
    })
}

pub fn insert_accounts(conn: &Connection, accounts: &[(String, Option<Decimal>)]) -> Result<usize> {
    let mut inserted = 0;
    for (name, balance) in accounts {
        insert_account(conn, name, *balance)?;
        inserted += 1;
    }
    Ok(inserted)
}

pub fn update_balance(conn: &Connection, account_id: i64, balance: Option<Decimal>) -> Result<()> {
    let changed = conn.execute(
        "UPDATE accounts SET balance = ?1 WHERE id = ?2",
        params![balance.map(|b| b.to_string()), account_id],
    )?;

    if changed == 0 {
        anyhow::bail!("Account {} not found", account_id);
    }

    Ok(())
}

pub fn delete_account(conn: &Connection, account_id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM accounts WHERE id = ?1", [account_id])?;
    Ok(changed > 0)
}

/// Load `Name,Balance` rows; an empty balance cell is stored as null
pub fn load_accounts_csv(csv_path: &Path) -> Result<Vec<(String, Option<Decimal>)>> {
    let mut rdr = csv::Reader::from_path(csv_path).context("Failed to open CSV file")?;

    let mut accounts = Vec::new();
    for (line, result) in rdr.deserialize().enumerate() {
        let record: AccountRecord = result.context("Failed to deserialize account")?;

        let balance = match record.balance.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                Decimal::from_str(raw)
                    .with_context(|| format!("Invalid balance on CSV row {}: {}", line + 2, raw))?,
            ),
        };

        accounts.push((record.name.trim().to_string(), balance));
    }

    Ok(accounts)
}

// ============================================================================
// TRANSFER QUERIES
// ============================================================================

pub fn insert_transfer(conn: &Connection, transfer: &NewTransfer) -> Result<TransferTransaction> {
    conn.execute(
        "INSERT INTO transfer_transactions (
            origin_account_id, destination_account_id, amount, occurred_at, category
        ) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            transfer.origin_account_id,
            transfer.destination_account_id,
            transfer.amount.to_string(),
            // Fixed width so lexical order is chronological order
            transfer.occurred_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            transfer.category.as_str(),
        ],
    )
    .context("Failed to insert transfer")?;

    Ok(TransferTransaction {
        id: conn.last_insert_rowid(),
        origin_account_id: transfer.origin_account_id,
        destination_account_id: transfer.destination_account_id,
        amount: transfer.amount,
        occurred_at: transfer.occurred_at,
        category: transfer.category,
    })
}

/// Highest transfer id in the store, 0 when empty
pub fn find_max_transfer_id(conn: &Connection) -> Result<i64> {
    let max: i64 = conn.query_row(
        "SELECT COALESCE(MAX(id), 0) FROM transfer_transactions",
        [],
        |row| row.get(0),
    )?;
    Ok(max)
}

fn sum_amounts(conn: &Connection, sql: &str, account_id: i64, after_id: i64) -> Result<Decimal> {
    let mut stmt = conn.prepare_cached(sql)?;
    let mut rows = stmt.query(params![account_id, after_id])?;

    let mut total = Decimal::ZERO;
    while let Some(row) = rows.next()? {
        let amount = decimal_column(row, 0)?;
        total = total
            .checked_add(amount)
            .ok_or_else(|| anyhow::anyhow!("decimal overflow summing transfers: {} + {}", total, amount))?;
    }

    Ok(total)
}

/// Sum of amounts leaving `account_id` in transfers with id > `after_id`
pub fn sum_outgoing_since(conn: &Connection, account_id: i64, after_id: i64) -> Result<Decimal> {
    sum_amounts(
        conn,
        "SELECT amount FROM transfer_transactions WHERE origin_account_id = ?1 AND id > ?2",
        account_id,
        after_id,
    )
    .with_context(|| format!("Failed to sum outgoing transfers for account {}", account_id))
}

/// Sum of amounts entering `account_id` in transfers with id > `after_id`
pub fn sum_incoming_since(conn: &Connection, account_id: i64, after_id: i64) -> Result<Decimal> {
    sum_amounts(
        conn,
        "SELECT amount FROM transfer_transactions WHERE destination_account_id = ?1 AND id > ?2",
        account_id,
        after_id,
    )
    .with_context(|| format!("Failed to sum incoming transfers for account {}", account_id))
}

pub fn count_self_transfers(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM transfer_transactions WHERE origin_account_id = destination_account_id",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Amounts are compared as decimals in Rust, not through SQLite's REAL affinity
pub fn count_non_positive_transfers(conn: &Connection) -> Result<i64> {
    let mut stmt = conn.prepare("SELECT amount FROM transfer_transactions")?;
    let mut rows = stmt.query([])?;

    let mut count = 0;
    while let Some(row) = rows.next()? {
        if decimal_column(row, 0)? <= Decimal::ZERO {
            count += 1;
        }
    }

    Ok(count)
}

pub fn count_transfers_with_missing_accounts(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*)
         FROM transfer_transactions t
         LEFT JOIN accounts o ON o.id = t.origin_account_id
         LEFT JOIN accounts d ON d.id = t.destination_account_id
         WHERE o.id IS NULL OR d.id IS NULL",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Most recent `limit` transfers, newest first, optionally limited to one category
pub fn recent_transfers(
    conn: &Connection,
    category: Option<TransferCategory>,
    limit: usize,
) -> Result<Vec<TransferTransaction>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let transfers = match category {
        Some(category) => {
            // Null categories count as MOCK, matching category_column
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM transfer_transactions
                 WHERE COALESCE(category, 'MOCK') = ?1
                 ORDER BY occurred_at DESC, id DESC
                 LIMIT ?2",
                TRANSFER_COLUMNS
            ))?;
            let rows = stmt.query_map(params![category.as_str(), limit], transfer_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM transfer_transactions
                 ORDER BY occurred_at DESC, id DESC
                 LIMIT ?1",
                TRANSFER_COLUMNS
            ))?;
            let rows = stmt.query_map([limit], transfer_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok(transfers)
}

/// Attach account names; accounts that no longer exist show as "Unknown"
pub fn describe_transfers(
    conn: &Connection,
    transfers: Vec<TransferTransaction>,
) -> Result<Vec<TransferSummary>> {
    if transfers.is_empty() {
        return Ok(Vec::new());
    }

    let ids: HashSet<i64> = transfers
        .iter()
        .flat_map(|t| [t.origin_account_id, t.destination_account_id])
        .collect();

    let names: HashMap<i64, String> = find_accounts_by_ids(conn, &ids)?
        .into_iter()
        .map(|a| (a.id, a.name))
        .collect();

    let name_of = |id: i64| names.get(&id).cloned().unwrap_or_else(|| "Unknown".to_string());

    Ok(transfers
        .into_iter()
        .map(|t| TransferSummary {
            id: t.id,
            origin_account_id: t.origin_account_id,
            origin_account_name: name_of(t.origin_account_id),
            destination_account_id: t.destination_account_id,
            destination_account_name: name_of(t.destination_account_id),
            amount: t.amount,
            occurred_at: t.occurred_at,
            category: t.category,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    fn ledger() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_account_round_trip_with_null_balance() {
        let conn = ledger();

        let joao = insert_account(&conn, "Joao", Some(dec!(100.50))).unwrap();
        let ghost = insert_account(&conn, "Ghost", None).unwrap();

        let accounts = get_all_accounts(&conn).unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0], joao);
        assert_eq!(accounts[1].balance, None);
        assert_eq!(find_account_by_id(&conn, ghost.id).unwrap().unwrap().name, "Ghost");
        assert_eq!(count_accounts(&conn).unwrap(), 2);
    }

    #[test]
    fn test_find_account_by_name_ignores_case() {
        let conn = ledger();
        let maria = insert_account(&conn, "Maria", Some(dec!(10))).unwrap();

        let found = find_account_by_name(&conn, "MARIA").unwrap().unwrap();
        assert_eq!(found.id, maria.id);
        assert!(find_account_by_name(&conn, "Pedro").unwrap().is_none());
    }

    #[test]
    fn test_sums_only_count_transfers_after_cursor() {
        let conn = ledger();
        let a = insert_account(&conn, "A", Some(dec!(100))).unwrap();
        let b = insert_account(&conn, "B", Some(dec!(200))).unwrap();

        let first = insert_transfer(&conn, &NewTransfer::new(a.id, b.id, dec!(10.25))).unwrap();
        insert_transfer(&conn, &NewTransfer::new(a.id, b.id, dec!(0.10))).unwrap();
        insert_transfer(&conn, &NewTransfer::new(b.id, a.id, dec!(0.20))).unwrap();

        assert_eq!(sum_outgoing_since(&conn, a.id, 0).unwrap(), dec!(10.35));
        assert_eq!(sum_outgoing_since(&conn, a.id, first.id).unwrap(), dec!(0.10));
        assert_eq!(sum_incoming_since(&conn, a.id, first.id).unwrap(), dec!(0.20));
        assert_eq!(sum_incoming_since(&conn, b.id, 100).unwrap(), Decimal::ZERO);
        assert_eq!(find_max_transfer_id(&conn).unwrap(), first.id + 2);
    }

    #[test]
    fn test_sum_overflow_is_an_error() {
        let conn = ledger();
        let a = insert_account(&conn, "A", Some(dec!(0))).unwrap();
        let b = insert_account(&conn, "B", Some(dec!(0))).unwrap();
        insert_transfer(&conn, &NewTransfer::new(a.id, b.id, Decimal::MAX)).unwrap();
        insert_transfer(&conn, &NewTransfer::new(a.id, b.id, Decimal::MAX)).unwrap();

        let err = sum_outgoing_since(&conn, a.id, 0).unwrap_err();
        assert!(format!("{:#}", err).contains("decimal overflow"));
        assert_eq!(sum_outgoing_since(&conn, a.id, 1).unwrap(), Decimal::MAX);
    }

    #[test]
    fn test_max_transfer_id_is_zero_when_empty() {
        let conn = ledger();
        assert_eq!(find_max_transfer_id(&conn).unwrap(), 0);
    }

    #[test]
    fn test_structural_counts() {
        let conn = ledger();
        let a = insert_account(&conn, "A", Some(dec!(100))).unwrap();
        let b = insert_account(&conn, "B", Some(dec!(100))).unwrap();

        insert_transfer(&conn, &NewTransfer::new(a.id, a.id, dec!(5))).unwrap();
        insert_transfer(&conn, &NewTransfer::new(a.id, b.id, dec!(0))).unwrap();
        insert_transfer(&conn, &NewTransfer::new(a.id, b.id, dec!(-0.01))).unwrap();
        insert_transfer(&conn, &NewTransfer::new(a.id, 999, dec!(1))).unwrap();

        assert_eq!(count_self_transfers(&conn).unwrap(), 1);
        assert_eq!(count_non_positive_transfers(&conn).unwrap(), 2);
        assert_eq!(count_transfers_with_missing_accounts(&conn).unwrap(), 1);

        delete_account(&conn, b.id).unwrap();
        assert_eq!(count_transfers_with_missing_accounts(&conn).unwrap(), 3);
    }

    #[test]
    fn test_recent_transfers_filters_by_category_and_names_accounts() {
        let conn = ledger();
        let a = insert_account(&conn, "Joao", Some(dec!(100))).unwrap();
        let b = insert_account(&conn, "Maria", Some(dec!(100))).unwrap();

        insert_transfer(&conn, &NewTransfer::new(a.id, b.id, dec!(1))).unwrap();
        let rebalance = insert_transfer(
            &conn,
            &NewTransfer::new(b.id, a.id, dec!(2)).with_category(TransferCategory::Rebalance),
        )
        .unwrap();
        let latest = insert_transfer(&conn, &NewTransfer::new(a.id, 42, dec!(3))).unwrap();

        let mock = recent_transfers(&conn, Some(TransferCategory::Mock), 50).unwrap();
        assert_eq!(mock.len(), 2);
        assert!(mock.iter().all(|t| t.category == TransferCategory::Mock));

        let all = recent_transfers(&conn, None, 2).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, latest.id);
        assert_eq!(all[1].id, rebalance.id);

        let summaries = describe_transfers(&conn, all).unwrap();
        assert_eq!(summaries[0].origin_account_name, "Joao");
        assert_eq!(summaries[0].destination_account_name, "Unknown");
        assert_eq!(summaries[1].origin_account_name, "Maria");
    }

    #[test]
    fn test_null_category_reads_back_as_mock() {
        let conn = ledger();
        conn.execute(
            "INSERT INTO transfer_transactions (origin_account_id, destination_account_id, amount, occurred_at, category)
             VALUES (1, 2, '5', ?1, NULL)",
            [Utc::now().to_rfc3339()],
        )
        .unwrap();

        let transfers = recent_transfers(&conn, Some(TransferCategory::Mock), 10).unwrap();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].category, TransferCategory::Mock);
    }

    #[test]
    fn test_update_balance_on_missing_account_fails() {
        let conn = ledger();
        assert!(update_balance(&conn, 7, Some(dec!(1))).is_err());
    }

    #[test]
    fn test_load_accounts_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Name,Balance").unwrap();
        writeln!(file, "Joao,100.00").unwrap();
        writeln!(file, "Maria,").unwrap();
        file.flush().unwrap();

        let accounts = load_accounts_csv(file.path()).unwrap();
        assert_eq!(accounts, vec![
            ("Joao".to_string(), Some(dec!(100.00))),
            ("Maria".to_string(), None),
        ]);

        let conn = ledger();
        assert_eq!(insert_accounts(&conn, &accounts).unwrap(), 2);
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("rebalance".parse::<TransferCategory>().unwrap(), TransferCategory::Rebalance);
        assert!("refund".parse::<TransferCategory>().is_err());
    }
}

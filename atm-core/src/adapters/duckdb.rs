//! DuckDB repository implementation

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::{params, Connection};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, LedgerEntry, PublicId};
use crate::ports::{BalanceMismatch, Repository, UnitOfWork};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Timestamp format written to TIMESTAMP columns (microsecond precision)
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

const ACCOUNT_COLUMNS: &str = "account_id, username, credential, balance::VARCHAR, public_id,
                               created_at::VARCHAR, updated_at::VARCHAR";

const ENTRY_COLUMNS: &str = "entry_id, account_id, amount::VARCHAR, description,
                             counterparty_public_id, transfer_id, created_at::VARCHAR";

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("could not set lock on file")
}

/// DuckDB repository implementation
///
/// A single connection sits behind a mutex, so units of work opened through
/// [`Repository::atomically`] are serialized for every caller sharing this
/// repository.
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbRepository {
    /// Open (or create) the database file at `db_path`
    ///
    /// Retries with exponential backoff when the file is locked by another
    /// process.
    pub fn new(db_path: &Path) -> anyhow::Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        eprintln!(
                            "[atm] Database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("Failed to open database after {} retries", MAX_RETRIES)))
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_in_memory_with_flags(config)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    /// Attempt to open a database connection (called by new() with retry logic)
    fn try_open_connection(db_path: &Path) -> anyhow::Result<Connection> {
        // Extension autoloading stays off: nothing here needs extensions and
        // cached ones under ~/.duckdb may fail code signing on macOS
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    /// Run database migrations using the MigrationService
    pub fn run_migrations(&self) -> anyhow::Result<MigrationResult> {
        let conn = self.lock()?;
        MigrationService::new(&conn).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> anyhow::Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    /// Path of the database file, `None` for in-memory databases
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }
}

impl Repository for DuckDbRepository {
    fn atomically(&self, work: &mut dyn FnMut(&dyn UnitOfWork) -> Result<()>) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        // An early return drops `tx`, which rolls back everything the work did
        work(&DuckDbUnitOfWork { conn: &tx })?;

        tx.commit()?;
        Ok(())
    }

    fn get_account_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        let conn = self.lock()?;
        find_account_where(&conn, "account_id", &id.to_string())
    }

    fn get_account_by_username(&self, username: &str) -> Result<Option<Account>> {
        let conn = self.lock()?;
        find_account_where(&conn, "username", username)
    }

    fn count_accounts(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count = conn.query_row("SELECT COUNT(*) FROM sys_accounts", [], |row| row.get(0))?;
        Ok(count)
    }

    fn total_holdings(&self) -> Result<Decimal> {
        let conn = self.lock()?;
        let total: String = conn.query_row(
            "SELECT COALESCE(SUM(balance), 0)::VARCHAR FROM sys_accounts",
            [],
            |row| row.get(0),
        )?;
        parse_decimal(&total)
    }

    fn get_entries_by_account(&self, account_id: Uuid) -> Result<Vec<LedgerEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_ledger_entries WHERE account_id = ? ORDER BY entry_seq",
            ENTRY_COLUMNS
        ))?;

        let rows = stmt.query_map([account_id.to_string()], read_entry_row)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.into_entry()?);
        }
        Ok(entries)
    }

    fn count_entries(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count =
            conn.query_row("SELECT COUNT(*) FROM sys_ledger_entries", [], |row| row.get(0))?;
        Ok(count)
    }

    fn count_entries_for_account(&self, account_id: Uuid) -> Result<i64> {
        let conn = self.lock()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM sys_ledger_entries WHERE account_id = ?",
            [account_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn count_transfers(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count = conn.query_row(
            "SELECT COUNT(DISTINCT transfer_id) FROM sys_ledger_entries WHERE transfer_id IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn check_ledger_mismatches(&self) -> Result<Vec<BalanceMismatch>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT a.account_id, a.balance::VARCHAR, COALESCE(SUM(e.amount), 0)::VARCHAR
             FROM sys_accounts a
             LEFT JOIN sys_ledger_entries e ON e.account_id = a.account_id
             GROUP BY a.account_id, a.balance
             HAVING a.balance <> COALESCE(SUM(e.amount), 0)",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut mismatches = Vec::new();
        for row in rows {
            let (id, balance, total) = row?;
            mismatches.push(BalanceMismatch {
                account_id: parse_uuid(&id)?,
                balance: parse_decimal(&balance)?,
                ledger_total: parse_decimal(&total)?,
            });
        }
        Ok(mismatches)
    }

    fn check_orphaned_entries(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT e.entry_id || ':' || e.account_id
             FROM sys_ledger_entries e
             LEFT JOIN sys_accounts a ON a.account_id = e.account_id
             WHERE a.account_id IS NULL",
        )?;
        let orphans = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(orphans)
    }

    fn check_unbalanced_transfers(&self) -> Result<Vec<Uuid>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT transfer_id
             FROM sys_ledger_entries
             WHERE transfer_id IS NOT NULL
             GROUP BY transfer_id
             HAVING COUNT(*) <> 2 OR SUM(amount) <> 0",
        )?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        ids.iter().map(|s| parse_uuid(s)).collect()
    }

    fn check_negative_balances(&self) -> Result<Vec<Uuid>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT account_id FROM sys_accounts WHERE balance < 0")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        ids.iter().map(|s| parse_uuid(s)).collect()
    }

    fn count_accounts_without_entries(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM sys_accounts a
             WHERE NOT EXISTS (
                 SELECT 1 FROM sys_ledger_entries e WHERE e.account_id = a.account_id
             )",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// Unit of work bound to an open DuckDB transaction
struct DuckDbUnitOfWork<'a> {
    conn: &'a Connection,
}

impl UnitOfWork for DuckDbUnitOfWork<'_> {
    fn find_account(&self, id: Uuid) -> Result<Option<Account>> {
        find_account_where(self.conn, "account_id", &id.to_string())
    }

    fn find_account_by_username(&self, username: &str) -> Result<Option<Account>> {
        find_account_where(self.conn, "username", username)
    }

    fn find_account_by_public_id(&self, public_id: &PublicId) -> Result<Option<Account>> {
        find_account_where(self.conn, "public_id", public_id.as_str())
    }

    fn insert_account(&self, account: &Account) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sys_accounts (account_id, username, credential, balance, public_id,
                                       created_at, updated_at)
             VALUES (?, ?, ?, CAST(? AS DECIMAL(18, 2)), ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP))",
            params![
                account.id.to_string(),
                account.username,
                account.credential,
                account.balance.to_string(),
                account.public_id.as_str(),
                format_timestamp(&account.created_at),
                format_timestamp(&account.updated_at),
            ],
        )?;
        Ok(())
    }

    fn adjust_balance(&self, account_id: Uuid, delta: Decimal) -> Result<bool> {
        let delta = delta.to_string();
        let changed = self.conn.execute(
            "UPDATE sys_accounts
             SET balance = balance + CAST(? AS DECIMAL(18, 2)),
                 updated_at = CAST(? AS TIMESTAMP)
             WHERE account_id = ?
               AND balance + CAST(? AS DECIMAL(18, 2)) BETWEEN 0 AND 9999999999999999.99",
            params![
                delta,
                format_timestamp(&Utc::now()),
                account_id.to_string(),
                delta,
            ],
        )?;
        Ok(changed == 1)
    }

    fn append_entry(&self, entry: &LedgerEntry) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sys_ledger_entries (entry_id, account_id, amount, description,
                                             counterparty_public_id, transfer_id, created_at)
             VALUES (?, ?, CAST(? AS DECIMAL(18, 2)), ?, ?, ?, CAST(? AS TIMESTAMP))",
            params![
                entry.id.to_string(),
                entry.account_id.to_string(),
                entry.amount.to_string(),
                entry.description,
                entry.counterparty.as_ref().map(|c| c.as_str().to_string()),
                entry.transfer_id.map(|id| id.to_string()),
                format_timestamp(&entry.created_at),
            ],
        )?;
        Ok(())
    }
}

// Row mapping

/// Raw account columns, in ACCOUNT_COLUMNS order
struct AccountRow {
    id: String,
    username: String,
    credential: String,
    balance: String,
    public_id: String,
    created_at: String,
    updated_at: String,
}

impl AccountRow {
    fn into_account(self) -> Result<Account> {
        Ok(Account {
            id: parse_uuid(&self.id)?,
            username: self.username,
            credential: self.credential,
            balance: parse_decimal(&self.balance)?,
            public_id: PublicId::parse(&self.public_id).map_err(Error::database)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn read_account_row(row: &duckdb::Row<'_>) -> duckdb::Result<AccountRow> {
    Ok(AccountRow {
        id: row.get(0)?,
        username: row.get(1)?,
        credential: row.get(2)?,
        balance: row.get(3)?,
        public_id: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Raw ledger entry columns, in ENTRY_COLUMNS order
struct EntryRow {
    id: String,
    account_id: String,
    amount: String,
    description: String,
    counterparty: Option<String>,
    transfer_id: Option<String>,
    created_at: String,
}

impl EntryRow {
    fn into_entry(self) -> Result<LedgerEntry> {
        let counterparty = match self.counterparty {
            Some(c) => Some(PublicId::parse(&c).map_err(Error::database)?),
            None => None,
        };
        let transfer_id = match self.transfer_id {
            Some(t) => Some(parse_uuid(&t)?),
            None => None,
        };

        Ok(LedgerEntry {
            id: parse_uuid(&self.id)?,
            account_id: parse_uuid(&self.account_id)?,
            amount: parse_decimal(&self.amount)?,
            description: self.description,
            counterparty,
            transfer_id,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

fn read_entry_row(row: &duckdb::Row<'_>) -> duckdb::Result<EntryRow> {
    Ok(EntryRow {
        id: row.get(0)?,
        account_id: row.get(1)?,
        amount: row.get(2)?,
        description: row.get(3)?,
        counterparty: row.get(4)?,
        transfer_id: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Look up a single account by one of its unique columns
fn find_account_where(conn: &Connection, column: &str, value: &str) -> Result<Option<Account>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM sys_accounts WHERE {} = ?",
        ACCOUNT_COLUMNS, column
    ))?;
    let mut rows = stmt.query_map([value], read_account_row)?;

    match rows.next() {
        Some(row) => Ok(Some(row?.into_account()?)),
        None => Ok(None),
    }
}

// Helper functions

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .map(|dt| dt.and_utc())
        .map_err(|e| Error::database(format!("Invalid timestamp '{}': {}", s, e)))
}

/// Money columns are read back as VARCHAR to keep full precision
fn parse_decimal(s: &str) -> Result<Decimal> {
    Decimal::from_str_exact(s.trim())
        .map_err(|e| Error::database(format!("Invalid decimal '{}': {}", s, e)))
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::database(format!("Invalid id '{}': {}", s, e)))
}

//! Repository port - store abstraction

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, LedgerEntry, PublicId};

/// Reads and writes available inside one atomic unit of work
///
/// Every mutation made through a unit of work is committed together when the
/// work returns `Ok`, and rolled back when it returns `Err`.
pub trait UnitOfWork {
    fn find_account(&self, id: Uuid) -> Result<Option<Account>>;

    fn find_account_by_username(&self, username: &str) -> Result<Option<Account>>;

    fn find_account_by_public_id(&self, public_id: &PublicId) -> Result<Option<Account>>;

    fn insert_account(&self, account: &Account) -> Result<()>;

    /// Add `delta` to an account's balance.
    ///
    /// Returns `false` and changes nothing if the new balance would be
    /// negative or above the ceiling.
    fn adjust_balance(&self, account_id: Uuid, delta: Decimal) -> Result<bool>;

    fn append_entry(&self, entry: &LedgerEntry) -> Result<()>;
}

/// Account and ledger store
pub trait Repository: Send + Sync {
    // === Units of work ===

    /// Run `work` inside a single store transaction.
    ///
    /// Units of work on the same repository never interleave.
    fn atomically(&self, work: &mut dyn FnMut(&dyn UnitOfWork) -> Result<()>) -> Result<()>;

    // === Accounts ===

    fn get_account_by_id(&self, id: Uuid) -> Result<Option<Account>>;

    fn get_account_by_username(&self, username: &str) -> Result<Option<Account>>;

    fn count_accounts(&self) -> Result<i64>;

    /// Sum of all account balances
    fn total_holdings(&self) -> Result<Decimal>;

    // === Ledger ===

    /// Entries for one account in insertion order
    fn get_entries_by_account(&self, account_id: Uuid) -> Result<Vec<LedgerEntry>>;

    fn count_entries(&self) -> Result<i64>;

    fn count_entries_for_account(&self, account_id: Uuid) -> Result<i64>;

    fn count_transfers(&self) -> Result<i64>;

    // === Integrity checks ===

    /// Accounts whose balance differs from the sum of their entries
    fn check_ledger_mismatches(&self) -> Result<Vec<BalanceMismatch>>;

    /// "entry_id:account_id" for entries pointing at missing accounts
    fn check_orphaned_entries(&self) -> Result<Vec<String>>;

    /// Transfer ids that are not exactly two entries summing to zero
    fn check_unbalanced_transfers(&self) -> Result<Vec<Uuid>>;

    fn check_negative_balances(&self) -> Result<Vec<Uuid>>;

    fn count_accounts_without_entries(&self) -> Result<i64>;
}

/// An account whose stored balance disagrees with its ledger
#[derive(Debug, Clone, Serialize)]
pub struct BalanceMismatch {
    pub account_id: Uuid,
    pub balance: Decimal,
    pub ledger_total: Decimal,
}

/// Run a unit of work that produces a value.
///
/// Wraps [`Repository::atomically`] so callers can return data from inside
/// the transaction.
pub fn run_atomically<T, F>(repository: &dyn Repository, work: F) -> Result<T>
where
    F: FnOnce(&dyn UnitOfWork) -> Result<T>,
{
    let mut work = Some(work);
    let mut output = None;

    repository.atomically(&mut |uow| {
        let work = work
            .take()
            .ok_or_else(|| Error::Other("unit of work invoked twice".to_string()))?;
        output = Some(work(uow)?);
        Ok(())
    })?;

    output.ok_or_else(|| Error::Other("unit of work produced no result".to_string()))
}

//! Status service - store-wide summaries

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::result::Result;
use crate::ports::Repository;

/// Status service for store summaries
pub struct StatusService {
    repository: Arc<dyn Repository>,
}

impl StatusService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Get overall status summary
    pub fn get_status(&self) -> Result<StatusSummary> {
        Ok(StatusSummary {
            total_accounts: self.repository.count_accounts()?,
            total_entries: self.repository.count_entries()?,
            total_transfers: self.repository.count_transfers()?,
            total_holdings: self.repository.total_holdings()?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub total_accounts: i64,
    pub total_entries: i64,
    pub total_transfers: i64,
    /// Sum of all balances
    pub total_holdings: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::duckdb::DuckDbRepository;
    use crate::domain::Argon2Params;
    use crate::services::{AccountService, LedgerService};

    #[test]
    fn test_status_counts() {
        let repo = DuckDbRepository::open_in_memory().unwrap();
        repo.ensure_schema().unwrap();
        let repo: Arc<dyn Repository> = Arc::new(repo);

        let accounts = AccountService::new(Arc::clone(&repo), Argon2Params::minimal());
        let ledger = LedgerService::new(Arc::clone(&repo));
        let status = StatusService::new(repo);

        let empty = status.get_status().unwrap();
        assert_eq!(empty.total_accounts, 0);
        assert_eq!(empty.total_holdings, Decimal::ZERO);

        let a = accounts.register("alice", "pw").unwrap();
        let b = accounts.register("bob", "pw").unwrap();
        ledger.deposit(&a, Decimal::new(100, 0)).unwrap();
        ledger.transfer(&a, b.public_id.as_str(), Decimal::new(25, 0)).unwrap();

        let summary = status.get_status().unwrap();
        assert_eq!(summary.total_accounts, 2);
        assert_eq!(summary.total_entries, 3);
        assert_eq!(summary.total_transfers, 1);
        // Transfers move money, they don't create it
        assert_eq!(summary.total_holdings, Decimal::new(100, 0));
    }
}

//! Doctor service - ledger integrity checks

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use crate::domain::result::Result;
use crate::ports::Repository;

/// Doctor service for health checks
pub struct DoctorService {
    repository: Arc<dyn Repository>,
}

impl DoctorService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Run all health checks
    pub fn run_checks(&self) -> Result<DoctorResult> {
        let mut checks = HashMap::new();

        // Stored balance equals the sum of the account's entries
        let mismatches = self.repository.check_ledger_mismatches()?;
        let mismatch_details: Vec<serde_json::Value> = mismatches
            .iter()
            .map(|m| {
                json!({
                    "account_id": m.account_id,
                    "balance": m.balance,
                    "ledger_total": m.ledger_total
                })
            })
            .collect();
        checks.insert(
            "ledger_balance".to_string(),
            CheckResult::from_findings(
                mismatch_details,
                "Every balance matches its ledger".to_string(),
                |n| format!("{} account(s) disagree with their ledger", n),
            ),
        );

        // Entries pointing at accounts that no longer exist
        let orphaned = self.repository.check_orphaned_entries()?;
        let orphan_details: Vec<serde_json::Value> = orphaned
            .iter()
            .map(|s| match s.split_once(':') {
                Some((entry_id, account_id)) => json!({
                    "entry_id": entry_id,
                    "account_id": account_id
                }),
                None => json!({ "entry_id": s }),
            })
            .collect();
        checks.insert(
            "orphaned_entries".to_string(),
            CheckResult::from_findings(
                orphan_details,
                "No orphaned ledger entries found".to_string(),
                |n| format!("{} entry(s) reference missing accounts", n),
            ),
        );

        // Both legs of every transfer present and summing to zero
        let unbalanced = self.repository.check_unbalanced_transfers()?;
        let unbalanced_details: Vec<serde_json::Value> = unbalanced
            .iter()
            .map(|id| json!({ "transfer_id": id }))
            .collect();
        checks.insert(
            "unbalanced_transfers".to_string(),
            CheckResult::from_findings(
                unbalanced_details,
                "All transfers are balanced".to_string(),
                |n| format!("{} transfer(s) are missing a leg or do not net to zero", n),
            ),
        );

        let negative = self.repository.check_negative_balances()?;
        let negative_details: Vec<serde_json::Value> = negative
            .iter()
            .map(|id| json!({ "account_id": id }))
            .collect();
        checks.insert(
            "negative_balances".to_string(),
            CheckResult::from_findings(
                negative_details,
                "No negative balances".to_string(),
                |n| format!("{} account(s) have a negative balance", n),
            ),
        );

        // Informational: reported but never a failure
        let empty = self.repository.count_accounts_without_entries()?;
        let total = self.repository.count_accounts()?;
        checks.insert(
            "empty_accounts".to_string(),
            CheckResult {
                status: "pass".to_string(),
                message: if empty == 0 {
                    "Every account has activity".to_string()
                } else {
                    format!("{} of {} account(s) have never been used", empty, total)
                },
                details: if empty == 0 {
                    None
                } else {
                    Some(vec![json!({
                        "empty_count": empty,
                        "total_count": total
                    })])
                },
            },
        );

        let passed = checks.values().filter(|c| c.status == "pass").count() as i64;
        let warnings = checks.values().filter(|c| c.status == "warning").count() as i64;
        let errors = checks.values().filter(|c| c.status == "error").count() as i64;

        Ok(DoctorResult {
            checks,
            summary: DoctorSummary {
                passed,
                warnings,
                errors,
            },
        })
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorResult {
    pub checks: HashMap<String, CheckResult>,
    pub summary: DoctorSummary,
}

impl DoctorResult {
    pub fn is_healthy(&self) -> bool {
        self.summary.errors == 0
    }
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<serde_json::Value>>,
}

impl CheckResult {
    /// "pass" when nothing was found, "error" otherwise
    fn from_findings(
        details: Vec<serde_json::Value>,
        pass_message: String,
        fail_message: impl FnOnce(usize) -> String,
    ) -> Self {
        if details.is_empty() {
            Self {
                status: "pass".to_string(),
                message: pass_message,
                details: None,
            }
        } else {
            Self {
                status: "error".to_string(),
                message: fail_message(details.len()),
                details: Some(details),
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorSummary {
    pub passed: i64,
    pub warnings: i64,
    pub errors: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::duckdb::DuckDbRepository;
    use crate::domain::Argon2Params;
    use crate::services::{AccountService, LedgerService};
    use rust_decimal::Decimal;

    #[test]
    fn test_healthy_store_passes() {
        let repo = DuckDbRepository::open_in_memory().unwrap();
        repo.ensure_schema().unwrap();
        let repo: Arc<dyn Repository> = Arc::new(repo);

        let accounts = AccountService::new(Arc::clone(&repo), Argon2Params::minimal());
        let ledger = LedgerService::new(Arc::clone(&repo));
        let a = accounts.register("alice", "pw").unwrap();
        let b = accounts.register("bob", "pw").unwrap();
        ledger.deposit(&a, Decimal::new(100, 0)).unwrap();
        ledger.transfer(&a, b.public_id.as_str(), Decimal::new(40, 0)).unwrap();
        ledger.withdraw(&b, Decimal::new(15, 0)).unwrap();

        let result = DoctorService::new(repo).run_checks().unwrap();
        assert!(result.is_healthy());
        assert_eq!(result.summary.passed, 5);
        assert_eq!(result.checks["ledger_balance"].status, "pass");
    }

    #[test]
    fn test_unused_account_is_reported_but_passes() {
        let repo = DuckDbRepository::open_in_memory().unwrap();
        repo.ensure_schema().unwrap();
        let repo: Arc<dyn Repository> = Arc::new(repo);

        AccountService::new(Arc::clone(&repo), Argon2Params::minimal())
            .register("alice", "pw")
            .unwrap();

        let result = DoctorService::new(repo).run_checks().unwrap();
        assert!(result.is_healthy());
        assert_eq!(result.summary.warnings, 0);

        let empty = &result.checks["empty_accounts"];
        assert_eq!(empty.status, "pass");
        let details = empty.details.as_ref().unwrap();
        assert_eq!(details[0]["empty_count"], 1);
    }
}

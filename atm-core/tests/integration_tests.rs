//! Integration tests for atm-core
//!
//! These tests drive the services through `AtmContext` against real DuckDB
//! databases, on disk or in memory.
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use rust_decimal::Decimal;
use tempfile::TempDir;

use atm_core::config::Config;
use atm_core::ports::Repository;
use atm_core::{Account, Argon2Params, AtmContext, Error, OperationResult};

// ============================================================================
// Test Helpers
// ============================================================================

fn test_config() -> Config {
    Config {
        argon2: Argon2Params::minimal(),
        ..Config::default()
    }
}

/// Fresh in-memory context with cheap hashing
fn create_test_context() -> AtmContext {
    AtmContext::in_memory(test_config()).expect("Failed to create context")
}

/// On-disk context with cheap hashing
fn create_disk_context(temp_dir: &TempDir) -> AtmContext {
    test_config().save(temp_dir.path()).expect("Failed to write settings");
    AtmContext::new(temp_dir.path()).expect("Failed to open context")
}

fn dollars(n: i64) -> Decimal {
    Decimal::new(n, 0)
}

fn balance(ctx: &AtmContext, account: &Account) -> Decimal {
    ctx.account_service.get_account(account.id).unwrap().balance
}

/// Every account's balance equals the sum of its ledger entries
fn assert_ledger_consistent(ctx: &AtmContext, accounts: &[&Account]) {
    for account in accounts {
        let entries = ctx.ledger_service.list_entries(account).unwrap();
        let total: Decimal = entries.iter().map(|e| e.amount).sum();
        assert_eq!(
            balance(ctx, account),
            total,
            "balance of {} drifted from its ledger",
            account.username
        );
    }
    assert!(ctx.repository.check_ledger_mismatches().unwrap().is_empty());
}

// ============================================================================
// Account Store
// ============================================================================

#[test]
fn test_register_and_authenticate() {
    let ctx = create_test_context();

    let alice = ctx.account_service.register("alice", "s3cret").unwrap();
    assert_eq!(alice.balance, Decimal::ZERO);
    assert_eq!(alice.public_id.as_str().len(), 10);

    let authed = ctx.account_service.authenticate("alice", "s3cret").unwrap();
    assert_eq!(authed.id, alice.id);
    assert_eq!(authed.public_id, alice.public_id);
}

#[test]
fn test_duplicate_registration_fails() {
    let ctx = create_test_context();
    ctx.account_service.register("alice", "one").unwrap();

    let result = ctx.account_service.register("alice", "two");
    assert!(matches!(result, Err(Error::DuplicateUsername(_))));

    // The original credential still works
    assert!(ctx.account_service.authenticate("alice", "one").is_ok());
    assert_eq!(ctx.status_service.get_status().unwrap().total_accounts, 1);
}

#[test]
fn test_wrong_password_and_unknown_user_look_the_same() {
    let ctx = create_test_context();
    ctx.account_service.register("alice", "right").unwrap();

    let wrong_password = ctx.account_service.authenticate("alice", "wrong").unwrap_err();
    let unknown_user = ctx.account_service.authenticate("nobody", "right").unwrap_err();

    assert!(matches!(wrong_password, Error::InvalidCredentials));
    assert!(matches!(unknown_user, Error::InvalidCredentials));
    assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    assert_eq!(wrong_password.code(), unknown_user.code());
}

#[test]
fn test_credentials_hashed_with_configured_params_still_verify_after_change() {
    let temp_dir = TempDir::new().unwrap();
    {
        let ctx = create_disk_context(&temp_dir);
        ctx.account_service.register("alice", "pw").unwrap();
    }

    // Raise the cost; existing hashes carry their own parameters
    let mut config = Config::load(temp_dir.path()).unwrap();
    config.argon2.time_cost = 2;
    config.save(temp_dir.path()).unwrap();

    let ctx = AtmContext::new(temp_dir.path()).unwrap();
    assert!(ctx.account_service.authenticate("alice", "pw").is_ok());
}

// ============================================================================
// Ledger Operations
// ============================================================================

#[test]
fn test_withdraw_more_than_balance_is_rejected_without_mutation() {
    let ctx = create_test_context();
    let alice = ctx.account_service.register("alice", "pw").unwrap();
    ctx.ledger_service.deposit(&alice, dollars(30)).unwrap();

    let result = ctx.ledger_service.withdraw(&alice, dollars(31));
    assert!(matches!(result, Err(Error::InsufficientFunds { .. })));

    assert_eq!(balance(&ctx, &alice), dollars(30));
    assert_eq!(ctx.ledger_service.list_entries(&alice).unwrap().len(), 1);
}

#[test]
fn test_non_positive_deposit_is_rejected_without_mutation() {
    let ctx = create_test_context();
    let alice = ctx.account_service.register("alice", "pw").unwrap();

    for amount in [Decimal::ZERO, dollars(-1), Decimal::new(-1, 2)] {
        let result = ctx.ledger_service.deposit(&alice, amount);
        assert!(matches!(result, Err(Error::InvalidAmount(_))));
    }

    assert_eq!(balance(&ctx, &alice), Decimal::ZERO);
    assert!(ctx.ledger_service.list_entries(&alice).unwrap().is_empty());
}

#[test]
fn test_transfer_of_40_from_100() {
    let ctx = create_test_context();
    let a = ctx.account_service.register("alice", "pw").unwrap();
    let b = ctx.account_service.register("bob", "pw").unwrap();
    ctx.ledger_service.deposit(&a, dollars(100)).unwrap();

    let entries_before = ctx.status_service.get_status().unwrap().total_entries;
    ctx.ledger_service
        .transfer(&a, b.public_id.as_str(), dollars(40))
        .unwrap();

    assert_eq!(balance(&ctx, &a), dollars(60));
    assert_eq!(balance(&ctx, &b), dollars(40));

    let status = ctx.status_service.get_status().unwrap();
    assert_eq!(status.total_entries, entries_before + 2);

    let a_last = ctx.ledger_service.list_entries(&a).unwrap().pop().unwrap();
    let b_entries = ctx.ledger_service.list_entries(&b).unwrap();
    assert_eq!(b_entries.len(), 1);
    assert_eq!(a_last.amount, dollars(-40));
    assert_eq!(b_entries[0].amount, dollars(40));

    assert_ledger_consistent(&ctx, &[&a, &b]);
}

#[test]
fn test_transfer_to_unknown_identifier_changes_nothing() {
    let ctx = create_test_context();
    let a = ctx.account_service.register("alice", "pw").unwrap();
    let b = ctx.account_service.register("bob", "pw").unwrap();
    ctx.ledger_service.deposit(&a, dollars(100)).unwrap();

    let result = ctx.ledger_service.transfer(&a, "0000000000", dollars(10));
    assert!(matches!(result, Err(Error::RecipientNotFound(_))));

    assert_eq!(balance(&ctx, &a), dollars(100));
    assert_eq!(balance(&ctx, &b), Decimal::ZERO);
    assert_eq!(ctx.status_service.get_status().unwrap().total_transfers, 0);
}

#[test]
fn test_recipient_identifier_is_trimmed() {
    let ctx = create_test_context();
    let a = ctx.account_service.register("alice", "pw").unwrap();
    let b = ctx.account_service.register("bob", "pw").unwrap();
    ctx.ledger_service.deposit(&a, dollars(5)).unwrap();

    let padded = format!("  {} ", b.public_id);
    ctx.ledger_service.transfer(&a, &padded, dollars(5)).unwrap();
    assert_eq!(balance(&ctx, &b), dollars(5));
}

#[test]
fn test_fractional_amounts_keep_cents() {
    let ctx = create_test_context();
    let a = ctx.account_service.register("alice", "pw").unwrap();

    ctx.ledger_service.deposit(&a, Decimal::new(1005, 2)).unwrap();
    ctx.ledger_service.withdraw(&a, Decimal::new(333, 2)).unwrap();

    assert_eq!(balance(&ctx, &a), Decimal::new(672, 2));
    assert!(matches!(
        ctx.ledger_service.deposit(&a, Decimal::new(1, 3)),
        Err(Error::InvalidAmount(_))
    ));
}

#[test]
fn test_mixed_operations_keep_ledger_consistent_and_doctor_clean() {
    let ctx = create_test_context();
    let a = ctx.account_service.register("alice", "pw").unwrap();
    let b = ctx.account_service.register("bob", "pw").unwrap();
    let c = ctx.account_service.register("carol", "pw").unwrap();

    ctx.ledger_service.deposit(&a, dollars(500)).unwrap();
    ctx.ledger_service.deposit(&b, Decimal::new(7525, 2)).unwrap();
    ctx.ledger_service.transfer(&a, b.public_id.as_str(), dollars(120)).unwrap();
    ctx.ledger_service.transfer(&b, c.public_id.as_str(), Decimal::new(1999, 2)).unwrap();
    ctx.ledger_service.withdraw(&c, dollars(10)).unwrap();

    // Failures in between must not leave anything behind
    assert!(matches!(
        ctx.ledger_service.withdraw(&c, dollars(1000)),
        Err(Error::InsufficientFunds { .. })
    ));
    assert!(matches!(
        ctx.ledger_service.transfer(&c, a.public_id.as_str(), dollars(1000)),
        Err(Error::InsufficientFunds { .. })
    ));
    assert!(matches!(
        ctx.ledger_service.transfer(&a, a.public_id.as_str(), dollars(1)),
        Err(Error::Validation(_))
    ));

    assert_ledger_consistent(&ctx, &[&a, &b, &c]);

    let status = ctx.status_service.get_status().unwrap();
    assert_eq!(status.total_holdings, Decimal::new(56525, 2));
    assert_eq!(status.total_transfers, 2);

    let doctor = ctx.doctor_service.run_checks().unwrap();
    assert!(doctor.is_healthy(), "doctor found problems: {:?}", doctor.checks);
    assert_eq!(doctor.summary.errors, 0);
}

#[test]
fn test_stale_account_reference_is_unauthenticated() {
    let ctx = create_test_context();
    let mut alice = ctx.account_service.register("alice", "pw").unwrap();
    alice.id = uuid::Uuid::new_v4();

    let result = ctx.ledger_service.deposit(&alice, dollars(1));
    assert!(matches!(result, Err(Error::Unauthenticated)));
    assert_eq!(ctx.status_service.get_status().unwrap().total_entries, 0);
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_state_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let (alice_id, bob_public_id) = {
        let ctx = create_disk_context(&temp_dir);
        let a = ctx.account_service.register("alice", "pw").unwrap();
        let b = ctx.account_service.register("bob", "pw").unwrap();
        ctx.ledger_service.deposit(&a, dollars(80)).unwrap();
        ctx.ledger_service.transfer(&a, b.public_id.as_str(), dollars(30)).unwrap();
        (a.id, b.public_id)
    };

    assert!(temp_dir.path().join("atm.duckdb").exists());

    let ctx = AtmContext::new(temp_dir.path()).unwrap();
    let alice = ctx.account_service.authenticate("alice", "pw").unwrap();
    assert_eq!(alice.id, alice_id);
    assert_eq!(alice.balance, dollars(50));

    let bob = ctx.account_service.authenticate("bob", "pw").unwrap();
    assert_eq!(bob.public_id, bob_public_id);
    assert_eq!(bob.balance, dollars(30));

    let history = ctx.ledger_service.list_entries(&alice).unwrap();
    let descriptions: Vec<&str> = history.iter().map(|e| e.description.as_str()).collect();
    let transfer_description = format!("Transfer to {}", bob.public_id);
    assert_eq!(descriptions, vec!["Deposit", transfer_description.as_str()]);
}

#[test]
fn test_custom_database_filename() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config {
        database_filename: "bank.duckdb".to_string(),
        ..test_config()
    };
    config.save(temp_dir.path()).unwrap();

    let ctx = AtmContext::new(temp_dir.path()).unwrap();
    ctx.account_service.register("alice", "pw").unwrap();

    assert!(temp_dir.path().join("bank.duckdb").exists());
    assert!(!temp_dir.path().join("atm.duckdb").exists());
}

// ============================================================================
// Result Envelope
// ============================================================================

#[test]
fn test_operation_result_envelope() {
    let ctx = create_test_context();
    let alice = ctx.account_service.register("alice", "pw").unwrap();

    let failed: OperationResult<_> = ctx.ledger_service.withdraw(&alice, dollars(1)).into();
    let json = serde_json::to_value(&failed).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["error_code"], "insufficient_funds");
    assert!(json["data"].is_null());

    let ok: OperationResult<_> = ctx.ledger_service.deposit(&alice, dollars(1)).into();
    let json = serde_json::to_value(&ok).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["entry"]["description"], "Deposit");
    assert!(json.get("error_code").is_none());
}

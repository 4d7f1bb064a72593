//! Account service - registration and authentication
//!
//! Credentials are hashed with Argon2id and stored as PHC strings, so each
//! stored hash carries its own salt and cost parameters.

use std::sync::{Arc, OnceLock};

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Version};
use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, Argon2Params, PublicId};
use crate::ports::{run_atomically, Repository, UnitOfWork};

/// Attempts at drawing an unused public identifier before giving up
const MAX_PUBLIC_ID_ATTEMPTS: usize = 8;

/// Salt length in bytes
const SALT_LEN: usize = 16;

/// Account service for registration, authentication and the dashboard view
pub struct AccountService {
    repository: Arc<dyn Repository>,
    argon2_params: Argon2Params,
    /// Hash verified against when a username is unknown
    decoy_hash: OnceLock<String>,
}

impl AccountService {
    pub fn new(repository: Arc<dyn Repository>, argon2_params: Argon2Params) -> Self {
        Self {
            repository,
            argon2_params,
            decoy_hash: OnceLock::new(),
        }
    }

    /// Register a new account with a zero balance
    pub fn register(&self, username: &str, password: &str) -> Result<Account> {
        let username = Account::normalize_username(username).map_err(Error::validation)?;
        if password.is_empty() {
            return Err(Error::validation("password cannot be empty"));
        }

        // Cheap check before paying for the hash; repeated inside the unit of work
        if self.repository.get_account_by_username(&username)?.is_some() {
            return Err(Error::DuplicateUsername(username));
        }

        let credential = self.hash_password(password)?;

        run_atomically(self.repository.as_ref(), move |uow| {
            if uow.find_account_by_username(&username)?.is_some() {
                return Err(Error::DuplicateUsername(username));
            }
            let public_id = unused_public_id(uow)?;
            let account = Account::new(username, credential, public_id);
            uow.insert_account(&account)?;
            Ok(account)
        })
    }

    /// Check a username/password pair
    ///
    /// Unknown usernames and wrong passwords are indistinguishable to the
    /// caller, and both perform one hash verification.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Account> {
        let account = match Account::normalize_username(username) {
            Ok(name) => self.repository.get_account_by_username(&name)?,
            Err(_) => None,
        };

        match account {
            Some(account) if verify_password(password, &account.credential) => Ok(account),
            Some(_) => Err(Error::InvalidCredentials),
            None => {
                let decoy = self.decoy_hash()?;
                let _ = verify_password(password, decoy);
                Err(Error::InvalidCredentials)
            }
        }
    }

    /// Current state of an authenticated account
    pub fn get_account(&self, id: Uuid) -> Result<Account> {
        self.repository
            .get_account_by_id(id)?
            .ok_or(Error::Unauthenticated)
    }

    /// Dashboard view: who am I, what do I have, how do others pay me
    pub fn summary(&self, account: &Account) -> Result<AccountSummary> {
        let current = self.get_account(account.id)?;
        let entry_count = self.repository.count_entries_for_account(current.id)?;

        Ok(AccountSummary {
            username: current.username,
            balance: current.balance,
            public_id: current.public_id,
            entry_count,
        })
    }

    fn hash_password(&self, password: &str) -> Result<String> {
        let params = self
            .argon2_params
            .to_argon2()
            .map_err(|e| Error::Config(format!("Invalid argon2 parameters: {}", e)))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let salt_bytes: [u8; SALT_LEN] = rand::thread_rng().gen();
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| Error::Other(format!("Failed to encode salt: {}", e)))?;

        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::Other(format!("Failed to hash credential: {}", e)))?;
        Ok(hash.to_string())
    }

    fn decoy_hash(&self) -> Result<&str> {
        if let Some(hash) = self.decoy_hash.get() {
            return Ok(hash);
        }
        let hash = self.hash_password("decoy-credential")?;
        Ok(self.decoy_hash.get_or_init(|| hash))
    }
}

/// Verify a password against a stored PHC string
///
/// Uses the parameters recorded in the hash, not the current settings.
fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn unused_public_id(uow: &dyn UnitOfWork) -> Result<PublicId> {
    for _ in 0..MAX_PUBLIC_ID_ATTEMPTS {
        let candidate = PublicId::generate();
        if uow.find_account_by_public_id(&candidate)?.is_none() {
            return Ok(candidate);
        }
    }
    Err(Error::Other(
        "Could not allocate a unique public identifier".to_string(),
    ))
}

/// Dashboard summary of one account
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub username: String,
    pub balance: Decimal,
    pub public_id: PublicId,
    pub entry_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::duckdb::DuckDbRepository;

    fn service() -> AccountService {
        let repo = DuckDbRepository::open_in_memory().unwrap();
        repo.ensure_schema().unwrap();
        AccountService::new(Arc::new(repo), Argon2Params::minimal())
    }

    #[test]
    fn test_register_creates_empty_account() {
        let service = service();
        let account = service.register("  alice ", "hunter2").unwrap();

        assert_eq!(account.username, "alice");
        assert_eq!(account.balance, Decimal::ZERO);
        assert!(account.credential.starts_with("$argon2id$"));
        assert_ne!(account.credential, "hunter2");
    }

    #[test]
    fn test_register_rejects_duplicate_username() {
        let service = service();
        service.register("alice", "one").unwrap();

        let err = service.register("alice", "two").unwrap_err();
        assert!(matches!(err, Error::DuplicateUsername(ref name) if name == "alice"));
    }

    #[test]
    fn test_register_validates_input() {
        let service = service();
        assert!(matches!(service.register("", "pw"), Err(Error::Validation(_))));
        assert!(matches!(service.register("bob", ""), Err(Error::Validation(_))));
    }

    #[test]
    fn test_public_ids_are_unique() {
        let service = service();
        let a = service.register("alice", "pw").unwrap();
        let b = service.register("bob", "pw").unwrap();
        assert_ne!(a.public_id, b.public_id);
    }

    #[test]
    fn test_authenticate() {
        let service = service();
        let registered = service.register("alice", "correct horse").unwrap();

        let account = service.authenticate("alice", "correct horse").unwrap();
        assert_eq!(account.id, registered.id);

        assert!(matches!(
            service.authenticate("alice", "wrong"),
            Err(Error::InvalidCredentials)
        ));
        assert!(matches!(
            service.authenticate("mallory", "correct horse"),
            Err(Error::InvalidCredentials)
        ));
        assert!(matches!(
            service.authenticate("", "anything"),
            Err(Error::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_password_rejects_garbage_hash() {
        assert!(!verify_password("pw", "not-a-phc-string"));
    }

    #[test]
    fn test_summary_and_unknown_account() {
        let service = service();
        let account = service.register("alice", "pw").unwrap();

        let summary = service.summary(&account).unwrap();
        assert_eq!(summary.username, "alice");
        assert_eq!(summary.public_id, account.public_id);
        assert_eq!(summary.entry_count, 0);

        assert!(matches!(
            service.get_account(Uuid::new_v4()),
            Err(Error::Unauthenticated)
        ));
    }
}

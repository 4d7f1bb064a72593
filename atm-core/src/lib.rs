//! ATM Core - account store and ledger for a small multi-user bank
//!
//! This crate follows a hexagonal layout:
//!
//! - **domain**: Core entities (Account, LedgerEntry) and validation rules
//! - **ports**: The Repository / UnitOfWork seam the services depend on
//! - **services**: Registration, authentication, deposit/withdraw/transfer,
//!   status, integrity checks and event logging
//! - **adapters**: The DuckDB-backed store

pub mod domain;
pub mod ports;
pub mod services;
pub mod adapters;
pub mod config;
pub mod migrations;
pub mod log_migrations;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use adapters::duckdb::DuckDbRepository;
use config::Config;
use ports::Repository;
use services::*;

// Re-export commonly used types at crate root
pub use domain::{Account, Argon2Params, EntryKind, LedgerEntry, PublicId, MAX_BALANCE};
pub use domain::result::{Error, OperationResult};
pub use services::{EntryPoint, LogEvent, LoggingService};

/// Main context for ATM operations
///
/// Holds the store, the configuration and every service. One context can be
/// shared across threads; operations on it are serialized by the store.
pub struct AtmContext {
    pub config: Config,
    pub repository: Arc<DuckDbRepository>,
    pub account_service: AccountService,
    pub ledger_service: LedgerService,
    pub status_service: StatusService,
    pub doctor_service: DoctorService,
}

impl AtmContext {
    /// Open (or create) the store in `data_dir`
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create {}", data_dir.display()))?;
        let config = Config::load(data_dir)?;

        let db_path = data_dir.join(&config.database_filename);
        let repository = Arc::new(DuckDbRepository::new(&db_path)?);
        repository.ensure_schema()?;

        Ok(Self::with_repository(config, repository))
    }

    /// Context over a throwaway in-memory store
    pub fn in_memory(config: Config) -> Result<Self> {
        let repository = Arc::new(DuckDbRepository::open_in_memory()?);
        repository.ensure_schema()?;

        Ok(Self::with_repository(config, repository))
    }

    fn with_repository(config: Config, repository: Arc<DuckDbRepository>) -> Self {
        let store: Arc<dyn Repository> = repository.clone();

        let account_service = AccountService::new(Arc::clone(&store), config.argon2.clone());
        let ledger_service = LedgerService::new(Arc::clone(&store));
        let status_service = StatusService::new(Arc::clone(&store));
        let doctor_service = DoctorService::new(store);

        Self {
            config,
            repository,
            account_service,
            ledger_service,
            status_service,
            doctor_service,
        }
    }
}

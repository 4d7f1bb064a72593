//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod account;
mod doctor;
mod ledger;
pub mod logging;
pub mod migration;
mod status;

pub use account::{AccountService, AccountSummary};
pub use doctor::{CheckResult, DoctorResult, DoctorService, DoctorSummary};
pub use ledger::{LedgerService, OperationReceipt, TransferReceipt};
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use status::{StatusService, StatusSummary};

//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account;
mod credential;
mod ledger;
pub mod result;

pub use account::{Account, PublicId, MAX_USERNAME_LEN, PUBLIC_ID_LEN};
pub use credential::Argon2Params;
pub use ledger::{validate_amount, EntryKind, LedgerEntry, MAX_BALANCE, MONEY_SCALE};

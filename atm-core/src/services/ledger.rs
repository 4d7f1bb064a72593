//! Ledger service - deposit, withdraw, transfer and history
//!
//! Every balance-affecting operation runs as one unit of work: the account
//! is re-read, validated, mutated and its ledger entries appended inside a
//! single store transaction. Any error rolls the whole operation back.

use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{validate_amount, Account, EntryKind, LedgerEntry, PublicId, MAX_BALANCE};
use crate::ports::{run_atomically, Repository};

/// Column order of an exported statement, matching `StatementRow`
const STATEMENT_HEADER: [&str; 5] = ["id", "amount", "description", "counterparty", "created_at"];

/// Ledger service for balance-affecting operations
pub struct LedgerService {
    repository: Arc<dyn Repository>,
}

impl LedgerService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Credit `amount` to the account
    pub fn deposit(&self, account: &Account, amount: Decimal) -> Result<OperationReceipt> {
        let amount = validate_amount(amount).map_err(Error::invalid_amount)?;
        let account_id = account.id;

        run_atomically(self.repository.as_ref(), |uow| {
            let current = uow.find_account(account_id)?.ok_or(Error::Unauthenticated)?;

            let new_balance = current.balance + amount;
            if new_balance > MAX_BALANCE || !uow.adjust_balance(current.id, amount)? {
                return Err(Error::invalid_amount(
                    "deposit would exceed the maximum balance",
                ));
            }

            let entry = LedgerEntry::new(current.id, EntryKind::Deposit, amount, None, None);
            uow.append_entry(&entry)?;

            Ok(OperationReceipt {
                account_id: current.id,
                new_balance,
                entry,
            })
        })
    }

    /// Debit `amount` from the account if the balance covers it
    pub fn withdraw(&self, account: &Account, amount: Decimal) -> Result<OperationReceipt> {
        let amount = validate_amount(amount).map_err(Error::invalid_amount)?;
        let account_id = account.id;

        run_atomically(self.repository.as_ref(), |uow| {
            let current = uow.find_account(account_id)?.ok_or(Error::Unauthenticated)?;

            if current.balance < amount || !uow.adjust_balance(current.id, -amount)? {
                return Err(Error::InsufficientFunds {
                    balance: current.balance,
                    requested: amount,
                });
            }

            let entry = LedgerEntry::new(current.id, EntryKind::Withdrawal, amount, None, None);
            uow.append_entry(&entry)?;

            Ok(OperationReceipt {
                account_id: current.id,
                new_balance: current.balance - amount,
                entry,
            })
        })
    }

    /// Move `amount` from `sender` to the account addressed by `recipient`
    ///
    /// Both balance updates and both ledger entries commit together.
    pub fn transfer(
        &self,
        sender: &Account,
        recipient: &str,
        amount: Decimal,
    ) -> Result<TransferReceipt> {
        let amount = validate_amount(amount).map_err(Error::invalid_amount)?;
        // A malformed identifier can never match an account
        let recipient_public_id = PublicId::parse(recipient)
            .map_err(|_| Error::RecipientNotFound(recipient.trim().to_string()))?;
        let sender_id = sender.id;

        run_atomically(self.repository.as_ref(), |uow| {
            let sender = uow.find_account(sender_id)?.ok_or(Error::Unauthenticated)?;
            let recipient = uow
                .find_account_by_public_id(&recipient_public_id)?
                .ok_or_else(|| Error::RecipientNotFound(recipient_public_id.to_string()))?;

            if recipient.id == sender.id {
                return Err(Error::validation("cannot transfer to your own account"));
            }
            if sender.balance < amount || !uow.adjust_balance(sender.id, -amount)? {
                return Err(Error::InsufficientFunds {
                    balance: sender.balance,
                    requested: amount,
                });
            }
            if recipient.balance + amount > MAX_BALANCE
                || !uow.adjust_balance(recipient.id, amount)?
            {
                return Err(Error::invalid_amount(
                    "transfer would exceed the recipient's maximum balance",
                ));
            }

            let transfer_id = Uuid::new_v4();
            let debit = LedgerEntry::new(
                sender.id,
                EntryKind::TransferOut,
                amount,
                Some(recipient.public_id.clone()),
                Some(transfer_id),
            );
            let credit = LedgerEntry::new(
                recipient.id,
                EntryKind::TransferIn,
                amount,
                Some(sender.public_id.clone()),
                Some(transfer_id),
            );
            uow.append_entry(&debit)?;
            uow.append_entry(&credit)?;

            Ok(TransferReceipt {
                transfer_id,
                sender_balance: sender.balance - amount,
                recipient_public_id: recipient.public_id,
                debit,
                credit,
            })
        })
    }

    /// Ledger entries for the account, oldest first
    pub fn list_entries(&self, account: &Account) -> Result<Vec<LedgerEntry>> {
        self.repository.get_entries_by_account(account.id)
    }

    /// Write the account's history as CSV. Returns the number of rows written.
    pub fn export_statement<W: Write>(&self, account: &Account, writer: W) -> Result<usize> {
        let entries = self.list_entries(account)?;
        // The header is written up front so an empty statement still has one
        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        csv_writer
            .write_record(STATEMENT_HEADER)
            .map_err(|e| Error::Other(format!("Failed to write statement: {}", e)))?;

        for entry in &entries {
            csv_writer
                .serialize(StatementRow::from(entry))
                .map_err(|e| Error::Other(format!("Failed to write statement: {}", e)))?;
        }
        csv_writer.flush()?;

        Ok(entries.len())
    }
}

/// Outcome of a deposit or withdrawal
#[derive(Debug, Clone, Serialize)]
pub struct OperationReceipt {
    pub account_id: Uuid,
    pub new_balance: Decimal,
    pub entry: LedgerEntry,
}

/// Outcome of a transfer
#[derive(Debug, Clone, Serialize)]
pub struct TransferReceipt {
    pub transfer_id: Uuid,
    pub sender_balance: Decimal,
    pub recipient_public_id: PublicId,
    pub debit: LedgerEntry,
    pub credit: LedgerEntry,
}

#[derive(Serialize)]
struct StatementRow<'a> {
    id: Uuid,
    amount: Decimal,
    description: &'a str,
    counterparty: Option<&'a str>,
    created_at: DateTime<Utc>,
}

impl<'a> From<&'a LedgerEntry> for StatementRow<'a> {
    fn from(entry: &'a LedgerEntry) -> Self {
        Self {
            id: entry.id,
            amount: entry.amount,
            description: &entry.description,
            counterparty: entry.counterparty.as_ref().map(|c| c.as_str()),
            created_at: entry.created_at,
        }
    }
}

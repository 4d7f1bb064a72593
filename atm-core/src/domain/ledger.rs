//! Ledger entry domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::account::PublicId;

/// Number of fractional digits stored for money (`DECIMAL(18, 2)`)
pub const MONEY_SCALE: u32 = 2;

/// Largest balance an account can hold: 9,999,999,999,999,999.99
pub const MAX_BALANCE: Decimal = Decimal::from_parts(2_808_348_671, 232_830_643, 0, false, 2);

/// Kind of balance-affecting event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Deposit,
    Withdrawal,
    TransferOut,
    TransferIn,
}

impl EntryKind {
    /// Human-readable description stored on the entry
    pub fn describe(&self, counterparty: Option<&PublicId>) -> String {
        match (self, counterparty) {
            (EntryKind::Deposit, _) => "Deposit".to_string(),
            (EntryKind::Withdrawal, _) => "Withdrawal".to_string(),
            (EntryKind::TransferOut, Some(c)) => format!("Transfer to {}", c),
            (EntryKind::TransferIn, Some(c)) => format!("Transfer from {}", c),
            (EntryKind::TransferOut, None) => "Transfer out".to_string(),
            (EntryKind::TransferIn, None) => "Transfer in".to_string(),
        }
    }

    /// Sign applied to the operation amount
    pub fn is_debit(&self) -> bool {
        matches!(self, EntryKind::Withdrawal | EntryKind::TransferOut)
    }
}

/// Immutable record of one balance-affecting event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub account_id: Uuid,
    /// Signed: negative for debits, positive for credits
    pub amount: Decimal,
    pub description: String,
    pub counterparty: Option<PublicId>,
    /// Shared by both sides of a transfer
    pub transfer_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Build an entry for `account_id`; `amount` is the positive operation amount
    pub fn new(
        account_id: Uuid,
        kind: EntryKind,
        amount: Decimal,
        counterparty: Option<PublicId>,
        transfer_id: Option<Uuid>,
    ) -> Self {
        let signed = if kind.is_debit() { -amount } else { amount };
        Self {
            id: Uuid::new_v4(),
            account_id,
            amount: signed,
            description: kind.describe(counterparty.as_ref()),
            counterparty,
            transfer_id,
            created_at: Utc::now(),
        }
    }

    pub fn is_debit(&self) -> bool {
        self.amount.is_sign_negative()
    }
}

/// Validate an operation amount: strictly positive, at most two fractional
/// digits, and no larger than the balance ceiling
pub fn validate_amount(amount: Decimal) -> Result<Decimal, &'static str> {
    if amount <= Decimal::ZERO {
        return Err("amount must be greater than zero");
    }
    let normalized = amount.normalize();
    if normalized.scale() > MONEY_SCALE {
        return Err("amount cannot have more than two decimal places");
    }
    if normalized > MAX_BALANCE {
        return Err("amount exceeds the maximum balance");
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_balance_constant() {
        assert_eq!(MAX_BALANCE.to_string(), "9999999999999999.99");
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(Decimal::ZERO).is_err());
        assert!(validate_amount(Decimal::new(-500, 2)).is_err());
        assert!(validate_amount(Decimal::new(1, 3)).is_err());
        assert_eq!(validate_amount(Decimal::new(4000, 2)).unwrap(), Decimal::new(40, 0));
        // Trailing zeros beyond the money scale are fine
        assert!(validate_amount(Decimal::new(12_500, 3)).is_ok());
        assert!(validate_amount(MAX_BALANCE + Decimal::ONE).is_err());
    }

    #[test]
    fn test_entry_signs_and_descriptions() {
        let account_id = Uuid::new_v4();
        let other = PublicId::parse("AbCdE12345").unwrap();
        let amount = Decimal::new(40, 0);

        let w = LedgerEntry::new(account_id, EntryKind::Withdrawal, amount, None, None);
        assert_eq!(w.amount, -amount);
        assert_eq!(w.description, "Withdrawal");
        assert!(w.is_debit());

        let d = LedgerEntry::new(account_id, EntryKind::Deposit, amount, None, None);
        assert_eq!(d.amount, amount);
        assert_eq!(d.description, "Deposit");

        let out = LedgerEntry::new(account_id, EntryKind::TransferOut, amount, Some(other.clone()), None);
        assert_eq!(out.description, "Transfer to AbCdE12345");
        let inn = LedgerEntry::new(account_id, EntryKind::TransferIn, amount, Some(other), None);
        assert_eq!(inn.description, "Transfer from AbCdE12345");
        assert_eq!(out.amount, -inn.amount);
    }
}

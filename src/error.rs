//! Transfer Error Types
//!
//! Every rejection the coordinator can report. Validation errors are detected
//! before any lock is taken; funds errors are detected under lock, before any
//! mutation.

use thiserror::Error;

use crate::core_types::{AccountId, Amount};

/// Transfer error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    // === Validation Errors ===
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Source and target account cannot be the same")]
    SameAccount,

    // === Account Errors ===
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Duplicate account id in registry: {0}")]
    DuplicateAccount(AccountId),

    // === Funds Errors ===
    #[error("Insufficient funds in account {account_id}: available {available}, requested {requested}")]
    InsufficientFunds {
        account_id: AccountId,
        available: Amount,
        requested: Amount,
    },

    #[error(
        "Reversal of {amount} from account {to_id} back to account {from_id} failed: only {available} available"
    )]
    ReversalFailure {
        from_id: AccountId,
        to_id: AccountId,
        amount: Amount,
        available: Amount,
    },

    #[error("Amount would cause overflow")]
    Overflow,

    // === System Errors ===
    #[error("Lock poisoned on account {0}")]
    LockPoisoned(AccountId),

    #[error("Ledger mismatch on account {account_id}: history implies {expected}, balance is {actual}")]
    LedgerMismatch {
        account_id: AccountId,
        expected: Amount,
        actual: Amount,
    },
}

impl TransferError {
    /// Stable error code for logs and reports
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::InvalidAmount => "INVALID_AMOUNT",
            TransferError::SameAccount => "SAME_ACCOUNT",
            TransferError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            TransferError::DuplicateAccount(_) => "DUPLICATE_ACCOUNT",
            TransferError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            TransferError::ReversalFailure { .. } => "REVERSAL_FAILURE",
            TransferError::Overflow => "OVERFLOW",
            TransferError::LockPoisoned(_) => "LOCK_POISONED",
            TransferError::LedgerMismatch { .. } => "LEDGER_MISMATCH",
        }
    }

    /// True for malformed requests (rejected without touching any lock)
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, TransferError::InvalidAmount | TransferError::SameAccount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_error_codes() {
        assert_eq!(TransferError::SameAccount.code(), "SAME_ACCOUNT");
        assert_eq!(TransferError::AccountNotFound(9).code(), "ACCOUNT_NOT_FOUND");
        assert_eq!(
            TransferError::InsufficientFunds {
                account_id: 3,
                available: Decimal::from(3000),
                requested: Decimal::from(50000),
            }
            .code(),
            "INSUFFICIENT_FUNDS"
        );
    }

    #[test]
    fn test_invalid_request_class() {
        assert!(TransferError::InvalidAmount.is_invalid_request());
        assert!(TransferError::SameAccount.is_invalid_request());
        assert!(!TransferError::AccountNotFound(1).is_invalid_request());
        assert!(!TransferError::Overflow.is_invalid_request());
    }

    #[test]
    fn test_display() {
        let err = TransferError::InsufficientFunds {
            account_id: 3,
            available: Decimal::from(3000),
            requested: Decimal::from(50000),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient funds in account 3: available 3000, requested 50000"
        );
        assert_eq!(
            TransferError::AccountNotFound(99).to_string(),
            "Account not found: 99"
        );
    }
}

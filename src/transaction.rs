//! Transaction - immutable record of one committed fund movement
//!
//! A single `Transaction` value is appended to the histories of BOTH
//! participating accounts inside the critical section that moves the funds.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core_types::{AccountId, Amount};
use crate::error::TransferError;

/// Transaction ID - ULID-based unique identifier
///
/// Sortable by creation time (millisecond resolution), no coordination needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(ulid::Ulid);

impl TransactionId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    pub fn inner(&self) -> ulid::Ulid {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransactionId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

/// What produced the record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    /// Regular transfer requested by a caller
    Transfer,
    /// Compensating transfer moving funds back to an earlier source
    Reversal,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Transfer => "TRANSFER",
            TransactionKind::Reversal => "REVERSAL",
        }
    }
}

/// Immutable transaction record
///
/// # Invariants (ENFORCED by private fields + validating constructor):
/// - `from_id != to_id`
/// - `amount > 0`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    id: TransactionId,
    kind: TransactionKind,
    from_id: AccountId,
    to_id: AccountId,
    amount: Amount,
    created_at: DateTime<Utc>,
}

impl Transaction {
    /// Build a record for a movement of `amount` from `from_id` to `to_id`.
    ///
    /// Only the coordinator creates transactions, and only once the
    /// movement is known to succeed.
    pub(crate) fn new(
        kind: TransactionKind,
        from_id: AccountId,
        to_id: AccountId,
        amount: Amount,
    ) -> Result<Self, TransferError> {
        if amount <= Amount::ZERO {
            return Err(TransferError::InvalidAmount);
        }
        if from_id == to_id {
            return Err(TransferError::SameAccount);
        }
        Ok(Self {
            id: TransactionId::new(),
            kind,
            from_id,
            to_id,
            amount,
            created_at: Utc::now(),
        })
    }

    #[inline]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    #[inline]
    pub fn from_id(&self) -> AccountId {
        self.from_id
    }

    #[inline]
    pub fn to_id(&self) -> AccountId {
        self.to_id
    }

    #[inline]
    pub fn amount(&self) -> Amount {
        self.amount
    }

    #[inline]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether `account_id` participates in this transaction
    pub fn involves(&self, account_id: AccountId) -> bool {
        self.from_id == account_id || self.to_id == account_id
    }

    /// Signed effect of this transaction on `account_id`'s balance
    ///
    /// `+amount` for the destination, `-amount` for the source, zero otherwise.
    pub fn delta_for(&self, account_id: AccountId) -> Amount {
        if account_id == self.to_id {
            self.amount
        } else if account_id == self.from_id {
            -self.amount
        } else {
            Amount::ZERO
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Transaction {} ({})", self.id, self.kind.as_str())?;
        writeln!(f, "  From Account: {}", self.from_id)?;
        writeln!(f, "  To Account: {}", self.to_id)?;
        writeln!(f, "  Amount: ${:.2}", self.amount)?;
        write!(f, "-----------------------------------")
    }
}

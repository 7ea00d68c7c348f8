//! Transfer Attempt States
//!
//! ```text
//! VALIDATING → LOCK_ACQUIRED → COMMITTED
//!      ↓              ↓
//! ABORTED_INVALID   ABORTED_INSUFFICIENT_FUNDS
//!
//! (compensation)  REVERSAL_ATTEMPTED → COMMITTED | ABORTED_INSUFFICIENT_FUNDS
//! ```
//!
//! Attempts that end in `AbortedInvalid` never take a lock.

use std::fmt;

use serde::Serialize;

/// Per-attempt transfer states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferState {
    /// Request received, arguments and account ids being checked
    Validating,

    /// Both account locks held (low id first)
    LockAcquired,

    /// Terminal: balances and histories updated
    Committed,

    /// Terminal: source could not cover the amount, nothing changed
    AbortedInsufficientFunds,

    /// Terminal: malformed request or unknown account, nothing changed
    AbortedInvalid,

    /// Compensating transfer requested for a prior commit
    ReversalAttempted,
}

impl TransferState {
    /// Check if this is a terminal state
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferState::Committed
                | TransferState::AbortedInsufficientFunds
                | TransferState::AbortedInvalid
        )
    }

    /// Check if account locks are held in this state
    #[inline]
    pub fn holds_locks(&self) -> bool {
        matches!(self, TransferState::LockAcquired)
    }

    /// Get human-readable state name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Validating => "VALIDATING",
            TransferState::LockAcquired => "LOCK_ACQUIRED",
            TransferState::Committed => "COMMITTED",
            TransferState::AbortedInsufficientFunds => "ABORTED_INSUFFICIENT_FUNDS",
            TransferState::AbortedInvalid => "ABORTED_INVALID",
            TransferState::ReversalAttempted => "REVERSAL_ATTEMPTED",
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//! Coordinator outcome counters
//!
//! Lock-free, updated from every transfer thread.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::error::TransferError;

#[derive(Debug, Default)]
pub struct TransferStats {
    /// Transfers committed
    pub committed: AtomicU64,
    /// Rejected before locking (bad amount / same account / unknown id)
    pub rejected_invalid: AtomicU64,
    /// Rejected under lock for lack of funds
    pub rejected_insufficient: AtomicU64,
    /// Other aborts (overflow, poisoned lock)
    pub aborted_other: AtomicU64,
    /// Compensating transfers committed
    pub reversals: AtomicU64,
    /// Compensating transfers that could not run
    pub reversal_failures: AtomicU64,
}

impl TransferStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn incr_committed(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a rejected transfer under the bucket its error belongs to
    pub fn record_rejection(&self, err: &TransferError) {
        let counter = match err {
            TransferError::InvalidAmount
            | TransferError::SameAccount
            | TransferError::AccountNotFound(_) => &self.rejected_invalid,
            TransferError::InsufficientFunds { .. } => &self.rejected_insufficient,
            _ => &self.aborted_other,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn incr_reversals(&self) {
        self.reversals.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn incr_reversal_failures(&self) {
        self.reversal_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TransferStatsSnapshot {
        TransferStatsSnapshot {
            committed: self.committed.load(Ordering::Relaxed),
            rejected_invalid: self.rejected_invalid.load(Ordering::Relaxed),
            rejected_insufficient: self.rejected_insufficient.load(Ordering::Relaxed),
            aborted_other: self.aborted_other.load(Ordering::Relaxed),
            reversals: self.reversals.load(Ordering::Relaxed),
            reversal_failures: self.reversal_failures.load(Ordering::Relaxed),
        }
    }
}

/// Immutable snapshot of stats (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferStatsSnapshot {
    pub committed: u64,
    pub rejected_invalid: u64,
    pub rejected_insufficient: u64,
    pub aborted_other: u64,
    pub reversals: u64,
    pub reversal_failures: u64,
}

impl TransferStatsSnapshot {
    /// Transfer attempts seen (reversals not included)
    pub fn attempts(&self) -> u64 {
        self.committed + self.rejected_invalid + self.rejected_insufficient + self.aborted_other
    }
}

impl fmt::Display for TransferStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempts={} committed={} rejected_invalid={} rejected_insufficient={} aborted_other={} reversals={} reversal_failures={}",
            self.attempts(),
            self.committed,
            self.rejected_invalid,
            self.rejected_insufficient,
            self.aborted_other,
            self.reversals,
            self.reversal_failures
        )
    }
}

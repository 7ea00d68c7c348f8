//! Account - balance + append-only ledger behind a reader/writer lock
//!
//! # Locking
//!
//! Each account owns one `RwLock`. Reads (`balance`, `history_snapshot`)
//! take the shared side briefly. Every mutation takes the exclusive side.
//!
//! Cross-account critical sections use [`AccountGuard`], obtainable only
//! inside this crate via `Account::lock_exclusive`. The coordinator is the
//! only caller and always acquires guards in ascending `AccountId` order.
//! The guard releases the lock when dropped, on every exit path.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use crate::core_types::{AccountId, Amount};
use crate::error::TransferError;
use crate::transaction::Transaction;

/// State protected by the account lock
#[derive(Debug)]
struct LedgerState {
    balance: Amount,
    history: Vec<Transaction>,
}

/// A single account in the registry
///
/// # Invariants:
/// 1. `id` and `opening_balance` are immutable after creation
/// 2. `balance` only changes while the write lock is held
/// 3. `history` is append-only; insertion order is audit order
#[derive(Debug)]
pub struct Account {
    id: AccountId,
    opening_balance: Amount,
    state: RwLock<LedgerState>,
}

impl Account {
    /// Create an account with an opening balance and empty history
    pub fn new(id: AccountId, opening_balance: Amount) -> Self {
        Self {
            id,
            opening_balance,
            state: RwLock::new(LedgerState {
                balance: opening_balance,
                history: Vec::new(),
            }),
        }
    }

    #[inline]
    pub fn id(&self) -> AccountId {
        self.id
    }

    #[inline]
    pub fn opening_balance(&self) -> Amount {
        self.opening_balance
    }

    /// Current balance (shared lock)
    pub fn balance(&self) -> Result<Amount, TransferError> {
        Ok(self.read()?.balance)
    }

    /// Independent copy of the history, safe to use after the lock is gone
    pub fn history_snapshot(&self) -> Result<Vec<Transaction>, TransferError> {
        Ok(self.read()?.history.clone())
    }

    /// Number of recorded transactions
    pub fn history_len(&self) -> Result<usize, TransferError> {
        Ok(self.read()?.history.len())
    }

    /// Verify `balance == opening + Σ credits − Σ debits` over the history.
    ///
    /// Balance and history are read under one shared lock, so the check sees
    /// a consistent prefix even while transfers are running.
    pub fn reconcile(&self) -> Result<(), TransferError> {
        let state = self.read()?;
        let mut expected = self.opening_balance;
        for tx in &state.history {
            expected = expected
                .checked_add(tx.delta_for(self.id))
                .ok_or(TransferError::Overflow)?;
        }
        if expected != state.balance {
            return Err(TransferError::LedgerMismatch {
                account_id: self.id,
                expected,
                actual: state.balance,
            });
        }
        Ok(())
    }

    /// Point-in-time view of this account (shared lock)
    pub fn summary(&self) -> Result<AccountSummary, TransferError> {
        let state = self.read()?;
        Ok(AccountSummary {
            id: self.id,
            opening_balance: self.opening_balance,
            balance: state.balance,
            transactions: state.history.len(),
        })
    }

    /// Add `amount` to the balance (exclusive lock).
    ///
    /// No validation beyond overflow.
    #[allow(dead_code)]
    pub(crate) fn deposit(&self, amount: Amount) -> Result<(), TransferError> {
        self.lock_exclusive()?.deposit(amount)
    }

    /// Subtract `amount` from the balance (exclusive lock).
    ///
    /// # Sufficiency
    /// This does NOT check that the balance covers `amount`. The coordinator
    /// checks sufficiency and withdraws inside one critical section spanning
    /// both accounts; a self-validating withdraw here would not be atomic with
    /// that decision. Calling this without holding the pair's locks bypasses
    /// the funds check entirely.
    #[allow(dead_code)]
    pub(crate) fn withdraw(&self, amount: Amount) -> Result<(), TransferError> {
        self.lock_exclusive()?.withdraw(amount)
    }

    /// Append to history (exclusive lock)
    #[allow(dead_code)]
    pub(crate) fn append_history(&self, tx: Transaction) -> Result<(), TransferError> {
        self.lock_exclusive()?.append_history(tx);
        Ok(())
    }

    /// Acquire the exclusive lock for a multi-step critical section.
    ///
    /// Callers holding more than one guard MUST have acquired them in
    /// ascending `AccountId` order.
    pub(crate) fn lock_exclusive(&self) -> Result<AccountGuard<'_>, TransferError> {
        let state = self
            .state
            .write()
            .map_err(|_| TransferError::LockPoisoned(self.id))?;
        Ok(AccountGuard { id: self.id, state })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, LedgerState>, TransferError> {
        self.state
            .read()
            .map_err(|_| TransferError::LockPoisoned(self.id))
    }
}

/// Exclusive handle on one account, released on drop
pub(crate) struct AccountGuard<'a> {
    id: AccountId,
    state: RwLockWriteGuard<'a, LedgerState>,
}

impl AccountGuard<'_> {
    #[inline]
    pub(crate) fn id(&self) -> AccountId {
        self.id
    }

    #[inline]
    pub(crate) fn balance(&self) -> Amount {
        self.state.balance
    }

    /// Balance that would result from applying `delta`, without applying it
    pub(crate) fn checked_balance_after(&self, delta: Amount) -> Result<Amount, TransferError> {
        self.state
            .balance
            .checked_add(delta)
            .ok_or(TransferError::Overflow)
    }

    pub(crate) fn deposit(&mut self, amount: Amount) -> Result<(), TransferError> {
        self.state.balance = self.checked_balance_after(amount)?;
        Ok(())
    }

    /// Unconditional debit; see [`Account::withdraw`] for the sufficiency contract.
    pub(crate) fn withdraw(&mut self, amount: Amount) -> Result<(), TransferError> {
        self.state.balance = self
            .state
            .balance
            .checked_sub(amount)
            .ok_or(TransferError::Overflow)?;
        Ok(())
    }

    pub(crate) fn append_history(&mut self, tx: Transaction) {
        self.state.history.push(tx);
    }
}

/// Per-account row of a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    pub id: AccountId,
    pub opening_balance: Amount,
    pub balance: Amount,
    pub transactions: usize,
}

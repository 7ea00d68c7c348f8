//! Transfer Coordinator
//!
//! Owns the account registry and moves funds between pairs of accounts.
//!
//! # Lock Ordering
//!
//! ```text
//! transfer(3 → 1)            transfer(1 → 3)
//!   lock(1)  ◀── same order ──▶  lock(1)
//!   lock(3)                      lock(3)
//!   check + mutate               check + mutate
//!   unlock(3), unlock(1)         unlock(3), unlock(1)
//! ```
//!
//! Both locks of a pair are always taken lowest `AccountId` first, whatever
//! the transfer direction. Any two operations touching a common account
//! therefore request locks in the same relative order and cannot wait on
//! each other in a cycle.
//!
//! # Atomicity
//!
//! The funds check, both balance updates and both history appends happen
//! while both locks are held. A third party reading either account sees the
//! transfer entirely or not at all. New balances are computed with checked
//! arithmetic for both sides before either is written, so a commit never
//! stops halfway and no compensation is needed on the commit path.
//! `reverse_transaction` exists for externally requested undo only.

use std::collections::BTreeMap;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::debug;

use crate::account::{Account, AccountGuard, AccountSummary};
use crate::core_types::{AccountId, Amount};
use crate::error::TransferError;
use crate::events::{EventSink, TransferEvent};
use crate::stats::{TransferStats, TransferStatsSnapshot};
use crate::transaction::{Transaction, TransactionKind};

/// History of one account, as returned by [`TransferCoordinator::history_report`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountHistory {
    pub account_id: AccountId,
    pub transactions: Vec<Transaction>,
}

/// Exclusive guards on the two accounts of one operation.
///
/// Fields drop in declaration order: `high` is released before `low`.
struct LockedPair<'a> {
    high: AccountGuard<'a>,
    low: AccountGuard<'a>,
    source_is_low: bool,
}

impl<'a> LockedPair<'a> {
    /// Lock `source` and `destination`, lower id first
    fn acquire(source: &'a Account, destination: &'a Account) -> Result<Self, TransferError> {
        let source_is_low = source.id() < destination.id();
        let (low_account, high_account) = if source_is_low {
            (source, destination)
        } else {
            (destination, source)
        };

        let low = low_account.lock_exclusive()?;
        let high = high_account.lock_exclusive()?;
        Ok(Self {
            high,
            low,
            source_is_low,
        })
    }

    fn source(&self) -> &AccountGuard<'a> {
        if self.source_is_low {
            &self.low
        } else {
            &self.high
        }
    }

    fn destination(&self) -> &AccountGuard<'a> {
        if self.source_is_low {
            &self.high
        } else {
            &self.low
        }
    }

    /// (source, destination)
    fn split_mut(&mut self) -> (&mut AccountGuard<'a>, &mut AccountGuard<'a>) {
        if self.source_is_low {
            (&mut self.low, &mut self.high)
        } else {
            (&mut self.high, &mut self.low)
        }
    }

    /// Check funds, then move `amount` and record it on both sides.
    fn commit(&mut self, kind: TransactionKind, amount: Amount) -> Result<Transaction, TransferError> {
        let available = self.source().balance();
        if available < amount {
            let account_id = self.source().id();
            return Err(match kind {
                TransactionKind::Transfer => TransferError::InsufficientFunds {
                    account_id,
                    available,
                    requested: amount,
                },
                // Reversals run from the original destination back to the original source
                TransactionKind::Reversal => TransferError::ReversalFailure {
                    from_id: self.destination().id(),
                    to_id: account_id,
                    amount,
                    available,
                },
            });
        }

        let (source, destination) = self.split_mut();
        let tx = Transaction::new(kind, source.id(), destination.id(), amount)?;

        // Both sides are checked before either is written.
        source.checked_balance_after(-amount)?;
        destination.checked_balance_after(amount)?;

        source.withdraw(amount)?;
        destination.deposit(amount)?;
        source.append_history(tx.clone());
        destination.append_history(tx.clone());
        Ok(tx)
    }
}

/// Transfer Coordinator - the only component that mutates accounts
pub struct TransferCoordinator {
    accounts: FxHashMap<AccountId, Account>,
    /// Ascending ids, for deterministic reports
    ids: Vec<AccountId>,
    sink: Arc<dyn EventSink>,
    stats: TransferStats,
}

impl TransferCoordinator {
    /// Build the registry from the initial account set.
    ///
    /// # Errors
    /// `DuplicateAccount` if two accounts share an id.
    pub fn new(
        accounts: impl IntoIterator<Item = Account>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, TransferError> {
        let mut registry = FxHashMap::default();
        for account in accounts {
            let id = account.id();
            if registry.insert(id, account).is_some() {
                return Err(TransferError::DuplicateAccount(id));
            }
        }

        let mut ids: Vec<AccountId> = registry.keys().copied().collect();
        ids.sort_unstable();

        debug!(accounts = ids.len(), "Transfer coordinator ready");
        Ok(Self {
            accounts: registry,
            ids,
            sink,
            stats: TransferStats::new(),
        })
    }

    // ============================================================
    // TRANSFERS
    // ============================================================

    /// Move `amount` from `from_id` to `to_id`.
    ///
    /// Returns `false` on any rejection; the cause is reported to the event
    /// sink. Use [`try_transfer`](Self::try_transfer) for the typed error.
    pub fn transfer(&self, from_id: AccountId, to_id: AccountId, amount: Amount) -> bool {
        self.try_transfer(from_id, to_id, amount).is_ok()
    }

    /// Move `amount` from `from_id` to `to_id`, returning the committed record.
    ///
    /// # Errors
    /// - `InvalidAmount` / `SameAccount` / `AccountNotFound`: no lock taken
    /// - `InsufficientFunds`: detected under lock, nothing changed
    /// - `Overflow` / `LockPoisoned`: nothing changed
    pub fn try_transfer(
        &self,
        from_id: AccountId,
        to_id: AccountId,
        amount: Amount,
    ) -> Result<Transaction, TransferError> {
        let result = self.resolve(from_id, to_id, amount).and_then(|(source, destination)| {
            self.sink.emit(&TransferEvent::Initiated {
                from_id,
                to_id,
                amount,
            });
            LockedPair::acquire(source, destination)?.commit(TransactionKind::Transfer, amount)
        });

        match result {
            Ok(transaction) => {
                self.stats.incr_committed();
                self.sink.emit(&TransferEvent::Committed {
                    transaction: transaction.clone(),
                });
                Ok(transaction)
            }
            Err(reason) => {
                self.stats.record_rejection(&reason);
                self.sink.emit(&TransferEvent::Rejected {
                    from_id,
                    to_id,
                    amount,
                    reason: reason.clone(),
                });
                Err(reason)
            }
        }
    }

    /// Compensate an earlier `from_id → to_id` transfer of `amount`.
    ///
    /// Best effort: failures are reported to the event sink only.
    pub fn reverse_transaction(&self, from_id: AccountId, to_id: AccountId, amount: Amount) {
        // Outcome already reported through the sink
        let _ = self.try_reverse(from_id, to_id, amount);
    }

    /// Compensate an earlier `from_id → to_id` transfer of `amount` by moving
    /// `amount` from `to_id` back to `from_id`.
    ///
    /// This is a new transaction of kind `Reversal`, recorded on both
    /// accounts. The original record stays in the history.
    ///
    /// # Errors
    /// - `ReversalFailure` if `to_id` no longer holds `amount`; nothing changed
    /// - validation errors as for [`try_transfer`](Self::try_transfer)
    pub fn try_reverse(
        &self,
        from_id: AccountId,
        to_id: AccountId,
        amount: Amount,
    ) -> Result<Transaction, TransferError> {
        let result = self
            .resolve(to_id, from_id, amount)
            .and_then(|(source, destination)| {
                self.sink.emit(&TransferEvent::ReversalAttempted {
                    from_id,
                    to_id,
                    amount,
                });
                LockedPair::acquire(source, destination)?.commit(TransactionKind::Reversal, amount)
            });

        match result {
            Ok(transaction) => {
                self.stats.incr_reversals();
                self.sink.emit(&TransferEvent::Reversed {
                    transaction: transaction.clone(),
                });
                Ok(transaction)
            }
            Err(reason) => {
                self.stats.incr_reversal_failures();
                self.sink.emit(&TransferEvent::ReversalFailed {
                    from_id,
                    to_id,
                    amount,
                    reason: reason.clone(),
                });
                Err(reason)
            }
        }
    }

    /// Compensate a recorded transaction
    pub fn reverse(&self, transaction: &Transaction) -> Result<Transaction, TransferError> {
        self.try_reverse(
            transaction.from_id(),
            transaction.to_id(),
            transaction.amount(),
        )
    }

    /// Validate arguments and look up both accounts. Takes no locks.
    fn resolve(
        &self,
        source_id: AccountId,
        destination_id: AccountId,
        amount: Amount,
    ) -> Result<(&Account, &Account), TransferError> {
        if amount <= Amount::ZERO {
            return Err(TransferError::InvalidAmount);
        }
        if source_id == destination_id {
            return Err(TransferError::SameAccount);
        }
        Ok((self.get(source_id)?, self.get(destination_id)?))
    }

    // ============================================================
    // READ-ONLY VIEWS
    // ============================================================

    /// Look up an account (read access only)
    pub fn account(&self, id: AccountId) -> Option<&Account> {
        self.accounts.get(&id)
    }

    fn get(&self, id: AccountId) -> Result<&Account, TransferError> {
        self.account(id).ok_or(TransferError::AccountNotFound(id))
    }

    /// Account ids in ascending order
    pub fn account_ids(&self) -> &[AccountId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn balance_of(&self, id: AccountId) -> Result<Amount, TransferError> {
        self.get(id)?.balance()
    }

    pub fn history_of(&self, id: AccountId) -> Result<Vec<Transaction>, TransferError> {
        self.get(id)?.history_snapshot()
    }

    /// Balance of every account.
    ///
    /// Each account is read under its own lock, one after another. This is
    /// not an atomic snapshot of the whole registry.
    pub fn balances_snapshot(&self) -> Result<BTreeMap<AccountId, Amount>, TransferError> {
        self.ids
            .iter()
            .map(|id| -> Result<_, TransferError> { Ok((*id, self.get(*id)?.balance()?)) })
            .collect()
    }

    /// History of every account, ascending by id (same consistency as
    /// [`balances_snapshot`](Self::balances_snapshot))
    pub fn history_report(&self) -> Result<Vec<AccountHistory>, TransferError> {
        self.ids
            .iter()
            .map(|id| -> Result<_, TransferError> {
                Ok(AccountHistory {
                    account_id: *id,
                    transactions: self.get(*id)?.history_snapshot()?,
                })
            })
            .collect()
    }

    /// Per-account summaries, ascending by id
    pub fn summaries(&self) -> Result<Vec<AccountSummary>, TransferError> {
        self.ids.iter().map(|id| self.get(*id)?.summary()).collect()
    }

    /// Sum of all balances. Only meaningful while no transfer is in flight.
    pub fn total_balance(&self) -> Result<Amount, TransferError> {
        self.balances_snapshot()?
            .values()
            .try_fold(Amount::ZERO, |acc, b| {
                acc.checked_add(*b).ok_or(TransferError::Overflow)
            })
    }

    /// Sum of opening balances
    pub fn total_opening_balance(&self) -> Result<Amount, TransferError> {
        self.accounts
            .values()
            .try_fold(Amount::ZERO, |acc, a| {
                acc.checked_add(a.opening_balance())
                    .ok_or(TransferError::Overflow)
            })
    }

    /// Check every account's balance against its own history
    pub fn reconcile_all(&self) -> Result<(), TransferError> {
        for id in &self.ids {
            self.get(*id)?.reconcile()?;
        }
        Ok(())
    }

    pub fn stats(&self) -> TransferStatsSnapshot {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingEventSink;
    use crate::state::TransferState;
    use rust_decimal::Decimal;

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    /// Accounts {1:1000, 2:2000, 3:3000}
    fn setup() -> (TransferCoordinator, Arc<RecordingEventSink>) {
        let sink = Arc::new(RecordingEventSink::new());
        let coordinator = TransferCoordinator::new(
            vec![
                Account::new(1, d(1000)),
                Account::new(2, d(2000)),
                Account::new(3, d(3000)),
            ],
            sink.clone(),
        )
        .unwrap();
        (coordinator, sink)
    }

    fn balances(c: &TransferCoordinator) -> Vec<Decimal> {
        c.balances_snapshot().unwrap().into_values().collect()
    }

    // ========================================================================
    // Happy Path
    // ========================================================================

    #[test]
    fn test_end_to_end_sequence() {
        let (c, _) = setup();

        assert!(c.transfer(1, 2, d(100)));
        assert!(c.transfer(2, 3, d(200)));
        assert!(c.transfer(3, 1, d(50)));

        assert_eq!(balances(&c), vec![d(950), d(1900), d(3150)]);

        // Each account took part in exactly two transfers, in commit order
        let h1 = c.history_of(1).unwrap();
        let h2 = c.history_of(2).unwrap();
        let h3 = c.history_of(3).unwrap();
        assert_eq!(h1.len(), 2);
        assert_eq!(h2.len(), 2);
        assert_eq!(h3.len(), 2);
        assert_eq!((h1[0].from_id(), h1[0].to_id()), (1, 2));
        assert_eq!((h1[1].from_id(), h1[1].to_id()), (3, 1));
        assert_eq!((h2[0].from_id(), h2[0].to_id()), (1, 2));
        assert_eq!((h2[1].from_id(), h2[1].to_id()), (2, 3));
        assert_eq!((h3[0].from_id(), h3[0].to_id()), (2, 3));
        assert_eq!((h3[1].from_id(), h3[1].to_id()), (3, 1));

        // Same record on both sides
        assert_eq!(h1[0], h2[0]);

        assert_eq!(c.total_balance().unwrap(), d(6000));
        assert!(c.reconcile_all().is_ok());
        assert_eq!(c.stats().committed, 3);
    }

    #[test]
    fn test_transfer_to_lower_id_locks_in_order() {
        let (c, _) = setup();
        let tx = c.try_transfer(3, 1, d(500)).unwrap();
        assert_eq!(tx.kind(), TransactionKind::Transfer);
        assert_eq!(tx.from_id(), 3);
        assert_eq!(tx.to_id(), 1);
        assert_eq!(c.balance_of(3).unwrap(), d(2500));
        assert_eq!(c.balance_of(1).unwrap(), d(1500));
    }

    #[test]
    fn test_transfer_entire_balance() {
        let (c, _) = setup();
        assert!(c.transfer(1, 2, d(1000)));
        assert_eq!(c.balance_of(1).unwrap(), Decimal::ZERO);
        assert!(!c.transfer(1, 2, Decimal::new(1, 2)));
    }

    #[test]
    fn test_fractional_amounts() {
        let (c, _) = setup();
        assert!(c.transfer(1, 2, Decimal::new(1050, 2))); // 10.50
        assert_eq!(c.balance_of(1).unwrap(), Decimal::new(98950, 2));
        assert_eq!(c.balance_of(2).unwrap(), Decimal::new(201050, 2));
    }

    // ========================================================================
    // Rejections leave state unchanged
    // ========================================================================

    #[test]
    fn test_same_account_is_noop() {
        let (c, sink) = setup();
        assert_eq!(
            c.try_transfer(1, 1, d(50)).unwrap_err(),
            TransferError::SameAccount
        );
        assert!(!c.transfer(1, 1, d(150)));
        assert_eq!(balances(&c), vec![d(1000), d(2000), d(3000)]);
        assert!(c.history_report().unwrap().iter().all(|h| h.transactions.is_empty()));

        // Rejected before initiation
        assert_eq!(sink.count("transfer_initiated"), 0);
        assert_eq!(sink.events()[0].state(), TransferState::AbortedInvalid);
    }

    #[test]
    fn test_non_positive_amount_is_noop() {
        let (c, _) = setup();
        assert_eq!(
            c.try_transfer(1, 2, Decimal::ZERO).unwrap_err(),
            TransferError::InvalidAmount
        );
        assert_eq!(
            c.try_transfer(1, 2, d(-10)).unwrap_err(),
            TransferError::InvalidAmount
        );
        assert_eq!(balances(&c), vec![d(1000), d(2000), d(3000)]);
    }

    #[test]
    fn test_unknown_account_is_noop() {
        let (c, sink) = setup();
        assert_eq!(
            c.try_transfer(99, 1, d(10)).unwrap_err(),
            TransferError::AccountNotFound(99)
        );
        assert_eq!(
            c.try_transfer(1, 99, d(10)).unwrap_err(),
            TransferError::AccountNotFound(99)
        );
        assert_eq!(balances(&c), vec![d(1000), d(2000), d(3000)]);
        assert_eq!(c.history_of(1).unwrap().len(), 0);
        assert_eq!(sink.count("transfer_initiated"), 0);
        assert_eq!(c.stats().rejected_invalid, 2);
    }

    #[test]
    fn test_insufficient_funds_is_noop() {
        let (c, sink) = setup();
        assert_eq!(
            c.try_transfer(3, 1, d(50000)).unwrap_err(),
            TransferError::InsufficientFunds {
                account_id: 3,
                available: d(3000),
                requested: d(50000),
            }
        );
        assert_eq!(c.balance_of(3).unwrap(), d(3000));
        assert!(c.history_of(3).unwrap().is_empty());
        assert!(c.history_of(1).unwrap().is_empty());

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name(), "transfer_initiated");
        assert_eq!(events[1].state(), TransferState::AbortedInsufficientFunds);
        assert_eq!(c.stats().rejected_insufficient, 1);
    }

    #[test]
    fn test_overflow_aborts_without_mutation() {
        let sink = Arc::new(RecordingEventSink::new());
        let c = TransferCoordinator::new(
            vec![Account::new(1, d(10)), Account::new(2, Decimal::MAX)],
            sink,
        )
        .unwrap();

        assert_eq!(c.try_transfer(1, 2, d(5)).unwrap_err(), TransferError::Overflow);
        assert_eq!(c.balance_of(1).unwrap(), d(10));
        assert_eq!(c.balance_of(2).unwrap(), Decimal::MAX);
        assert!(c.history_of(1).unwrap().is_empty());
        assert_eq!(c.stats().aborted_other, 1);
    }

    #[test]
    fn test_duplicate_account_rejected() {
        let result = TransferCoordinator::new(
            vec![Account::new(1, d(1)), Account::new(1, d(2))],
            Arc::new(RecordingEventSink::new()),
        );
        assert_eq!(result.err(), Some(TransferError::DuplicateAccount(1)));
    }

    // ========================================================================
    // Reversal
    // ========================================================================

    #[test]
    fn test_reverse_restores_balances() {
        let (c, sink) = setup();
        let original = c.try_transfer(1, 2, d(100)).unwrap();

        let reversal = c.reverse(&original).unwrap();
        assert_eq!(reversal.kind(), TransactionKind::Reversal);
        assert_eq!(reversal.from_id(), 2);
        assert_eq!(reversal.to_id(), 1);
        assert_eq!(reversal.amount(), d(100));

        assert_eq!(balances(&c), vec![d(1000), d(2000), d(3000)]);

        // Original record is kept; the reversal is appended after it
        let h1 = c.history_of(1).unwrap();
        assert_eq!(h1.len(), 2);
        assert_eq!(h1[0], original);
        assert_eq!(h1[1], reversal);
        assert!(c.reconcile_all().is_ok());

        assert_eq!(sink.count("reversal_attempted"), 1);
        assert_eq!(sink.count("reversal_committed"), 1);
        assert_eq!(c.stats().reversals, 1);
    }

    #[test]
    fn test_reverse_insufficient_destination_is_noop() {
        let (c, sink) = setup();
        assert!(c.transfer(1, 2, d(100)));
        // Account 2 spends everything it has
        assert!(c.transfer(2, 3, d(2100)));

        c.reverse_transaction(1, 2, d(100));

        assert_eq!(balances(&c), vec![d(900), d(0), d(5100)]);
        assert_eq!(c.history_of(1).unwrap().len(), 1);
        assert_eq!(c.history_of(2).unwrap().len(), 2);
        assert_eq!(
            c.try_reverse(1, 2, d(100)).unwrap_err(),
            TransferError::ReversalFailure {
                from_id: 1,
                to_id: 2,
                amount: d(100),
                available: d(0),
            }
        );
        assert_eq!(sink.count("reversal_failed"), 2);
        assert_eq!(c.stats().reversal_failures, 2);
    }

    #[test]
    fn test_reverse_invalid_request() {
        let (c, _) = setup();
        assert_eq!(
            c.try_reverse(1, 1, d(10)).unwrap_err(),
            TransferError::SameAccount
        );
        assert_eq!(
            c.try_reverse(1, 42, d(10)).unwrap_err(),
            TransferError::AccountNotFound(42)
        );
        assert_eq!(balances(&c), vec![d(1000), d(2000), d(3000)]);
    }

    // ========================================================================
    // Reads
    // ========================================================================

    #[test]
    fn test_reads_are_idempotent() {
        let (c, sink) = setup();
        assert!(c.transfer(2, 1, d(20)));
        let events_before = sink.events().len();

        let b1 = c.balance_of(1).unwrap();
        let h1 = c.history_of(1).unwrap();
        let snap = c.balances_snapshot().unwrap();
        assert_eq!(c.balance_of(1).unwrap(), b1);
        assert_eq!(c.history_of(1).unwrap(), h1);
        assert_eq!(c.balances_snapshot().unwrap(), snap);

        // Reads emit nothing
        assert_eq!(sink.events().len(), events_before);
    }

    #[test]
    fn test_balance_of_unknown() {
        let (c, _) = setup();
        assert_eq!(c.balance_of(7), Err(TransferError::AccountNotFound(7)));
        assert_eq!(c.history_of(7), Err(TransferError::AccountNotFound(7)));
    }

    #[test]
    fn test_reports_are_sorted() {
        let sink = Arc::new(RecordingEventSink::new());
        let c = TransferCoordinator::new(
            vec![Account::new(30, d(3)), Account::new(10, d(1)), Account::new(20, d(2))],
            sink,
        )
        .unwrap();
        assert_eq!(c.account_ids(), &[10, 20, 30]);
        let ids: Vec<_> = c.history_report().unwrap().iter().map(|h| h.account_id).collect();
        assert_eq!(ids, vec![10, 20, 30]);
        let summaries = c.summaries().unwrap();
        assert_eq!(summaries[2].balance, d(3));
        assert_eq!(c.total_opening_balance().unwrap(), d(6));
        assert_eq!(c.len(), 3);
        assert!(!c.is_empty());
    }
}

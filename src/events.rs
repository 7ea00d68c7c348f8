//! Transfer Events
//!
//! The coordinator reports what happens to each attempt as a
//! [`TransferEvent`] delivered to an [`EventSink`] injected at construction.
//! The core never formats or persists log lines itself.

use std::sync::Mutex;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::core_types::{AccountId, Amount};
use crate::error::TransferError;
use crate::state::TransferState;
use crate::transaction::Transaction;

/// Semantic event emitted by the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TransferEvent {
    /// Request passed validation; locks are about to be taken
    Initiated {
        from_id: AccountId,
        to_id: AccountId,
        amount: Amount,
    },
    /// Funds moved and both histories updated
    Committed { transaction: Transaction },
    /// Request refused; no state changed
    Rejected {
        from_id: AccountId,
        to_id: AccountId,
        amount: Amount,
        #[serde(serialize_with = "serialize_error")]
        reason: TransferError,
    },
    /// Compensating transfer requested (original direction given)
    ReversalAttempted {
        from_id: AccountId,
        to_id: AccountId,
        amount: Amount,
    },
    /// Compensating transfer committed
    Reversed { transaction: Transaction },
    /// Compensating transfer could not run; ledger needs operator attention
    ReversalFailed {
        from_id: AccountId,
        to_id: AccountId,
        amount: Amount,
        #[serde(serialize_with = "serialize_error")]
        reason: TransferError,
    },
}

fn serialize_error<S: serde::Serializer>(err: &TransferError, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(err.code())
}

impl TransferEvent {
    /// State of the attempt at the time the event was emitted
    pub fn state(&self) -> TransferState {
        match self {
            TransferEvent::Initiated { .. } => TransferState::Validating,
            TransferEvent::Committed { .. } | TransferEvent::Reversed { .. } => {
                TransferState::Committed
            }
            TransferEvent::Rejected { reason, .. } => match reason {
                TransferError::InsufficientFunds { .. } => TransferState::AbortedInsufficientFunds,
                _ => TransferState::AbortedInvalid,
            },
            TransferEvent::ReversalAttempted { .. } => TransferState::ReversalAttempted,
            TransferEvent::ReversalFailed { reason, .. } => match reason {
                TransferError::ReversalFailure { .. } => TransferState::AbortedInsufficientFunds,
                _ => TransferState::AbortedInvalid,
            },
        }
    }

    /// Short event name for logs
    pub fn name(&self) -> &'static str {
        match self {
            TransferEvent::Initiated { .. } => "transfer_initiated",
            TransferEvent::Committed { .. } => "transfer_committed",
            TransferEvent::Rejected { .. } => "transfer_rejected",
            TransferEvent::ReversalAttempted { .. } => "reversal_attempted",
            TransferEvent::Reversed { .. } => "reversal_committed",
            TransferEvent::ReversalFailed { .. } => "reversal_failed",
        }
    }
}

/// Receiver for coordinator events
///
/// Called from whichever thread performed the operation, sometimes while
/// account locks are held. Implementations must not call back into the
/// coordinator.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &TransferEvent);
}

/// Renders events through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &TransferEvent) {
        match event {
            TransferEvent::Initiated {
                from_id,
                to_id,
                amount,
            } => {
                info!(from_id, to_id, %amount, "Initiating transfer");
            }
            TransferEvent::Committed { transaction } => {
                info!(
                    tx_id = %transaction.id(),
                    from_id = transaction.from_id(),
                    to_id = transaction.to_id(),
                    amount = %transaction.amount(),
                    "Transfer committed"
                );
            }
            TransferEvent::Rejected {
                from_id,
                to_id,
                amount,
                reason,
            } => {
                warn!(from_id, to_id, %amount, code = reason.code(), "Transfer failed: {}", reason);
            }
            TransferEvent::ReversalAttempted {
                from_id,
                to_id,
                amount,
            } => {
                warn!(from_id, to_id, %amount, "Attempting reversal");
            }
            TransferEvent::Reversed { transaction } => {
                info!(
                    tx_id = %transaction.id(),
                    from_id = transaction.from_id(),
                    to_id = transaction.to_id(),
                    amount = %transaction.amount(),
                    "Reversal committed"
                );
            }
            TransferEvent::ReversalFailed {
                from_id,
                to_id,
                amount,
                reason,
            } => {
                error!(from_id, to_id, %amount, code = reason.code(), "Reversal failed: {}", reason);
            }
        }
    }
}

/// Keeps every event in memory, in emission order
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<TransferEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all events recorded so far
    pub fn events(&self) -> Vec<TransferEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Number of recorded events with the given name
    pub fn count(&self, name: &str) -> usize {
        self.events().iter().filter(|e| e.name() == name).count()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: &TransferEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}

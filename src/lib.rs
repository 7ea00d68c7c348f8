//! Concurrent Banking - deadlock-free funds transfers
//!
//! Many threads move money between accounts through one shared
//! [`TransferCoordinator`]. Every account is independently locked; a
//! transfer locks its two accounts lowest id first, checks funds and
//! commits under both locks, and records one [`Transaction`] in both
//! accounts' append-only histories.
//!
//! # Modules
//!
//! - [`core_types`] - AccountId, Amount
//! - [`account`] - Account: balance + ledger behind a reader/writer lock
//! - [`transaction`] - Immutable transaction records
//! - [`coordinator`] - Registry, ordered pair locking, transfer/reversal, reports
//! - [`state`] - Per-attempt transfer states
//! - [`events`] - Semantic events and injected sinks
//! - [`error`] - TransferError
//! - [`stats`] - Outcome counters
//! - [`config`] - YAML application config
//! - [`logging`] - tracing subscriber setup

// Core types - must be first!
pub mod core_types;

pub mod account;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod state;
pub mod stats;
pub mod transaction;

// Application plumbing
pub mod config;
pub mod logging;

// Convenient re-exports at crate root
pub use account::{Account, AccountSummary};
pub use coordinator::{AccountHistory, TransferCoordinator};
pub use core_types::{AccountId, Amount};
pub use error::TransferError;
pub use events::{EventSink, RecordingEventSink, TracingEventSink, TransferEvent};
pub use state::TransferState;
pub use stats::TransferStatsSnapshot;
pub use transaction::{Transaction, TransactionId, TransactionKind};

//! Core types used throughout the system
//!
//! These are fundamental type aliases used by all modules.

/// Account ID - unique, immutable after the registry is built.
///
/// # Lock Ordering:
/// The natural ordering of `AccountId` is the global lock order.
/// Any code that holds two account locks at once MUST have acquired
/// the lower id first.
pub type AccountId = u64;

/// Monetary amount (signed fixed-point decimal)
pub type Amount = rust_decimal::Decimal;

//! Monetary amounts.

/// Signed amount in the ledger's smallest unit.
///
/// Balances are allowed to go negative (fault injection, advisory balance
/// checks); operation amounts are required to be non-negative.
pub type Amount = i64;

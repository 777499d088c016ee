//! Simulation metrics.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::Serialize;

use branchledger_common::{Amount, LedgerError};

/// Kind of teller operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Deposit,
    Withdraw,
    Transfer,
}

/// Counters shared by all workers.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Successful deposits.
    pub deposits: AtomicU64,
    /// Successful withdrawals.
    pub withdrawals: AtomicU64,
    /// Successful transfers.
    pub transfers: AtomicU64,
    /// Operations refused for lack of funds.
    pub insufficient_funds: AtomicU64,
    /// Operations naming an unknown account.
    pub account_not_found: AtomicU64,
    /// Money that entered minus money that left the bank.
    net_flow: AtomicI64,
}

impl Metrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one operation.
    ///
    /// Must be called before the worker reaches a report checkpoint so the
    /// net flow matches the balances the checkpoint sees.
    pub fn record(&self, kind: OperationKind, amount: Amount, outcome: &Result<(), LedgerError>) {
        match outcome {
            Ok(()) => match kind {
                OperationKind::Deposit => {
                    self.deposits.fetch_add(1, Ordering::Relaxed);
                    self.net_flow.fetch_add(amount, Ordering::SeqCst);
                }
                OperationKind::Withdraw => {
                    self.withdrawals.fetch_add(1, Ordering::Relaxed);
                    self.net_flow.fetch_sub(amount, Ordering::SeqCst);
                }
                OperationKind::Transfer => {
                    self.transfers.fetch_add(1, Ordering::Relaxed);
                }
            },
            Err(LedgerError::InsufficientFunds { .. }) => {
                self.insufficient_funds.fetch_add(1, Ordering::Relaxed);
            }
            Err(LedgerError::AccountNotFound(_)) => {
                self.account_not_found.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {}
        }
    }

    /// Net external flow so far.
    pub fn net_flow(&self) -> Amount {
        self.net_flow.load(Ordering::SeqCst)
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            deposits: self.deposits.load(Ordering::Relaxed),
            withdrawals: self.withdrawals.load(Ordering::Relaxed),
            transfers: self.transfers.load(Ordering::Relaxed),
            insufficient_funds: self.insufficient_funds.load(Ordering::Relaxed),
            account_not_found: self.account_not_found.load(Ordering::Relaxed),
            net_flow: self.net_flow(),
        }
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub deposits: u64,
    pub withdrawals: u64,
    pub transfers: u64,
    pub insufficient_funds: u64,
    pub account_not_found: u64,
    pub net_flow: Amount,
}

impl MetricsSnapshot {
    /// Operations attempted.
    pub fn total_operations(&self) -> u64 {
        self.deposits
            + self.withdrawals
            + self.transfers
            + self.insufficient_funds
            + self.account_not_found
    }

    /// Get success rate.
    pub fn success_rate(&self) -> f64 {
        let total = self.total_operations();
        if total == 0 {
            return 0.0;
        }

        (self.deposits + self.withdrawals + self.transfers) as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use branchledger_common::AccountNumber;

    #[test]
    fn test_metrics() {
        let metrics = Metrics::new();
        let account = AccountNumber::from_raw(1);

        metrics.record(OperationKind::Deposit, 100, &Ok(()));
        metrics.record(OperationKind::Withdraw, 30, &Ok(()));
        metrics.record(OperationKind::Transfer, 50, &Ok(()));
        metrics.record(
            OperationKind::Withdraw,
            500,
            &Err(LedgerError::InsufficientFunds {
                account,
                requested: 500,
                available: 70,
            }),
        );

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.deposits, 1);
        assert_eq!(snapshot.withdrawals, 1);
        assert_eq!(snapshot.transfers, 1);
        assert_eq!(snapshot.insufficient_funds, 1);
        assert_eq!(snapshot.net_flow, 70);
        assert_eq!(snapshot.total_operations(), 4);
        assert_eq!(snapshot.success_rate(), 0.75);
    }
}

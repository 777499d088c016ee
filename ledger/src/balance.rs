//! Point-in-time balance snapshots.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use branchledger_common::{AccountNumber, Amount, BranchId};

use crate::bank::Bank;
use crate::branch::BranchGuard;

/// Unique identifier for a snapshot.
/// Uses UUID v7 so snapshots sort by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotId(Uuid);

impl SnapshotId {
    /// Create a new snapshot ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Balance of one account at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    /// Account number.
    pub account: AccountNumber,
    /// Balance.
    pub balance: Amount,
}

/// Balances of one branch at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchSnapshot {
    /// Branch identifier.
    pub branch_id: BranchId,
    /// Aggregate balance.
    pub aggregate: Amount,
    /// Account balances in subaccount order.
    pub accounts: Vec<AccountBalance>,
}

impl BranchSnapshot {
    /// Sum of the account balances.
    pub fn account_total(&self) -> Amount {
        self.accounts.iter().map(|a| a.balance).sum()
    }
}

/// Balances of the whole bank at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankSnapshot {
    /// Snapshot identifier.
    pub id: SnapshotId,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
    /// Branches in id order.
    pub branches: Vec<BranchSnapshot>,
}

impl BankSnapshot {
    /// Sum of the branch aggregates.
    pub fn total(&self) -> Amount {
        self.branches.iter().map(|b| b.aggregate).sum()
    }

    /// Sum of every account balance.
    pub fn account_total(&self) -> Amount {
        self.branches.iter().map(BranchSnapshot::account_total).sum()
    }

    /// List every difference between two snapshots of banks.
    pub fn compare(&self, other: &BankSnapshot) -> Vec<Discrepancy> {
        if self.branches.len() != other.branches.len() {
            return vec![Discrepancy::Shape {
                left_branches: self.branches.len(),
                right_branches: other.branches.len(),
            }];
        }

        let mut discrepancies = Vec::new();
        for (left, right) in self.branches.iter().zip(&other.branches) {
            if left.accounts.len() != right.accounts.len() {
                discrepancies.push(Discrepancy::BranchShape {
                    branch_id: left.branch_id,
                    left_accounts: left.accounts.len(),
                    right_accounts: right.accounts.len(),
                });
                continue;
            }

            if left.aggregate != right.aggregate {
                discrepancies.push(Discrepancy::Branch {
                    branch_id: left.branch_id,
                    left: left.aggregate,
                    right: right.aggregate,
                });
            }

            for (a, b) in left.accounts.iter().zip(&right.accounts) {
                if a.balance != b.balance {
                    discrepancies.push(Discrepancy::Account {
                        account: a.account,
                        left: a.balance,
                        right: b.balance,
                    });
                }
            }
        }
        discrepancies
    }
}

/// A difference found by [`BankSnapshot::compare`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Discrepancy {
    /// Different number of branches.
    Shape {
        left_branches: usize,
        right_branches: usize,
    },
    /// Different number of accounts in a branch.
    BranchShape {
        branch_id: BranchId,
        left_accounts: usize,
        right_accounts: usize,
    },
    /// Branch aggregates differ.
    Branch {
        branch_id: BranchId,
        left: Amount,
        right: Amount,
    },
    /// Account balances differ.
    Account {
        account: AccountNumber,
        left: Amount,
        right: Amount,
    },
}

impl Bank {
    /// Capture all balances.
    ///
    /// Holds the bank lock and every branch lock (ascending) while reading, so
    /// no deposit, withdrawal or cross-branch transfer is in flight. A
    /// same-branch transfer takes neither lock and may be caught between its
    /// debit and credit; snapshot a quiescent bank when per-account exactness
    /// matters.
    pub fn snapshot(&self) -> BankSnapshot {
        let _bank = self.lock_global();
        let guards: Vec<BranchGuard<'_>> = self.branches().iter().map(|b| b.lock()).collect();

        let branches = self
            .branches()
            .iter()
            .zip(&guards)
            .map(|(branch, guard)| BranchSnapshot {
                branch_id: branch.id(),
                aggregate: guard.balance(),
                accounts: branch
                    .accounts()
                    .iter()
                    .map(|account| AccountBalance {
                        account: account.number(),
                        balance: account.balance(),
                    })
                    .collect(),
            })
            .collect();

        let snapshot = BankSnapshot {
            id: SnapshotId::new(),
            taken_at: Utc::now(),
            branches,
        };
        debug!(snapshot_id = %snapshot.id, total = snapshot.total(), "Snapshot taken");
        snapshot
    }
}

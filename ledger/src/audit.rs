//! Ledger consistency audits.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use branchledger_common::{AccountNumber, Amount, BranchId, LedgerError, Result};

use crate::bank::Bank;

/// A single problem found by an audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditIssue {
    /// Account balance below zero.
    NegativeBalance { account: AccountNumber, balance: Amount },
    /// Branch aggregate does not match its accounts.
    BranchMismatch {
        branch_id: BranchId,
        aggregate: Amount,
        account_total: Amount,
    },
    /// Bank total does not match what the caller expected.
    TotalMismatch { expected: Amount, actual: Amount },
}

/// Outcome of [`Bank::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    /// Total balance at audit time.
    pub total: Amount,
    /// Issues found, in branch order.
    pub issues: Vec<AuditIssue>,
}

impl AuditReport {
    /// Check if the audit found nothing.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Turn a dirty report into an error.
    pub fn into_result(self) -> Result<Amount> {
        if self.is_clean() {
            return Ok(self.total);
        }
        Err(LedgerError::ValidationFailed(format!(
            "{} issue(s), first: {:?}",
            self.issues.len(),
            self.issues[0]
        )))
    }
}

impl Bank {
    /// Audit the ledger.
    ///
    /// Checks for negative balances, for branch aggregates that disagree with
    /// their accounts and, when given, for a total other than
    /// `expected_total`. Runs against a snapshot; meant for a quiescent bank.
    pub fn validate(&self, expected_total: Option<Amount>) -> AuditReport {
        let snapshot = self.snapshot();
        let mut issues = Vec::new();

        for branch in &snapshot.branches {
            for account in &branch.accounts {
                if account.balance < 0 {
                    issues.push(AuditIssue::NegativeBalance {
                        account: account.account,
                        balance: account.balance,
                    });
                }
            }

            let account_total = branch.account_total();
            if account_total != branch.aggregate {
                issues.push(AuditIssue::BranchMismatch {
                    branch_id: branch.branch_id,
                    aggregate: branch.aggregate,
                    account_total,
                });
            }
        }

        let total = snapshot.total();
        if let Some(expected) = expected_total {
            if expected != total {
                issues.push(AuditIssue::TotalMismatch { expected, actual: total });
            }
        }

        for issue in &issues {
            warn!(?issue, "Audit issue");
        }
        info!(total, issues = issues.len(), "Audit complete");

        AuditReport { total, issues }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;

    #[test]
    fn test_clean_bank() {
        let bank = Bank::with_dimensions(2, 4, 100).unwrap();
        let report = bank.validate(Some(800));
        assert!(report.is_clean());
        assert_eq!(report.into_result(), Ok(800));
    }

    #[test]
    fn test_fault_injection_is_reported() {
        let mut config = LedgerConfig::with_dimensions(1, 5, 100);
        config.fault_injection = true;
        let bank = Bank::new(&config).unwrap();

        let report = bank.validate(Some(config.expected_total()));
        assert_eq!(
            report.issues,
            vec![
                AuditIssue::NegativeBalance {
                    account: bank.account_number(0, 0).unwrap(),
                    balance: -1,
                },
                AuditIssue::NegativeBalance {
                    account: bank.account_number(0, 4).unwrap(),
                    balance: -1,
                },
                AuditIssue::TotalMismatch { expected: 500, actual: 298 },
            ]
        );
        assert!(matches!(
            report.into_result(),
            Err(LedgerError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_branch_mismatch_is_reported() {
        let bank = Bank::with_dimensions(2, 2, 10).unwrap();
        // Adjust an account without propagating to its branch.
        let account = bank.lookup_account(bank.account_number(1, 1).unwrap()).unwrap();
        account.adjust(5, None);

        let report = bank.validate(None);
        assert_eq!(
            report.issues,
            vec![AuditIssue::BranchMismatch {
                branch_id: 1,
                aggregate: 20,
                account_total: 25,
            }]
        );
    }
}

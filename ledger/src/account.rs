//! Account balance cells.

use parking_lot::Mutex;
use tracing::trace;

use branchledger_common::{AccountNumber, Amount, LedgerError, Result};

use crate::branch::BranchGuard;

/// A single account. The balance lives behind the account's own lock.
#[derive(Debug)]
pub struct Account {
    /// Account number.
    number: AccountNumber,
    /// Current balance.
    balance: Mutex<Amount>,
}

impl Account {
    /// Create a new account with an opening balance.
    pub(crate) fn new(number: AccountNumber, initial_amount: Amount) -> Self {
        Self {
            number,
            balance: Mutex::new(initial_amount),
        }
    }

    /// Get the account number.
    pub fn number(&self) -> AccountNumber {
        self.number
    }

    /// Read the balance.
    ///
    /// The value was current at some instant during the call; it may be stale
    /// by the time the caller looks at it.
    pub fn balance(&self) -> Amount {
        *self.balance.lock()
    }

    /// Add `delta` to the balance, unchecked.
    ///
    /// When `branch` is given the same delta is applied to the branch
    /// aggregate. Holding the guard is what proves the caller owns the branch
    /// lock; any bank-level exclusion a compound operation needs must also be
    /// held before calling.
    ///
    /// # Panics
    ///
    /// Panics if the balance overflows, in every build profile.
    pub(crate) fn adjust(&self, delta: Amount, branch: Option<&mut BranchGuard<'_>>) {
        {
            let mut balance = self.balance.lock();
            match balance.checked_add(delta) {
                Some(updated) => *balance = updated,
                None => panic!(
                    "balance {} of account {} overflows adding {}",
                    *balance, self.number, delta
                ),
            }
        }
        trace!(account = %self.number, delta, "Account adjusted");

        if let Some(branch) = branch {
            self.propagate(branch, delta);
        }
    }

    /// Subtract `amount` only if the balance covers it, in one critical section.
    pub(crate) fn debit_checked(
        &self,
        amount: Amount,
        branch: Option<&mut BranchGuard<'_>>,
    ) -> Result<()> {
        {
            let mut balance = self.balance.lock();
            if amount > *balance {
                return Err(LedgerError::InsufficientFunds {
                    account: self.number,
                    requested: amount,
                    available: *balance,
                });
            }
            *balance -= amount;
        }
        trace!(account = %self.number, delta = -amount, "Account debited");

        if let Some(branch) = branch {
            self.propagate(branch, -amount);
        }
        Ok(())
    }

    fn propagate(&self, branch: &mut BranchGuard<'_>, delta: Amount) {
        debug_assert_eq!(
            branch.branch_id(),
            self.number.branch_id(),
            "branch guard does not own account {}",
            self.number
        );
        branch.update_balance(delta);
    }
}

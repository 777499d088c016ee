//! Branches: fixed sets of accounts with a running aggregate balance.

use parking_lot::{Mutex, MutexGuard};

use branchledger_common::{AccountNumber, Amount, BranchId, Result};

use crate::account::Account;

/// A branch of the bank.
#[derive(Debug)]
pub struct Branch {
    /// Branch identifier.
    id: BranchId,
    /// Accounts indexed by subaccount.
    accounts: Vec<Account>,
    /// Aggregate balance. The mutex doubles as the branch lock.
    aggregate: Mutex<Amount>,
}

impl Branch {
    /// Create a branch with `num_accounts` accounts opened at `initial_amount`.
    ///
    /// With `fault_injection` every account whose index is a multiple of four
    /// opens at -1. The aggregate is the sum of the balances actually opened.
    pub(crate) fn new(
        id: BranchId,
        num_accounts: u32,
        initial_amount: Amount,
        fault_injection: bool,
    ) -> Result<Self> {
        let accounts = (0..num_accounts)
            .map(|sub| {
                let balance = if fault_injection && sub & 0x3 == 0 {
                    -1
                } else {
                    initial_amount
                };
                Ok(Account::new(AccountNumber::new(id, sub)?, balance))
            })
            .collect::<Result<Vec<_>>>()?;

        let aggregate = accounts.iter().map(Account::balance).sum();

        Ok(Self {
            id,
            accounts,
            aggregate: Mutex::new(aggregate),
        })
    }

    /// Get the branch identifier.
    pub fn id(&self) -> BranchId {
        self.id
    }

    /// Get an account by subaccount index.
    pub fn account(&self, subaccount: u32) -> Option<&Account> {
        self.accounts.get(subaccount as usize)
    }

    /// All accounts in subaccount order.
    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// Acquire the branch lock.
    pub fn lock(&self) -> BranchGuard<'_> {
        BranchGuard {
            id: self.id,
            aggregate: self.aggregate.lock(),
        }
    }

    /// Read the aggregate balance under the branch lock.
    pub fn balance(&self) -> Amount {
        *self.aggregate.lock()
    }

    /// Sum of the account balances, read one account at a time.
    ///
    /// Only meaningful against the aggregate when the branch is quiescent.
    pub fn account_total(&self) -> Amount {
        self.accounts.iter().map(Account::balance).sum()
    }
}

/// Held branch lock. Released on drop.
#[derive(Debug)]
pub struct BranchGuard<'a> {
    id: BranchId,
    aggregate: MutexGuard<'a, Amount>,
}

impl BranchGuard<'_> {
    /// Branch this guard locks.
    pub fn branch_id(&self) -> BranchId {
        self.id
    }

    /// Aggregate balance as seen under the lock.
    pub fn balance(&self) -> Amount {
        *self.aggregate
    }

    /// Apply a delta to the aggregate balance.
    ///
    /// # Panics
    ///
    /// Panics if the aggregate overflows.
    pub(crate) fn update_balance(&mut self, delta: Amount) {
        match self.aggregate.checked_add(delta) {
            Some(balance) => *self.aggregate = balance,
            None => panic!(
                "branch {} aggregate {} overflows adding {}",
                self.id, *self.aggregate, delta
            ),
        }
    }
}

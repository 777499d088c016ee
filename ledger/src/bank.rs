//! The bank: owner of all branches and of the bank-wide lock.

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, info};

use branchledger_common::{AccountNumber, Amount, BranchId, LedgerError, Result};

use crate::account::Account;
use crate::branch::Branch;
use crate::config::{BalanceCheck, LedgerConfig};

/// State guarded by the bank-wide lock.
///
/// The lock itself serializes global reads against cross-branch transfers;
/// the fields only serve the report rendezvous.
#[derive(Debug, Default)]
pub(crate) struct ReportState {
    /// Participants parked at the current checkpoint.
    arrived: usize,
    /// Completed checkpoints.
    generation: u64,
    /// Total recorded by the last completed checkpoint.
    last_total: Amount,
}

/// Held bank-wide lock.
pub(crate) type BankGuard<'a> = MutexGuard<'a, ReportState>;

/// A multi-branch bank.
///
/// Lock order, whenever more than one lock is held: bank, then branches in
/// ascending id, then accounts.
#[derive(Debug)]
pub struct Bank {
    /// Branches indexed by branch id.
    branches: Vec<Branch>,
    /// Accounts in every branch.
    accounts_per_branch: u32,
    /// Opening total before fault injection.
    nominal_total: Amount,
    /// Balance check contract used by tellers.
    balance_check: BalanceCheck,
    /// Bank-wide lock.
    lock: Mutex<ReportState>,
    /// Wakes participants parked at a report checkpoint.
    report_signal: Condvar,
}

impl Bank {
    /// Build a bank from configuration.
    pub fn new(config: &LedgerConfig) -> Result<Self> {
        config.validate()?;

        let branches = (0..config.num_branches)
            .map(|id| {
                Branch::new(
                    id,
                    config.accounts_per_branch,
                    config.initial_amount,
                    config.fault_injection,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            branches = config.num_branches,
            accounts_per_branch = config.accounts_per_branch,
            initial_amount = config.initial_amount,
            fault_injection = config.fault_injection,
            balance_check = %config.balance_check,
            "Bank initialized"
        );

        Ok(Self {
            branches,
            accounts_per_branch: config.accounts_per_branch,
            nominal_total: config.expected_total(),
            balance_check: config.balance_check,
            lock: Mutex::new(ReportState::default()),
            report_signal: Condvar::new(),
        })
    }

    /// Build a bank with default settings and the given dimensions.
    pub fn with_dimensions(
        num_branches: u32,
        accounts_per_branch: u32,
        initial_amount: Amount,
    ) -> Result<Self> {
        Self::new(&LedgerConfig::with_dimensions(
            num_branches,
            accounts_per_branch,
            initial_amount,
        ))
    }

    /// Number of branches.
    pub fn num_branches(&self) -> u32 {
        self.branches.len() as u32
    }

    /// Accounts in every branch.
    pub fn accounts_per_branch(&self) -> u32 {
        self.accounts_per_branch
    }

    /// Total the bank was configured to open with.
    ///
    /// Differs from the actual opening total only under fault injection.
    pub fn nominal_total(&self) -> Amount {
        self.nominal_total
    }

    /// Balance check contract tellers apply.
    pub fn balance_check(&self) -> BalanceCheck {
        self.balance_check
    }

    /// Get a branch by id.
    pub fn branch(&self, id: BranchId) -> Option<&Branch> {
        self.branches.get(id as usize)
    }

    /// All branches in id order.
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    /// Compose an account number that is known to exist in this bank.
    pub fn account_number(&self, branch: BranchId, subaccount: u32) -> Result<AccountNumber> {
        let number = AccountNumber::new(branch, subaccount)?;
        if branch >= self.num_branches() || subaccount >= self.accounts_per_branch {
            return Err(LedgerError::AccountNotFound(number));
        }
        Ok(number)
    }

    /// Every account number in the bank, branch by branch.
    pub fn account_numbers(&self) -> impl Iterator<Item = AccountNumber> + '_ {
        self.branches
            .iter()
            .flat_map(|branch| branch.accounts().iter().map(Account::number))
    }

    /// Find an account by number.
    pub fn lookup_account(&self, number: AccountNumber) -> Result<&Account> {
        self.branch(number.branch_id())
            .and_then(|branch| branch.account(number.subaccount()))
            .ok_or(LedgerError::AccountNotFound(number))
    }

    /// Read one account's balance.
    pub fn account_balance(&self, number: AccountNumber) -> Result<Amount> {
        Ok(self.lookup_account(number)?.balance())
    }

    /// Sum of all branch aggregates, read under the bank-wide lock.
    ///
    /// Cross-branch transfers hold the same lock, so none is half-applied in
    /// the result. Deposits, withdrawals and same-branch transfers may
    /// interleave; each branch aggregate is read whole under its own lock.
    pub fn total_balance(&self) -> Amount {
        let _guard = self.lock_global();
        self.sum_branch_balances()
    }

    /// Rendezvous of `participants` workers on the bank lock.
    ///
    /// Every caller parks until the last one arrives. The last arrival sums
    /// the branch aggregates while all others are parked, hands the total to
    /// `on_report` under the bank lock, and wakes everybody. All participants
    /// return the same total. Callers must agree on `participants`; a worker
    /// that never arrives leaves the rest parked forever. `on_report` runs
    /// with the bank lock held and must not call back into the bank.
    pub fn report_checkpoint<F>(&self, participants: usize, on_report: F) -> Amount
    where
        F: FnOnce(u64, Amount),
    {
        assert!(participants > 0, "report checkpoint needs participants");

        let mut state = self.lock_global();
        let generation = state.generation;
        state.arrived += 1;

        if state.arrived == participants {
            let total = self.sum_branch_balances();
            on_report(generation, total);

            state.arrived = 0;
            state.last_total = total;
            state.generation += 1;
            debug!(generation, total, "Report checkpoint complete");
            self.report_signal.notify_all();
        } else {
            while state.generation == generation {
                self.report_signal.wait(&mut state);
            }
        }

        state.last_total
    }

    /// Acquire the bank-wide lock.
    pub(crate) fn lock_global(&self) -> BankGuard<'_> {
        self.lock.lock()
    }

    /// Caller holds the bank lock.
    fn sum_branch_balances(&self) -> Amount {
        self.branches.iter().map(Branch::balance).sum()
    }
}

//! Teller operations: deposit, withdraw and transfer.
//!
//! Every operation validates first and fails without taking any lock. Locks
//! are then taken in bank order (bank, lower branch id, higher branch id) and
//! the mutation is delegated to the account, which takes its own lock last.

use tracing::{debug, instrument, trace};

use branchledger_common::{AccountNumber, Amount, BranchId, LedgerError, Result};

use crate::account::Account;
use crate::bank::Bank;
use crate::branch::BranchGuard;
use crate::config::BalanceCheck;

/// Stateless handle performing ledger operations against a bank.
#[derive(Debug, Clone, Copy)]
pub struct Teller<'a> {
    bank: &'a Bank,
}

impl<'a> Teller<'a> {
    /// Create a teller for a bank.
    pub fn new(bank: &'a Bank) -> Self {
        Self { bank }
    }

    /// Deposit money into an account.
    ///
    /// # Panics
    ///
    /// Panics if `amount` is negative, or if it would overflow a balance.
    #[instrument(level = "trace", skip(self, account), fields(account = %account))]
    pub fn deposit(&self, account: AccountNumber, amount: Amount) -> Result<()> {
        assert!(amount >= 0, "deposit amount must be non-negative, got {}", amount);

        let target = self.bank.lookup_account(account)?;

        let mut branch = self.lock_branch_of(target);
        target.adjust(amount, Some(&mut branch));

        trace!("Deposit applied");
        Ok(())
    }

    /// Withdraw money from an account.
    ///
    /// # Panics
    ///
    /// Panics if `amount` is negative, or if it would overflow a balance.
    #[instrument(level = "trace", skip(self, account), fields(account = %account))]
    pub fn withdraw(&self, account: AccountNumber, amount: Amount) -> Result<()> {
        assert!(amount >= 0, "withdrawal amount must be non-negative, got {}", amount);

        let source = self.bank.lookup_account(account)?;

        match self.bank.balance_check() {
            BalanceCheck::Advisory => {
                check_funds(source, amount)?;
                let mut branch = self.lock_branch_of(source);
                source.adjust(-amount, Some(&mut branch));
            }
            BalanceCheck::Atomic => {
                let mut branch = self.lock_branch_of(source);
                source.debit_checked(amount, Some(&mut branch))?;
            }
        }

        trace!("Withdrawal applied");
        Ok(())
    }

    /// Move money between two accounts.
    ///
    /// Same-branch transfers take no branch or bank lock and leave the branch
    /// aggregate alone. Cross-branch transfers take the bank lock, then both
    /// branch locks in ascending id, whichever side is the source.
    ///
    /// # Panics
    ///
    /// Panics if `amount` is negative, or if it would overflow a balance.
    #[instrument(level = "trace", skip(self, src, dst), fields(src = %src, dst = %dst))]
    pub fn transfer(&self, src: AccountNumber, dst: AccountNumber, amount: Amount) -> Result<()> {
        assert!(amount >= 0, "transfer amount must be non-negative, got {}", amount);

        let source = self.bank.lookup_account(src)?;
        let destination = self.bank.lookup_account(dst)?;

        let check = self.bank.balance_check();
        if check == BalanceCheck::Advisory {
            check_funds(source, amount)?;
        }

        if src.is_same_branch(&dst) {
            debug!("Same-branch transfer, skipping branch and bank locks");
            debit(check, source, amount, None)?;
            destination.adjust(amount, None);
        } else {
            let src_branch = src.branch_id();
            let dst_branch = dst.branch_id();
            let (first, second) = if src_branch < dst_branch {
                (src_branch, dst_branch)
            } else {
                (dst_branch, src_branch)
            };
            debug!(first, second, "Cross-branch transfer, locking bank and branches");

            let _bank = self.bank.lock_global();
            let mut low = self.lock_branch(first);
            let mut high = self.lock_branch(second);
            let (src_guard, dst_guard) = if src_branch < dst_branch {
                (&mut low, &mut high)
            } else {
                (&mut high, &mut low)
            };

            debit(check, source, amount, Some(src_guard))?;
            destination.adjust(amount, Some(dst_guard));
        }

        trace!("Transfer applied");
        Ok(())
    }

    fn lock_branch_of(&self, account: &Account) -> BranchGuard<'a> {
        self.lock_branch(account.number().branch_id())
    }

    /// Only called with the branch of an account that was just looked up.
    fn lock_branch(&self, id: BranchId) -> BranchGuard<'a> {
        self.bank.branches()[id as usize].lock()
    }
}

/// Advisory check: the balance may move before the debit lands.
fn check_funds(source: &Account, amount: Amount) -> Result<()> {
    let available = source.balance();
    if amount > available {
        return Err(LedgerError::InsufficientFunds {
            account: source.number(),
            requested: amount,
            available,
        });
    }
    Ok(())
}

fn debit(
    check: BalanceCheck,
    source: &Account,
    amount: Amount,
    branch: Option<&mut BranchGuard<'_>>,
) -> Result<()> {
    match check {
        BalanceCheck::Advisory => {
            source.adjust(-amount, branch);
            Ok(())
        }
        BalanceCheck::Atomic => source.debit_checked(amount, branch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;

    fn bank(check: BalanceCheck) -> Bank {
        let mut config = LedgerConfig::with_dimensions(2, 4, 100);
        config.balance_check = check;
        Bank::new(&config).unwrap()
    }

    fn acct(bank: &Bank, branch: u32, sub: u32) -> AccountNumber {
        bank.account_number(branch, sub).unwrap()
    }

    #[test]
    #[should_panic(expected = "overflows")]
    fn test_deposit_overflow_panics() {
        let bank = bank(BalanceCheck::Atomic);
        let teller = Teller::new(&bank);
        teller.deposit(acct(&bank, 0, 0), Amount::MAX).unwrap();
    }

    #[test]
    fn test_transfer_scenario() {
        for check in [BalanceCheck::Advisory, BalanceCheck::Atomic] {
            let bank = bank(check);
            let teller = Teller::new(&bank);
            let a = acct(&bank, 0, 0);
            let b = acct(&bank, 1, 0);

            assert_eq!(bank.total_balance(), 800);
            teller.transfer(a, b, 50).unwrap();
            assert_eq!(bank.account_balance(a).unwrap(), 50);
            assert_eq!(bank.account_balance(b).unwrap(), 150);
            assert_eq!(bank.total_balance(), 800);
            assert_eq!(bank.branch(0).unwrap().balance(), 350);
            assert_eq!(bank.branch(1).unwrap().balance(), 450);

            let err = teller.withdraw(a, 1000).unwrap_err();
            assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
            assert_eq!(bank.account_balance(a).unwrap(), 50);
            assert_eq!(bank.account_balance(b).unwrap(), 150);
        }
    }

    #[test]
    fn test_deposit_and_withdraw_update_branch() {
        let bank = bank(BalanceCheck::Atomic);
        let teller = Teller::new(&bank);
        let a = acct(&bank, 1, 2);

        teller.deposit(a, 25).unwrap();
        assert_eq!(bank.account_balance(a).unwrap(), 125);
        assert_eq!(bank.branch(1).unwrap().balance(), 425);

        teller.withdraw(a, 125).unwrap();
        assert_eq!(bank.account_balance(a).unwrap(), 0);
        assert_eq!(bank.branch(1).unwrap().balance(), 300);
        assert_eq!(bank.total_balance(), 700);
    }

    #[test]
    fn test_same_branch_transfer_keeps_aggregate() {
        let bank = bank(BalanceCheck::Atomic);
        let teller = Teller::new(&bank);
        let a = acct(&bank, 0, 1);
        let b = acct(&bank, 0, 3);

        teller.transfer(a, b, 70).unwrap();
        assert_eq!(bank.account_balance(a).unwrap(), 30);
        assert_eq!(bank.account_balance(b).unwrap(), 170);
        assert_eq!(bank.branch(0).unwrap().balance(), 400);
        assert_eq!(bank.branch(0).unwrap().account_total(), 400);
    }

    #[test]
    fn test_transfer_from_higher_branch() {
        let bank = bank(BalanceCheck::Atomic);
        let teller = Teller::new(&bank);
        let a = acct(&bank, 1, 1);
        let b = acct(&bank, 0, 2);

        teller.transfer(a, b, 100).unwrap();
        assert_eq!(bank.branch(1).unwrap().balance(), 300);
        assert_eq!(bank.branch(0).unwrap().balance(), 500);
        assert_eq!(bank.total_balance(), 800);
    }

    #[test]
    fn test_insufficient_transfer_changes_nothing() {
        for check in [BalanceCheck::Advisory, BalanceCheck::Atomic] {
            let bank = bank(check);
            let teller = Teller::new(&bank);
            let a = acct(&bank, 0, 0);
            let b = acct(&bank, 1, 1);

            let err = teller.transfer(a, b, 101).unwrap_err();
            assert_eq!(
                err,
                LedgerError::InsufficientFunds {
                    account: a,
                    requested: 101,
                    available: 100,
                }
            );
            assert_eq!(bank.account_balance(a).unwrap(), 100);
            assert_eq!(bank.account_balance(b).unwrap(), 100);
            assert_eq!(bank.branch(0).unwrap().balance(), 400);
            assert_eq!(bank.total_balance(), 800);
        }
    }

    #[test]
    fn test_unknown_accounts() {
        let bank = bank(BalanceCheck::Atomic);
        let teller = Teller::new(&bank);
        let known = acct(&bank, 0, 0);
        let missing = AccountNumber::new(5, 0).unwrap();

        assert_eq!(
            teller.deposit(missing, 1),
            Err(LedgerError::AccountNotFound(missing))
        );
        assert_eq!(
            teller.withdraw(missing, 1),
            Err(LedgerError::AccountNotFound(missing))
        );
        assert_eq!(
            teller.transfer(known, missing, 1),
            Err(LedgerError::AccountNotFound(missing))
        );
        assert_eq!(
            teller.transfer(missing, known, 1),
            Err(LedgerError::AccountNotFound(missing))
        );
        assert_eq!(bank.total_balance(), 800);
    }

    #[test]
    fn test_zero_amount_is_allowed() {
        let bank = bank(BalanceCheck::Atomic);
        let teller = Teller::new(&bank);
        let a = acct(&bank, 0, 0);
        assert!(teller.deposit(a, 0).is_ok());
        assert!(teller.withdraw(a, 0).is_ok());
        assert!(teller.transfer(a, a, 0).is_ok());
        assert_eq!(bank.total_balance(), 800);
    }

    #[test]
    #[should_panic(expected = "non-negative")]
    fn test_negative_amount_panics() {
        let bank = bank(BalanceCheck::Atomic);
        let teller = Teller::new(&bank);
        let a = acct(&bank, 0, 0);
        let _ = teller.deposit(a, -1);
    }
}

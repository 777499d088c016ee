//! Simulation scenarios: named operation mixes.

use rand::Rng;
use serde::{Deserialize, Serialize};

use branchledger_common::{AccountNumber, Amount};
use branchledger_ledger::Bank;

/// How a scenario chooses accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Traffic {
    /// Any account in the bank.
    Uniform,
    /// Every operation targets account (0, 0); transfers go from it to a
    /// random account and back.
    HotAccount,
    /// Transfer endpoints always share a branch.
    SameBranch,
}

/// A simulation scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Relative weight of deposits.
    pub deposit_weight: u32,
    /// Relative weight of withdrawals.
    pub withdraw_weight: u32,
    /// Relative weight of transfers.
    pub transfer_weight: u32,
    /// Amounts are drawn from `0..=max_amount`.
    pub max_amount: Amount,
    /// Account selection.
    pub traffic: Traffic,
}

/// One operation for a worker to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Deposit {
        account: AccountNumber,
        amount: Amount,
    },
    Withdraw {
        account: AccountNumber,
        amount: Amount,
    },
    Transfer {
        src: AccountNumber,
        dst: AccountNumber,
        amount: Amount,
    },
}

impl Scenario {
    /// Names accepted by [`Scenario::load`].
    pub const NAMES: [&'static str; 4] = ["balanced", "transfer-storm", "hot-account", "same-branch"];

    /// Load a scenario by name.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        match name {
            "balanced" => Ok(Self::balanced()),
            "transfer-storm" => Ok(Self::transfer_storm()),
            "hot-account" => Ok(Self::hot_account()),
            "same-branch" => Ok(Self::same_branch()),
            _ => Err(anyhow::anyhow!(
                "Unknown scenario: {} (expected one of {})",
                name,
                Self::NAMES.join(", ")
            )),
        }
    }

    /// Even mix of deposits, withdrawals and transfers.
    fn balanced() -> Self {
        Self {
            name: "balanced".to_string(),
            description: "Even mix of deposits, withdrawals and transfers".to_string(),
            deposit_weight: 1,
            withdraw_weight: 1,
            transfer_weight: 1,
            max_amount: 100,
            traffic: Traffic::Uniform,
        }
    }

    /// Transfers only, mostly across branches.
    fn transfer_storm() -> Self {
        Self {
            name: "transfer-storm".to_string(),
            description: "Transfers only; exercises branch lock ordering".to_string(),
            deposit_weight: 0,
            withdraw_weight: 0,
            transfer_weight: 1,
            max_amount: 250,
            traffic: Traffic::Uniform,
        }
    }

    /// All workers fight over one account.
    fn hot_account() -> Self {
        Self {
            name: "hot-account".to_string(),
            description: "All operations contend on account (0, 0)".to_string(),
            deposit_weight: 2,
            withdraw_weight: 2,
            transfer_weight: 1,
            max_amount: 50,
            traffic: Traffic::HotAccount,
        }
    }

    /// Transfers that never leave their branch.
    fn same_branch() -> Self {
        Self {
            name: "same-branch".to_string(),
            description: "Intra-branch transfers that skip branch and bank locks".to_string(),
            deposit_weight: 1,
            withdraw_weight: 1,
            transfer_weight: 4,
            max_amount: 100,
            traffic: Traffic::SameBranch,
        }
    }

    /// Draw the next operation.
    pub fn next_operation<R: Rng>(&self, bank: &Bank, rng: &mut R) -> Operation {
        let total_weight = self.deposit_weight + self.withdraw_weight + self.transfer_weight;
        let amount = rng.gen_range(0..=self.max_amount);
        let pick = rng.gen_range(0..total_weight.max(1));

        if pick < self.deposit_weight {
            Operation::Deposit {
                account: self.pick_account(bank, rng),
                amount,
            }
        } else if pick < self.deposit_weight + self.withdraw_weight {
            Operation::Withdraw {
                account: self.pick_account(bank, rng),
                amount,
            }
        } else {
            let (src, dst) = self.pick_pair(bank, rng);
            Operation::Transfer { src, dst, amount }
        }
    }

    fn pick_account<R: Rng>(&self, bank: &Bank, rng: &mut R) -> AccountNumber {
        match self.traffic {
            Traffic::HotAccount => hot_spot(bank),
            Traffic::Uniform | Traffic::SameBranch => random_account(bank, rng),
        }
    }

    fn pick_pair<R: Rng>(&self, bank: &Bank, rng: &mut R) -> (AccountNumber, AccountNumber) {
        match self.traffic {
            Traffic::Uniform => (random_account(bank, rng), random_account(bank, rng)),
            Traffic::HotAccount => {
                let other = random_account(bank, rng);
                if rng.gen_bool(0.5) {
                    (hot_spot(bank), other)
                } else {
                    (other, hot_spot(bank))
                }
            }
            Traffic::SameBranch => {
                let src = random_account(bank, rng);
                let sub = rng.gen_range(0..bank.accounts_per_branch());
                (src, account_at(bank, src.branch_id(), sub))
            }
        }
    }
}

/// Indices always come from the bank's own dimensions.
fn account_at(bank: &Bank, branch: u32, subaccount: u32) -> AccountNumber {
    bank.branches()[branch as usize].accounts()[subaccount as usize].number()
}

fn hot_spot(bank: &Bank) -> AccountNumber {
    account_at(bank, 0, 0)
}

fn random_account<R: Rng>(bank: &Bank, rng: &mut R) -> AccountNumber {
    let branch = rng.gen_range(0..bank.num_branches());
    let sub = rng.gen_range(0..bank.accounts_per_branch());
    account_at(bank, branch, sub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_load_known_scenarios() {
        for name in Scenario::NAMES {
            assert_eq!(Scenario::load(name).unwrap().name, name);
        }
        assert!(Scenario::load("unknown").is_err());
    }

    #[test]
    fn test_generated_accounts_exist() {
        let bank = Bank::with_dimensions(3, 4, 10).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for name in Scenario::NAMES {
            let scenario = Scenario::load(name).unwrap();
            for _ in 0..200 {
                let accounts = match scenario.next_operation(&bank, &mut rng) {
                    Operation::Deposit { account, .. } | Operation::Withdraw { account, .. } => {
                        vec![account]
                    }
                    Operation::Transfer { src, dst, .. } => vec![src, dst],
                };
                for account in accounts {
                    let expected =
                        bank.account_number(account.branch_id(), account.subaccount());
                    assert_eq!(expected, Ok(account));
                }
            }
        }
        assert_eq!(hot_spot(&bank), bank.account_number(0, 0).unwrap());
    }

    #[test]
    fn test_transfer_storm_only_transfers() {
        let bank = Bank::with_dimensions(3, 3, 10).unwrap();
        let scenario = Scenario::load("transfer-storm").unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            assert!(matches!(
                scenario.next_operation(&bank, &mut rng),
                Operation::Transfer { .. }
            ));
        }
    }

    #[test]
    fn test_same_branch_pairs() {
        let bank = Bank::with_dimensions(4, 5, 10).unwrap();
        let scenario = Scenario::load("same-branch").unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            if let Operation::Transfer { src, dst, .. } = scenario.next_operation(&bank, &mut rng) {
                assert!(src.is_same_branch(&dst));
                assert!(bank.lookup_account(dst).is_ok());
            }
        }
    }

    #[test]
    fn test_operations_target_existing_accounts() {
        let bank = Bank::with_dimensions(2, 3, 10).unwrap();
        let scenario = Scenario::load("balanced").unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let accounts = match scenario.next_operation(&bank, &mut rng) {
                Operation::Deposit { account, .. } | Operation::Withdraw { account, .. } => {
                    vec![account]
                }
                Operation::Transfer { src, dst, .. } => vec![src, dst],
            };
            for account in accounts {
                assert!(bank.lookup_account(account).is_ok());
            }
        }
    }
}

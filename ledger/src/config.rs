//! Ledger configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use branchledger_common::{Amount, LedgerError, Result, BRANCH_CAPACITY};

/// How withdrawals and transfers check the source balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BalanceCheck {
    /// Read the balance, release the account, debit later. A concurrent debit
    /// landing in between can overdraw the account.
    Advisory,
    /// Check and debit inside one account critical section, after all branch
    /// and bank locks are held.
    #[default]
    Atomic,
}

impl fmt::Display for BalanceCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceCheck::Advisory => write!(f, "advisory"),
            BalanceCheck::Atomic => write!(f, "atomic"),
        }
    }
}

impl FromStr for BalanceCheck {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "advisory" => Ok(BalanceCheck::Advisory),
            "atomic" => Ok(BalanceCheck::Atomic),
            other => Err(LedgerError::ConfigurationError(format!(
                "Unknown balance check mode: {}",
                other
            ))),
        }
    }
}

/// Main ledger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Number of branches.
    pub num_branches: u32,
    /// Accounts in every branch.
    pub accounts_per_branch: u32,
    /// Opening balance of every account.
    pub initial_amount: Amount,
    /// Open every fourth account with a balance of -1 so audits have
    /// something to find.
    pub fault_injection: bool,
    /// Balance check contract for withdrawals and transfers.
    pub balance_check: BalanceCheck,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            num_branches: 4,
            accounts_per_branch: 16,
            initial_amount: 1_000,
            fault_injection: false,
            balance_check: BalanceCheck::default(),
        }
    }
}

impl LedgerConfig {
    /// Create a configuration with the given dimensions and defaults elsewhere.
    pub fn with_dimensions(
        num_branches: u32,
        accounts_per_branch: u32,
        initial_amount: Amount,
    ) -> Self {
        Self {
            num_branches,
            accounts_per_branch,
            initial_amount,
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(branches) = std::env::var("LEDGER_BRANCHES") {
            if let Ok(branches) = branches.parse() {
                config.num_branches = branches;
            }
        }

        if let Ok(accounts) = std::env::var("LEDGER_ACCOUNTS_PER_BRANCH") {
            if let Ok(accounts) = accounts.parse() {
                config.accounts_per_branch = accounts;
            }
        }

        if let Ok(amount) = std::env::var("LEDGER_INITIAL_AMOUNT") {
            if let Ok(amount) = amount.parse() {
                config.initial_amount = amount;
            }
        }

        if let Ok(flag) = std::env::var("LEDGER_FAULT_INJECTION") {
            config.fault_injection = matches!(flag.as_str(), "1" | "true" | "yes");
        }

        if let Ok(mode) = std::env::var("LEDGER_BALANCE_CHECK") {
            if let Ok(mode) = mode.parse() {
                config.balance_check = mode;
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.num_branches == 0 {
            return Err(LedgerError::ConfigurationError(
                "Bank needs at least one branch".to_string(),
            ));
        }

        if self.accounts_per_branch == 0 {
            return Err(LedgerError::ConfigurationError(
                "Branches need at least one account".to_string(),
            ));
        }

        if self.accounts_per_branch > BRANCH_CAPACITY {
            return Err(LedgerError::ConfigurationError(format!(
                "A branch holds at most {} accounts, got {}",
                BRANCH_CAPACITY, self.accounts_per_branch
            )));
        }

        if self.checked_total().is_none() {
            return Err(LedgerError::ConfigurationError(format!(
                "{} branches x {} accounts x {} overflows the bank total",
                self.num_branches, self.accounts_per_branch, self.initial_amount
            )));
        }

        Ok(())
    }

    /// Total balance the bank opens with.
    ///
    /// Ignores fault injection; audits compare against this value to surface it.
    /// Saturates for configurations that fail [`LedgerConfig::validate`].
    pub fn expected_total(&self) -> Amount {
        self.checked_total().unwrap_or(if self.initial_amount < 0 {
            Amount::MIN
        } else {
            Amount::MAX
        })
    }

    fn checked_total(&self) -> Option<Amount> {
        (self.num_branches as Amount)
            .checked_mul(self.accounts_per_branch as Amount)?
            .checked_mul(self.initial_amount)
    }
}

//! Error types for BranchLedger operations.

use crate::{AccountNumber, Amount};
use thiserror::Error;

/// Main error type for ledger operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Account number decodes to a branch or subaccount outside the bank.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountNumber),

    /// Requested amount exceeds the observed source balance.
    #[error("Insufficient funds in {account}: requested {requested}, available {available}")]
    InsufficientFunds {
        account: AccountNumber,
        requested: Amount,
        available: Amount,
    },

    /// Subaccount index does not fit in an account number.
    #[error("Subaccount index {subaccount} out of range")]
    SubaccountOutOfRange { subaccount: u32 },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Ledger audit found inconsistencies.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

impl LedgerError {
    /// Check if this error may succeed when retried later.
    ///
    /// Only a shortfall of funds can resolve itself through concurrent
    /// deposits; the ledger never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::InsufficientFunds { .. })
    }

    /// Get a stable error code for reports.
    pub fn error_code(&self) -> &'static str {
        match self {
            LedgerError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::SubaccountOutOfRange { .. } => "SUBACCOUNT_OUT_OF_RANGE",
            LedgerError::ConfigurationError(_) => "CONFIGURATION_ERROR",
            LedgerError::ValidationFailed(_) => "VALIDATION_FAILED",
        }
    }
}

/// Result type alias for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

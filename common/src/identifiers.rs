//! Identifier types for BranchLedger entities.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{LedgerError, Result};

/// Identifier of a branch, stored in the upper 32 bits of an account number.
pub type BranchId = u32;

/// Largest subaccount index a single branch can address.
pub const MAX_SUBACCOUNT: u32 = 0x7ff_ffff;

/// Number of accounts a single branch can hold.
pub const BRANCH_CAPACITY: u32 = MAX_SUBACCOUNT + 1;

/// Account number: branch ID in the high word, subaccount index in the low word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountNumber(u64);

impl AccountNumber {
    /// Compose an account number from its branch and subaccount index.
    ///
    /// Subaccount indices beyond [`MAX_SUBACCOUNT`] are rejected rather than
    /// masked, so every constructed number decodes back to its inputs.
    pub fn new(branch: BranchId, subaccount: u32) -> Result<Self> {
        if subaccount > MAX_SUBACCOUNT {
            return Err(LedgerError::SubaccountOutOfRange { subaccount });
        }
        Ok(Self(((branch as u64) << 32) | subaccount as u64))
    }

    /// Wrap a raw 64-bit value without validation.
    ///
    /// Callers receiving numbers from outside should go through a bank lookup,
    /// which reports undecodable numbers as `AccountNotFound`.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw 64-bit value.
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Branch this account belongs to.
    pub fn branch_id(&self) -> BranchId {
        (self.0 >> 32) as BranchId
    }

    /// Index of the account within its branch.
    ///
    /// The full low word is returned; stray bits above [`MAX_SUBACCOUNT`] make
    /// the index out of range instead of aliasing another account.
    pub fn subaccount(&self) -> u32 {
        self.0 as u32
    }

    /// Check whether two accounts live in the same branch.
    pub fn is_same_branch(&self, other: &AccountNumber) -> bool {
        self.branch_id() == other.branch_id()
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

impl From<AccountNumber> for u64 {
    fn from(number: AccountNumber) -> Self {
        number.0
    }
}

#[cfg(test)]
mod tests {
    use super::{AccountNumber, MAX_SUBACCOUNT};
    use crate::error::LedgerError;
    use proptest::prelude::*;

    #[test]
    fn test_account_number_layout() {
        let number = AccountNumber::new(3, 17).unwrap();
        assert_eq!(number.raw(), (3u64 << 32) | 17);
        assert_eq!(number.branch_id(), 3);
        assert_eq!(number.subaccount(), 17);
    }

    #[test]
    fn test_subaccount_out_of_range() {
        assert!(AccountNumber::new(0, MAX_SUBACCOUNT).is_ok());
        assert_eq!(
            AccountNumber::new(0, MAX_SUBACCOUNT + 1),
            Err(LedgerError::SubaccountOutOfRange {
                subaccount: MAX_SUBACCOUNT + 1
            })
        );
    }

    #[test]
    fn test_same_branch() {
        let a = AccountNumber::new(1, 0).unwrap();
        let b = AccountNumber::new(1, 9).unwrap();
        let c = AccountNumber::new(2, 0).unwrap();
        assert!(a.is_same_branch(&b));
        assert!(!a.is_same_branch(&c));
    }

    #[test]
    fn test_display_is_hex() {
        let number = AccountNumber::new(1, 2).unwrap();
        assert_eq!(number.to_string(), "0x0000000100000002");
    }

    #[test]
    fn test_serde_is_transparent_u64() {
        let number = AccountNumber::new(2, 5).unwrap();
        let json = serde_json::to_string(&number).unwrap();
        assert_eq!(json, ((2u64 << 32) | 5).to_string());
    }

    proptest! {
        #[test]
        fn prop_compose_decompose_roundtrip(branch in any::<u32>(), sub in 0..=MAX_SUBACCOUNT) {
            let number = AccountNumber::new(branch, sub).unwrap();
            prop_assert_eq!((number.branch_id(), number.subaccount()), (branch, sub));
            prop_assert_eq!(AccountNumber::from_raw(number.raw()), number);
        }
    }
}

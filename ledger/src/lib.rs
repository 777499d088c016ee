//! BranchLedger Ledger Engine
//!
//! In-memory multi-branch bank shared by many threads. Accounts, branches and
//! the bank each carry their own lock; tellers acquire them in one global
//! order (bank, branches by ascending id, accounts) so no interleaving of
//! operations can deadlock, and a total-balance read never observes a
//! half-applied cross-branch transfer.

pub mod account;
pub mod audit;
pub mod balance;
pub mod bank;
pub mod branch;
pub mod config;
pub mod teller;

pub use account::Account;
pub use audit::{AuditIssue, AuditReport};
pub use balance::{AccountBalance, BankSnapshot, BranchSnapshot, Discrepancy, SnapshotId};
pub use bank::Bank;
pub use branch::{Branch, BranchGuard};
pub use config::{BalanceCheck, LedgerConfig};
pub use teller::Teller;

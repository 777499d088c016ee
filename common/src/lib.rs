//! BranchLedger Common Types
//!
//! Shared types used across the ledger engine and its collaborators:
//! account identifiers, amounts and the error type.

pub mod identifiers;
pub mod monetary;
pub mod error;

pub use identifiers::*;
pub use monetary::*;
pub use error::*;

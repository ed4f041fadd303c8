// ============================================================================
// Token Module - value-transfer collaborator
// ============================================================================
//
// The market never edits balances itself. Every seed, stake and payout goes
// through a TokenLedger passed in by the caller:
//   - TokenLedger: the boundary the market depends on
//   - memory: in-process ledger used by tests and the dev host
//
// ============================================================================

pub mod memory;

pub use memory::*;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::address::Address;

/// A balance of one mint owned by one address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub owner: Address,
    pub mint: Address,
    pub amount: u64,
}

/// Value-transfer collaborator.
///
/// Implementations must leave state untouched when they return an error.
pub trait TokenLedger {
    /// Open a holding of `mint` for `owner` and return its address
    fn create_holding(&mut self, owner: &Address, mint: &Address) -> Result<Address, LedgerError>;

    /// Address of `owner`'s holding of `mint`, if one is open
    fn find_holding(&self, owner: &Address, mint: &Address) -> Option<Address>;

    fn holding(&self, holding: &Address) -> Result<Holding, LedgerError>;

    fn mint_exists(&self, mint: &Address) -> bool;

    /// Move `amount` of `mint` between two holdings
    fn transfer(&mut self, from: &Address, to: &Address, amount: u64, mint: &Address) -> Result<(), LedgerError>;

    /// Issue new units into a holding
    fn mint_to(&mut self, to: &Address, amount: u64) -> Result<(), LedgerError>;

    /// Remove an empty holding
    fn close_holding(&mut self, holding: &Address) -> Result<(), LedgerError>;

    fn balance(&self, holding: &Address) -> Result<u64, LedgerError> {
        self.holding(holding).map(|h| h.amount)
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerError {
    MintNotFound(Address),
    HoldingNotFound(Address),
    NoHolding { owner: Address, mint: Address },
    HoldingAlreadyExists(Address),
    MintMismatch { expected: Address, actual: Address },
    InsufficientFunds { available: u64, required: u64 },
    NonZeroBalance { holding: Address, amount: u64 },
    Overflow,
}

impl LedgerError {
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::MintNotFound(_) => "MintNotFound",
            LedgerError::HoldingNotFound(_) => "HoldingNotFound",
            LedgerError::NoHolding { .. } => "HoldingNotFound",
            LedgerError::HoldingAlreadyExists(_) => "HoldingAlreadyExists",
            LedgerError::MintMismatch { .. } => "MintMismatch",
            LedgerError::InsufficientFunds { .. } => "InsufficientFunds",
            LedgerError::NonZeroBalance { .. } => "NonZeroBalance",
            LedgerError::Overflow => "LedgerOverflow",
        }
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::MintNotFound(mint) => write!(f, "Mint not found: {}", mint),
            LedgerError::HoldingNotFound(holding) => write!(f, "Holding not found: {}", holding),
            LedgerError::NoHolding { owner, mint } => write!(f, "{} has no holding of mint {}", owner, mint),
            LedgerError::HoldingAlreadyExists(holding) => write!(f, "Holding already exists: {}", holding),
            LedgerError::MintMismatch { expected, actual } => {
                write!(f, "Mint mismatch: expected {}, got {}", expected, actual)
            }
            LedgerError::InsufficientFunds { available, required } => {
                write!(f, "Insufficient funds: {} < {}", available, required)
            }
            LedgerError::NonZeroBalance { holding, amount } => {
                write!(f, "Holding {} still has {} units", holding, amount)
            }
            LedgerError::Overflow => write!(f, "Balance overflow"),
        }
    }
}

impl std::error::Error for LedgerError {}

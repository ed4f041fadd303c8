// ============================================================================
// Market Errors
// ============================================================================
//
// Every rejected operation surfaces as one MarketError. Nothing is retried and
// nothing is partially applied: the caller decides whether to resubmit.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::address::{Address, AddressError};
use crate::oracle::OracleError;
use crate::token::LedgerError;

/// Coarse grouping of error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Validation,
    Phase,
    Authorization,
    Resource,
    Freshness,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketError {
    // validation
    IncorrectFeedIDLength { len: usize },
    ShortMarketDuration { duration: u64, min: u64 },
    InvalidBetAmount,
    InvalidPoolMint(Address),
    InvalidUtf8,
    InvalidFeedId(String),
    InvalidPrice(i64),
    PriceAdjustmentOverflow,
    ArithmeticOverflow,

    // phase
    InvalidMarketInitialization,
    MarketDurationOver,
    MarketDurationNotOver,

    // authorization
    UnauthorizedUser { expected: Address, actual: Address },

    // resource
    AccountNotFound(Address),
    AccountAlreadyInUse(Address),
    AccountDiscriminatorMismatch(Address),
    AccountDidNotDeserialize(String),
    AccountDidNotSerialize(String),
    EscrowMismatch { pool: Address, recorded: u64, held: u64 },
    Ledger(LedgerError),
    Address(AddressError),

    // freshness
    PriceUnavailable(String),
    StalePrice { age: u64, max_age: u64 },
}

impl MarketError {
    /// Stable identifier reported to callers
    pub fn code(&self) -> &'static str {
        match self {
            MarketError::IncorrectFeedIDLength { .. } => "IncorrectFeedIDLength",
            MarketError::ShortMarketDuration { .. } => "ShortMarketDuration",
            MarketError::InvalidBetAmount => "InvalidBetAmount",
            MarketError::InvalidPoolMint(_) => "InvalidPoolMint",
            MarketError::InvalidUtf8 => "InvalidUtf8",
            MarketError::InvalidFeedId(_) => "InvalidFeedId",
            MarketError::InvalidPrice(_) => "InvalidPrice",
            MarketError::PriceAdjustmentOverflow => "PriceAdjustmentOverflow",
            MarketError::ArithmeticOverflow => "ArithmeticOverflow",
            MarketError::InvalidMarketInitialization => "InvalidMarketInitialization",
            MarketError::MarketDurationOver => "MarketDurationOver",
            MarketError::MarketDurationNotOver => "MarketDurationNotOver",
            MarketError::UnauthorizedUser { .. } => "UnauthorizedUser",
            MarketError::AccountNotFound(_) => "AccountNotFound",
            MarketError::AccountAlreadyInUse(_) => "AccountAlreadyInUse",
            MarketError::AccountDiscriminatorMismatch(_) => "AccountDiscriminatorMismatch",
            MarketError::AccountDidNotDeserialize(_) => "AccountDidNotDeserialize",
            MarketError::AccountDidNotSerialize(_) => "AccountDidNotSerialize",
            MarketError::EscrowMismatch { .. } => "EscrowMismatch",
            MarketError::Ledger(e) => e.code(),
            MarketError::Address(_) => "AddressDerivationFailed",
            MarketError::PriceUnavailable(_) => "PriceUnavailable",
            MarketError::StalePrice { .. } => "StalePrice",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MarketError::IncorrectFeedIDLength { .. }
            | MarketError::ShortMarketDuration { .. }
            | MarketError::InvalidBetAmount
            | MarketError::InvalidPoolMint(_)
            | MarketError::InvalidUtf8
            | MarketError::InvalidFeedId(_)
            | MarketError::InvalidPrice(_)
            | MarketError::PriceAdjustmentOverflow
            | MarketError::ArithmeticOverflow => ErrorKind::Validation,

            MarketError::InvalidMarketInitialization
            | MarketError::MarketDurationOver => ErrorKind::Phase,

            MarketError::UnauthorizedUser { .. } => ErrorKind::Authorization,

            MarketError::Ledger(LedgerError::MintMismatch { .. }) => ErrorKind::Validation,
            MarketError::AccountNotFound(_)
            | MarketError::AccountAlreadyInUse(_)
            | MarketError::AccountDiscriminatorMismatch(_)
            | MarketError::AccountDidNotDeserialize(_)
            | MarketError::AccountDidNotSerialize(_)
            | MarketError::EscrowMismatch { .. }
            | MarketError::Ledger(_)
            | MarketError::Address(_) => ErrorKind::Resource,

            MarketError::MarketDurationNotOver
            | MarketError::PriceUnavailable(_)
            | MarketError::StalePrice { .. } => ErrorKind::Freshness,
        }
    }
}

impl fmt::Display for MarketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketError::IncorrectFeedIDLength { len } => {
                write!(f, "Feed id is expected to have 66 characters, got {}", len)
            }
            MarketError::ShortMarketDuration { duration, min } => {
                write!(f, "Market duration {}s is shorter than the minimum {}s", duration, min)
            }
            MarketError::InvalidBetAmount => write!(f, "Bet amount must be greater than zero"),
            MarketError::InvalidPoolMint(mint) => write!(f, "Mint {} is not allowed as a pool token", mint),
            MarketError::InvalidUtf8 => write!(f, "Feed id is not valid UTF-8"),
            MarketError::InvalidFeedId(msg) => write!(f, "Feed id is not a 32-byte hex identifier: {}", msg),
            MarketError::InvalidPrice(price) => write!(f, "Oracle reported a negative price: {}", price),
            MarketError::PriceAdjustmentOverflow => write!(f, "Overflow while adjusting the oracle price"),
            MarketError::ArithmeticOverflow => write!(f, "Arithmetic overflow"),
            MarketError::InvalidMarketInitialization => {
                write!(f, "Invalid market stage for this operation")
            }
            MarketError::MarketDurationOver => write!(f, "Bets can only be placed during the market duration"),
            MarketError::MarketDurationNotOver => write!(f, "Market duration is not over yet"),
            MarketError::UnauthorizedUser { expected, actual } => {
                write!(f, "Signer {} is not the market creator {}", actual, expected)
            }
            MarketError::AccountNotFound(address) => write!(f, "Account not found: {}", address),
            MarketError::AccountAlreadyInUse(address) => write!(f, "Account already in use: {}", address),
            MarketError::AccountDiscriminatorMismatch(address) => {
                write!(f, "Account {} holds a different record type", address)
            }
            MarketError::AccountDidNotDeserialize(msg) => write!(f, "Failed to decode account: {}", msg),
            MarketError::AccountDidNotSerialize(msg) => write!(f, "Failed to encode account: {}", msg),
            MarketError::EscrowMismatch { pool, recorded, held } => write!(
                f,
                "Pool {} records {} but its custody holding has {}",
                pool, recorded, held
            ),
            MarketError::Ledger(e) => write!(f, "Token ledger: {}", e),
            MarketError::Address(e) => write!(f, "Address derivation: {}", e),
            MarketError::PriceUnavailable(msg) => write!(f, "Price unavailable: {}", msg),
            MarketError::StalePrice { age, max_age } => {
                write!(f, "Price observation is {}s old, limit is {}s", age, max_age)
            }
        }
    }
}

impl std::error::Error for MarketError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MarketError::Ledger(e) => Some(e),
            MarketError::Address(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LedgerError> for MarketError {
    fn from(e: LedgerError) -> Self {
        MarketError::Ledger(e)
    }
}

impl From<AddressError> for MarketError {
    fn from(e: AddressError) -> Self {
        MarketError::Address(e)
    }
}

impl From<OracleError> for MarketError {
    fn from(e: OracleError) -> Self {
        match e {
            OracleError::FeedNotFound(feed) => MarketError::PriceUnavailable(feed),
        }
    }
}

/// Binary Price Prediction Market
/// Exports all modules for use as a library crate

pub mod address;
pub mod config;
pub mod error;
pub mod events;
pub mod market;
pub mod oracle;
pub mod state;
pub mod store;
pub mod token;

// Execution host
pub mod app_state;
pub mod auth;
pub mod handlers;

pub use address::{create_derived_address, find_derived_address, Address, AddressError};
pub use config::{MarketConfig, BET_SEED, HIGHER_POOL_SEED, INITIAL_POOL_AMOUNT, LOWER_POOL_SEED};
pub use error::{ErrorKind, MarketError};
pub use events::MarketEvent;
pub use market::{
    bet_address, market_address, pool_address, Context, Instruction, InstructionOutcome, MarketSummary,
    PredictionMarket, Resolution, Settlement,
};
pub use oracle::{MemoryPriceOracle, OracleError, PriceObservation, PriceOracle};
pub use state::{Bet, Direction, FeedId, Market, MarketInitialization, Pool};
pub use store::AccountStore;
pub use token::{Holding, LedgerError, MemoryTokenLedger, TokenLedger};
pub use auth::{AuthError, SignedInstruction, INSTRUCTION_EXPIRY_SECS};

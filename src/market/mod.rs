// ============================================================================
// Market Module - lifecycle, escrow and settlement
// ============================================================================
//
// This module contains the prediction market core:
//   - lifecycle: the five operations and their phase checks
//   - escrow: Higher/Lower pool ledgers backed by custody holdings
//   - settlement: oracle resolution and creator payout
//
// Flow: InitializedMarket → InitializedPools → (cancelled | finalized)
//
// Every operation runs against staged copies of the account store and the
// token ledger. Staged state replaces the live state only when the operation
// returns Ok, so a failure anywhere leaves nothing behind.
// ============================================================================

pub mod escrow;
pub mod lifecycle;
pub mod settlement;

pub use settlement::*;

use serde::{Deserialize, Serialize};

use crate::address::{find_derived_address, Address};
use crate::config::{MarketConfig, BET_SEED};
use crate::error::MarketError;
use crate::events::MarketEvent;
use crate::oracle::PriceOracle;
use crate::state::{Bet, Direction, FeedId, Market, Pool};
use crate::store::AccountStore;
use crate::token::TokenLedger;

// ============================================================================
// INVOCATION
// ============================================================================

/// Who submitted the operation and when. The signer is trusted as already
/// authenticated by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    pub signer: Address,
    /// Caller-observed unix seconds
    pub now: u64,
}

impl Context {
    pub fn new(signer: Address, now: u64) -> Self {
        Self { signer, now }
    }

    /// Context stamped with the wall clock
    pub fn at_wall_clock(signer: Address) -> Self {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        Self { signer, now }
    }
}

/// The menu of operations a host may submit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Instruction {
    InitializeMarket {
        target_price: u64,
        feed_id: String,
        market_duration: u64,
    },
    InitializePools {
        market: Address,
        pool_token_mint: Address,
    },
    PlaceBet {
        market: Address,
        amount: u64,
        direction: Direction,
    },
    CancelMarket {
        market: Address,
    },
    FinalizeMarket {
        market: Address,
    },
}

impl Instruction {
    pub fn name(&self) -> &'static str {
        match self {
            Instruction::InitializeMarket { .. } => "initialize_market",
            Instruction::InitializePools { .. } => "initialize_pools",
            Instruction::PlaceBet { .. } => "place_bet",
            Instruction::CancelMarket { .. } => "cancel_market",
            Instruction::FinalizeMarket { .. } => "finalize_market",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstructionOutcome {
    MarketInitialized { market: Address },
    PoolsInitialized { higher_pool: Address, lower_pool: Address },
    BetPlaced { bet: Address },
    MarketCancelled { refunded: u64 },
    MarketFinalized { settlement: Settlement },
}

// ============================================================================
// DERIVATIONS
// ============================================================================

/// Market ← sha256(feed id) ‖ creator ‖ target price ‖ duration
pub fn market_address(
    program_id: &Address,
    creator: &Address,
    feed_id: &FeedId,
    target_price: u64,
    market_duration: u64,
) -> Result<(Address, u8), MarketError> {
    let feed_seed = feed_id.seed();
    let target = target_price.to_le_bytes();
    let duration = market_duration.to_le_bytes();
    Ok(find_derived_address(
        &[&feed_seed, creator.as_ref(), &target, &duration],
        program_id,
    )?)
}

/// Pool ← "higher_pool" | "lower_pool" ‖ market
pub fn pool_address(program_id: &Address, market: &Address, direction: Direction) -> Result<(Address, u8), MarketError> {
    Ok(find_derived_address(
        &[direction.pool_seed().as_bytes(), market.as_ref()],
        program_id,
    )?)
}

/// Bet ← "prediction_bet" ‖ user ‖ market ‖ amount ‖ direction
pub fn bet_address(
    program_id: &Address,
    user: &Address,
    market: &Address,
    amount: u64,
    direction: Direction,
) -> Result<(Address, u8), MarketError> {
    let amount = amount.to_le_bytes();
    let direction = [direction.to_u8()];
    Ok(find_derived_address(
        &[BET_SEED.as_bytes(), user.as_ref(), market.as_ref(), &amount, &direction],
        program_id,
    )?)
}

// ============================================================================
// PROGRAM
// ============================================================================

/// Staged state an operation works on
pub(crate) struct Transaction<L> {
    pub program_id: Address,
    pub config: MarketConfig,
    pub accounts: AccountStore,
    pub ledger: L,
    pub events: Vec<MarketEvent>,
}

/// Snapshot of one market with its pools and bets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSummary {
    pub address: Address,
    pub market: Market,
    pub higher_pool: Option<u64>,
    pub lower_pool: Option<u64>,
    pub bet_count: usize,
    pub staked_higher: u64,
    pub staked_lower: u64,
}

/// The prediction market program: owns market, pool and bet records
#[derive(Debug, Clone)]
pub struct PredictionMarket {
    config: MarketConfig,
    accounts: AccountStore,
    events: Vec<MarketEvent>,
}

impl PredictionMarket {
    pub fn new(config: MarketConfig) -> Self {
        Self::from_parts(config, AccountStore::new(), Vec::new())
    }

    /// Rebuild from persisted accounts and event log
    pub fn from_parts(config: MarketConfig, accounts: AccountStore, events: Vec<MarketEvent>) -> Self {
        Self { config, accounts, events }
    }

    pub fn program_id(&self) -> &Address {
        &self.config.program_id
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    pub fn events(&self) -> &[MarketEvent] {
        &self.events
    }

    /// Run `op` on staged copies; commit accounts, ledger and events only on Ok.
    pub(crate) fn transact<L, T, F>(&mut self, operation: &'static str, ledger: &mut L, op: F) -> Result<T, MarketError>
    where
        L: TokenLedger + Clone,
        F: FnOnce(&mut Transaction<L>) -> Result<T, MarketError>,
    {
        let mut tx = Transaction {
            program_id: self.config.program_id,
            config: self.config.clone(),
            accounts: self.accounts.clone(),
            ledger: ledger.clone(),
            events: Vec::new(),
        };

        match op(&mut tx) {
            Ok(value) => {
                self.accounts = tx.accounts;
                *ledger = tx.ledger;
                self.events.extend(tx.events);
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(operation, code = e.code(), error = %e, "operation rejected");
                Err(e)
            }
        }
    }

    /// Dispatch one instruction
    pub fn process<L, O>(
        &mut self,
        ctx: &Context,
        ledger: &mut L,
        oracle: &O,
        instruction: Instruction,
    ) -> Result<InstructionOutcome, MarketError>
    where
        L: TokenLedger + Clone,
        O: PriceOracle + ?Sized,
    {
        tracing::debug!(instruction = instruction.name(), signer = %ctx.signer, now = ctx.now, "processing instruction");

        match instruction {
            Instruction::InitializeMarket { target_price, feed_id, market_duration } => {
                let market = self.initialize_market(ctx, target_price, &feed_id, market_duration)?;
                Ok(InstructionOutcome::MarketInitialized { market })
            }
            Instruction::InitializePools { market, pool_token_mint } => {
                let (higher_pool, lower_pool) = self.initialize_pools(ctx, ledger, &market, &pool_token_mint)?;
                Ok(InstructionOutcome::PoolsInitialized { higher_pool, lower_pool })
            }
            Instruction::PlaceBet { market, amount, direction } => {
                let bet = self.place_bet(ctx, ledger, &market, amount, direction)?;
                Ok(InstructionOutcome::BetPlaced { bet })
            }
            Instruction::CancelMarket { market } => {
                let refunded = self.cancel_market(ctx, ledger, &market)?;
                Ok(InstructionOutcome::MarketCancelled { refunded })
            }
            Instruction::FinalizeMarket { market } => {
                let settlement = self.finalize_market(ctx, ledger, oracle, &market)?;
                Ok(InstructionOutcome::MarketFinalized { settlement })
            }
        }
    }

    // ===== QUERIES =====

    pub fn market_address(
        &self,
        creator: &Address,
        feed_id: &str,
        target_price: u64,
        market_duration: u64,
    ) -> Result<Address, MarketError> {
        let feed_id = FeedId::parse(feed_id)?;
        market_address(self.program_id(), creator, &feed_id, target_price, market_duration).map(|(a, _)| a)
    }

    pub fn pool_address(&self, market: &Address, direction: Direction) -> Result<Address, MarketError> {
        pool_address(self.program_id(), market, direction).map(|(a, _)| a)
    }

    pub fn bet_address(
        &self,
        user: &Address,
        market: &Address,
        amount: u64,
        direction: Direction,
    ) -> Result<Address, MarketError> {
        bet_address(self.program_id(), user, market, amount, direction).map(|(a, _)| a)
    }

    pub fn market(&self, address: &Address) -> Result<Market, MarketError> {
        self.accounts.load(address)
    }

    pub fn pool(&self, market: &Address, direction: Direction) -> Result<Pool, MarketError> {
        self.accounts.load(&self.pool_address(market, direction)?)
    }

    pub fn bet(&self, address: &Address) -> Result<Bet, MarketError> {
        self.accounts.load(address)
    }

    pub fn markets(&self) -> Vec<(Address, Market)> {
        self.accounts.iter::<Market>().collect()
    }

    /// Bets stay readable after their market closes
    pub fn bets_for_market(&self, market: &Address) -> Vec<(Address, Bet)> {
        self.accounts
            .iter::<Bet>()
            .filter(|(_, bet)| bet.market == *market)
            .collect()
    }

    pub fn bets_for_user(&self, user: &Address) -> Vec<(Address, Bet)> {
        self.accounts
            .iter::<Bet>()
            .filter(|(_, bet)| bet.user == *user)
            .collect()
    }

    pub fn market_summary(&self, address: &Address) -> Result<MarketSummary, MarketError> {
        let market = self.market(address)?;
        let bets = self.bets_for_market(address);

        let staked = |direction: Direction| -> u64 {
            bets.iter()
                .filter(|(_, bet)| bet.direction == direction)
                .fold(0u64, |acc, (_, bet)| acc.saturating_add(bet.amount))
        };

        Ok(MarketSummary {
            address: *address,
            higher_pool: self.pool(address, Direction::Higher).ok().map(|p| p.balance),
            lower_pool: self.pool(address, Direction::Lower).ok().map(|p| p.balance),
            bet_count: bets.len(),
            staked_higher: staked(Direction::Higher),
            staked_lower: staked(Direction::Lower),
            market,
        })
    }
}

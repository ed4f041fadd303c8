// Events recorded for every committed market operation

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::state::Direction;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MarketEvent {
    MarketInitialized {
        market: Address,
        creator: Address,
        target_price: u64,
        market_duration: u64,
        start_time: u64,
    },
    PoolsInitialized {
        market: Address,
        mint: Address,
        seed_amount: u64,
    },
    BetPlaced {
        market: Address,
        bet: Address,
        user: Address,
        amount: u64,
        direction: Direction,
    },
    MarketCancelled {
        market: Address,
        refunded: u64,
    },
    MarketFinalized {
        market: Address,
        winning_direction: Direction,
        final_price: u64,
        payout: u64,
    },
}

impl MarketEvent {
    pub fn market(&self) -> &Address {
        match self {
            MarketEvent::MarketInitialized { market, .. }
            | MarketEvent::PoolsInitialized { market, .. }
            | MarketEvent::BetPlaced { market, .. }
            | MarketEvent::MarketCancelled { market, .. }
            | MarketEvent::MarketFinalized { market, .. } => market,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MarketEvent::MarketInitialized { .. } => "market_initialized",
            MarketEvent::PoolsInitialized { .. } => "pools_initialized",
            MarketEvent::BetPlaced { .. } => "bet_placed",
            MarketEvent::MarketCancelled { .. } => "market_cancelled",
            MarketEvent::MarketFinalized { .. } => "market_finalized",
        }
    }
}

//! Settlement engine
//!
//! Compares the oracle price with the market target and computes the payout.
//! The price is read and validated before any funds move.
//!
//! Payout rule: both pools go to the market creator in full. Winning bettors
//! are not paid pro rata.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::MarketError;
use crate::oracle::{feed_key_from_hex, get_price_no_older_than, PriceOracle};
use crate::state::{Direction, Market};

/// Outcome of the oracle comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub winning_direction: Direction,
    pub final_price: u64,
    pub publish_time: u64,
}

/// Everything a finalized market paid out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub market: Address,
    pub creator: Address,
    pub winning_direction: Direction,
    pub final_price: u64,
    pub higher_pool: u64,
    pub lower_pool: u64,
    pub payout: u64,
}

/// Ties go to Higher.
pub fn winning_direction(final_price: u64, target_price: u64) -> Direction {
    if final_price >= target_price {
        Direction::Higher
    } else {
        Direction::Lower
    }
}

/// Read the market's feed at `now` and decide the winning side.
pub fn resolve<O: PriceOracle + ?Sized>(
    market: &Market,
    oracle: &O,
    now: u64,
    max_price_age: u64,
) -> Result<Resolution, MarketError> {
    let feed_key = feed_key_from_hex(market.feed_id.as_str()?)?;
    let observation = get_price_no_older_than(oracle, &feed_key, now, max_price_age)?;
    let final_price = observation.normalized()?;

    Ok(Resolution {
        winning_direction: winning_direction(final_price, market.target_price),
        final_price,
        publish_time: observation.publish_time,
    })
}

/// Combined value of both pools
pub fn combined_payout(higher_pool: u64, lower_pool: u64) -> Result<u64, MarketError> {
    higher_pool
        .checked_add(lower_pool)
        .ok_or(MarketError::ArithmeticOverflow)
}

// ============================================================================
// Price Oracle - external price observations used at settlement
// ============================================================================
//
// Architecture:
//   PriceOracle trait → feed lookup by 32-byte key → freshness check
//   → fixed-point normalization → integer price compared to the target
// ============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::MarketError;

/// 32-byte identifier of a price series
pub type FeedKey = [u8; 32];

/// One published price. `price * 10^exponent` is the real value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub price: i64,
    pub exponent: i32,
    /// Unix seconds
    pub publish_time: u64,
}

impl PriceObservation {
    /// Whole units of the observed price, truncated toward zero.
    pub fn normalized(&self) -> Result<u64, MarketError> {
        if self.price < 0 {
            return Err(MarketError::InvalidPrice(self.price));
        }
        let price = self.price as u64;
        let scale = 10u64.checked_pow(self.exponent.unsigned_abs());

        if self.exponent < 0 {
            // a divisor past u64::MAX exceeds any i64 price
            Ok(scale.map_or(0, |scale| price / scale))
        } else {
            scale
                .and_then(|scale| price.checked_mul(scale))
                .ok_or(MarketError::PriceAdjustmentOverflow)
        }
    }
}

/// Price-oracle collaborator
pub trait PriceOracle {
    fn get_price(&self, feed: &FeedKey) -> Result<PriceObservation, OracleError>;
}

/// Fetch an observation and reject it when older than `max_age` seconds at `now`.
pub fn get_price_no_older_than<O: PriceOracle + ?Sized>(
    oracle: &O,
    feed: &FeedKey,
    now: u64,
    max_age: u64,
) -> Result<PriceObservation, MarketError> {
    let observation = oracle.get_price(feed)?;
    let age = now.saturating_sub(observation.publish_time);
    if age > max_age {
        tracing::warn!(feed = %hex::encode(feed), age, max_age, "stale price observation");
        return Err(MarketError::StalePrice { age, max_age });
    }
    Ok(observation)
}

/// Decode a `0x`-prefixed hex feed id into its key
pub fn feed_key_from_hex(feed_id: &str) -> Result<FeedKey, MarketError> {
    let digits = feed_id.strip_prefix("0x").unwrap_or(feed_id);
    let bytes = hex::decode(digits).map_err(|e| MarketError::InvalidFeedId(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| MarketError::InvalidFeedId(format!("expected 32 bytes, got {}", b.len())))
}

// ============================================================================
// IN-MEMORY ORACLE
// ============================================================================

/// Latest observation per feed, pushed by the host or by tests
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryPriceOracle {
    feeds: HashMap<String, PriceObservation>,
}

impl MemoryPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&mut self, feed: FeedKey, observation: PriceObservation) {
        tracing::debug!(feed = %hex::encode(feed), price = observation.price, exponent = observation.exponent, "price published");
        self.feeds.insert(hex::encode(feed), observation);
    }
}

impl PriceOracle for MemoryPriceOracle {
    fn get_price(&self, feed: &FeedKey) -> Result<PriceObservation, OracleError> {
        let key = hex::encode(feed);
        self.feeds
            .get(&key)
            .copied()
            .ok_or(OracleError::FeedNotFound(key))
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OracleError {
    FeedNotFound(String),
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleError::FeedNotFound(feed) => write!(f, "No observation for feed 0x{}", feed),
        }
    }
}

impl std::error::Error for OracleError {}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: FeedKey = [0xef; 32];

    fn observation(price: i64, exponent: i32, publish_time: u64) -> PriceObservation {
        PriceObservation { price, exponent, publish_time }
    }

    #[test]
    fn test_normalize_negative_exponent() {
        assert_eq!(observation(14_012_345_678, -8, 0).normalized().unwrap(), 140);
        assert_eq!(observation(99, -2, 0).normalized().unwrap(), 0);
    }

    #[test]
    fn test_normalize_huge_negative_exponent_truncates_to_zero() {
        assert_eq!(observation(5, -20, 0).normalized(), Ok(0));
        assert_eq!(observation(i64::MAX, -19, 0).normalized(), Ok(0));
        assert_eq!(observation(i64::MAX, i32::MIN, 0).normalized(), Ok(0));
        assert_eq!(
            observation(1, 20, 0).normalized(),
            Err(MarketError::PriceAdjustmentOverflow)
        );
    }

    #[test]
    fn test_normalize_positive_exponent() {
        assert_eq!(observation(14, 1, 0).normalized().unwrap(), 140);
        assert_eq!(observation(140, 0, 0).normalized().unwrap(), 140);
        assert_eq!(
            observation(i64::MAX, 2, 0).normalized(),
            Err(MarketError::PriceAdjustmentOverflow)
        );
    }

    #[test]
    fn test_negative_price_rejected() {
        assert_eq!(observation(-1, 0, 0).normalized(), Err(MarketError::InvalidPrice(-1)));
    }

    #[test]
    fn test_staleness_window() {
        let mut oracle = MemoryPriceOracle::new();
        oracle.publish(FEED, observation(140, 0, 1_000));

        assert!(get_price_no_older_than(&oracle, &FEED, 1_030, 30).is_ok());
        assert_eq!(
            get_price_no_older_than(&oracle, &FEED, 1_031, 30),
            Err(MarketError::StalePrice { age: 31, max_age: 30 })
        );
        // published after the caller's clock reading
        assert!(get_price_no_older_than(&oracle, &FEED, 990, 30).is_ok());
    }

    #[test]
    fn test_missing_feed() {
        let oracle = MemoryPriceOracle::new();
        let err = get_price_no_older_than(&oracle, &FEED, 0, 30).unwrap_err();
        assert_eq!(err.code(), "PriceUnavailable");
    }

    #[test]
    fn test_feed_key_from_hex() {
        let id = "0xef0d8b6fda2ceba41da15d4095d1da392a0d2f8ed0c6c7bc0f4cfac8c280b56d";
        let key = feed_key_from_hex(id).unwrap();
        assert_eq!(key[0], 0xef);
        assert_eq!(key[31], 0x6d);
        assert_eq!(feed_key_from_hex("0xzz").unwrap_err().code(), "InvalidFeedId");
        assert_eq!(feed_key_from_hex("0xabcd").unwrap_err().code(), "InvalidFeedId");
    }
}

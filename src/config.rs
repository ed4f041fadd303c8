// ============================================================================
// Market Configuration - protocol constants and environment overrides
// ============================================================================

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::address::Address;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Seed label of the Higher pool
pub const HIGHER_POOL_SEED: &str = "higher_pool";

/// Seed label of the Lower pool
pub const LOWER_POOL_SEED: &str = "lower_pool";

/// Seed label of every bet
pub const BET_SEED: &str = "prediction_bet";

/// Canonical feed id length: "0x" followed by 64 hex characters
pub const FEED_ID_LENGTH: usize = 66;

/// Amount moved from the creator into EACH pool when pools are initialized
pub const INITIAL_POOL_AMOUNT: u64 = 1_000_000;

/// Shortest market the protocol accepts (seconds)
pub const MIN_MARKET_DURATION_SECS: u64 = 1200;

/// Oldest oracle observation accepted at settlement (seconds)
pub const MAX_PRICE_AGE_SECS: u64 = 30;

/// Namespace all market addresses are derived under
pub const DEFAULT_PROGRAM_ID: Address = Address::new([
    0x35, 0x9a, 0x0c, 0x71, 0xe2, 0x4f, 0xb8, 0x13, 0x6d, 0xa0, 0x57, 0xc9, 0x21, 0x8e, 0xf4, 0x02,
    0x9b, 0x66, 0x1d, 0xc3, 0x48, 0x7a, 0xe5, 0x10, 0x2c, 0xbf, 0x93, 0x04, 0x5e, 0xd7, 0x81, 0x6b,
]);

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Namespace for derived addresses
    pub program_id: Address,
    /// Seed amount per pool
    pub initial_pool_amount: u64,
    pub min_market_duration: u64,
    pub max_price_age: u64,
    /// Whether a bet landing exactly at `start_time + market_duration` is accepted
    pub accept_bets_at_expiry: bool,
    /// Mints accepted as pool tokens; empty means any mint
    pub allowed_mints: Vec<Address>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            program_id: DEFAULT_PROGRAM_ID,
            initial_pool_amount: INITIAL_POOL_AMOUNT,
            min_market_duration: MIN_MARKET_DURATION_SECS,
            max_price_age: MAX_PRICE_AGE_SECS,
            accept_bets_at_expiry: false,
            allowed_mints: Vec::new(),
        }
    }
}

impl MarketConfig {
    /// Defaults overridden by `MARKET_*` environment variables (and `.env`)
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            program_id: env_parse("MARKET_PROGRAM_ID").unwrap_or(defaults.program_id),
            initial_pool_amount: env_parse("MARKET_INITIAL_POOL_AMOUNT").unwrap_or(defaults.initial_pool_amount),
            min_market_duration: env_parse("MARKET_MIN_DURATION_SECS").unwrap_or(defaults.min_market_duration),
            max_price_age: env_parse("MARKET_MAX_PRICE_AGE_SECS").unwrap_or(defaults.max_price_age),
            accept_bets_at_expiry: std::env::var("MARKET_ACCEPT_BETS_AT_EXPIRY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.accept_bets_at_expiry),
            allowed_mints: std::env::var("MARKET_ALLOWED_MINTS")
                .map(|v| parse_mint_list(&v))
                .unwrap_or(defaults.allowed_mints),
        };

        tracing::info!(
            program_id = %config.program_id,
            initial_pool_amount = config.initial_pool_amount,
            min_market_duration = config.min_market_duration,
            max_price_age = config.max_price_age,
            allowed_mints = config.allowed_mints.len(),
            "market config loaded"
        );
        config
    }

    pub fn is_mint_allowed(&self, mint: &Address) -> bool {
        self.allowed_mints.is_empty() || self.allowed_mints.contains(mint)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}

fn parse_mint_list(raw: &str) -> Vec<Address> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse() {
            Ok(mint) => Some(mint),
            Err(e) => {
                tracing::warn!(mint = s, error = %e, "skipping malformed allowed mint");
                None
            }
        })
        .collect()
}

// ============================================================================
// Market State - persisted records
// ============================================================================
//
// Market is the root record. Pools and bets point back at it by address but
// never own it. A market moves through its phases by rewriting the single
// `initialization` tag; there is no per-phase record type.
//
// ============================================================================

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::address::{hash_to_seed, Address};
use crate::config::{FEED_ID_LENGTH, HIGHER_POOL_SEED, LOWER_POOL_SEED};
use crate::error::MarketError;

// ============================================================================
// FEED ID
// ============================================================================

/// Zero-padded UTF-8 feed identifier of exactly 66 bytes
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeedId([u8; FEED_ID_LENGTH]);

impl FeedId {
    /// Accepts only inputs whose UTF-8 encoding is exactly 66 bytes with no NUL.
    pub fn parse(feed_id: &str) -> Result<Self, MarketError> {
        let bytes = feed_id.as_bytes();
        if bytes.len() != FEED_ID_LENGTH {
            return Err(MarketError::IncorrectFeedIDLength { len: bytes.len() });
        }
        if bytes.contains(&0) {
            return Err(MarketError::InvalidFeedId("feed id contains a NUL byte".into()));
        }
        let mut padded = [0u8; FEED_ID_LENGTH];
        padded[..bytes.len()].copy_from_slice(bytes);
        Ok(FeedId(padded))
    }

    pub fn as_bytes(&self) -> &[u8; FEED_ID_LENGTH] {
        &self.0
    }

    /// Text form with the zero padding stripped
    pub fn as_str(&self) -> Result<&str, MarketError> {
        let end = self.0.iter().position(|b| *b == 0).unwrap_or(FEED_ID_LENGTH);
        std::str::from_utf8(&self.0[..end]).map_err(|_| MarketError::InvalidUtf8)
    }

    /// 32-byte seed standing in for the feed id during derivation
    pub fn seed(&self) -> [u8; 32] {
        hash_to_seed(&self.0)
    }
}

impl fmt::Debug for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Ok(s) => write!(f, "FeedId({})", s),
            Err(_) => write!(f, "FeedId({})", hex::encode(self.0)),
        }
    }
}

impl Serialize for FeedId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            let text = self.as_str().map_err(<S::Error as serde::ser::Error>::custom)?;
            serializer.serialize_str(text)
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for FeedId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let text = String::deserialize(deserializer)?;
            FeedId::parse(&text).map_err(de::Error::custom)
        } else {
            let bytes = Vec::<u8>::deserialize(deserializer)?;
            let array: [u8; FEED_ID_LENGTH] = bytes
                .try_into()
                .map_err(|b: Vec<u8>| <D::Error as de::Error>::invalid_length(b.len(), &"66 feed id bytes"))?;
            Ok(FeedId(array))
        }
    }
}

// ============================================================================
// ENUMS
// ============================================================================

/// Side of a bet, and name of the pool that holds it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Higher,
    Lower,
}

impl Direction {
    /// Single byte used in bet derivation
    pub fn to_u8(self) -> u8 {
        match self {
            Direction::Higher => 0,
            Direction::Lower => 1,
        }
    }

    pub fn pool_seed(self) -> &'static str {
        match self {
            Direction::Higher => HIGHER_POOL_SEED,
            Direction::Lower => LOWER_POOL_SEED,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Higher => Direction::Lower,
            Direction::Lower => Direction::Higher,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Higher => write!(f, "higher"),
            Direction::Lower => write!(f, "lower"),
        }
    }
}

/// Market phase. Cancelled and finalized markets have no record at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketInitialization {
    InitializedMarket,
    InitializedPools,
}

// ============================================================================
// RECORDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub creator: Address,
    pub feed_id: FeedId,
    pub target_price: u64,
    /// Unix seconds at `initialize_market`
    pub start_time: u64,
    pub market_duration: u64,
    /// Staking unit, fixed by `initialize_pools`
    pub mint: Option<Address>,
    pub higher_pool_bump: Option<u8>,
    pub lower_pool_bump: Option<u8>,
    pub initialization: MarketInitialization,
    pub bump: u8,
}

impl Market {
    /// Seconds since creation as seen by the caller's clock
    pub fn elapsed(&self, now: u64) -> u64 {
        now.saturating_sub(self.start_time)
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.elapsed(now) >= self.market_duration
    }

    pub fn pool_bump(&self, direction: Direction) -> Option<u8> {
        match direction {
            Direction::Higher => self.higher_pool_bump,
            Direction::Lower => self.lower_pool_bump,
        }
    }
}

/// Escrow ledger for one side of a market
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub market: Address,
    pub bump: u8,
    pub balance: u64,
}

/// A placed bet. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bet {
    pub market: Address,
    pub user: Address,
    pub amount: u64,
    pub direction: Direction,
    pub bump: u8,
}

// ============================================================================
// ACCOUNT ENCODING
// ============================================================================

/// A record that can live in the account store.
///
/// Encoded bytes are an 8-byte discriminator, `sha256("account:<NAME>")[..8]`,
/// followed by the bincode body.
pub trait AccountRecord: Serialize + DeserializeOwned {
    const NAME: &'static str;

    fn discriminator() -> [u8; 8] {
        let digest = Sha256::digest(format!("account:{}", Self::NAME).as_bytes());
        let mut out = [0u8; 8];
        out.copy_from_slice(&digest[..8]);
        out
    }

    fn encode(&self) -> Result<Vec<u8>, MarketError> {
        let body = bincode::serialize(self).map_err(|e| MarketError::AccountDidNotSerialize(e.to_string()))?;
        let mut data = Self::discriminator().to_vec();
        data.extend_from_slice(&body);
        Ok(data)
    }

    /// `None` when the bytes belong to another record type
    fn decode(data: &[u8]) -> Option<Result<Self, MarketError>> {
        if data.len() < 8 || data[..8] != Self::discriminator() {
            return None;
        }
        Some(bincode::deserialize(&data[8..]).map_err(|e| MarketError::AccountDidNotDeserialize(e.to_string())))
    }
}

impl AccountRecord for Market {
    const NAME: &'static str = "Market";
}

impl AccountRecord for Pool {
    const NAME: &'static str = "Pool";
}

impl AccountRecord for Bet {
    const NAME: &'static str = "Bet";
}

//! Deterministic Address Derivation
//!
//! Every market, pool and bet lives at an address computed from its defining
//! fields. Nothing maps entities to addresses on disk: a lookup recomputes the
//! address from the same seeds.
//!
//! A derived address must never be usable as a primary identity, so candidates
//! that decode to a valid Ed25519 public key are skipped. The search starts at
//! bump 255 and walks down until a candidate falls off the curve.

use ed25519_dalek::VerifyingKey;
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeTuple, Serializer};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Byte length of every address
pub const ADDRESS_BYTES: usize = 32;

/// Maximum number of seeds in one derivation (bump excluded)
pub const MAX_SEEDS: usize = 16;

/// Maximum length of a single seed
pub const MAX_SEED_LEN: usize = 32;

/// Domain separator appended to every derivation hash
const DERIVED_ADDRESS_MARKER: &[u8] = b"ProgramDerivedAddress";

// ============================================================================
// ADDRESS
// ============================================================================

/// A 32-byte account identifier
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_BYTES]);

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_BYTES]) -> Self {
        Address(bytes)
    }

    /// Random address, for mints and fixtures
    pub fn new_unique() -> Self {
        Address(rand::random())
    }

    pub fn to_bytes(self) -> [u8; ADDRESS_BYTES] {
        self.0
    }

    /// True when the bytes decompress to an Ed25519 point, i.e. the address
    /// could belong to a keypair.
    pub fn is_on_curve(&self) -> bool {
        VerifyingKey::from_bytes(&self.0).is_ok()
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; ADDRESS_BYTES]> for Address {
    fn from(bytes: [u8; ADDRESS_BYTES]) -> Self {
        Address(bytes)
    }
}

impl From<&VerifyingKey> for Address {
    fn from(key: &VerifyingKey) -> Self {
        Address(key.to_bytes())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = hex::encode(self.0);
        write!(f, "Address({}..{})", &encoded[..8], &encoded[56..])
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(trimmed).map_err(|e| AddressError::InvalidEncoding(e.to_string()))?;
        let array: [u8; ADDRESS_BYTES] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| AddressError::InvalidEncoding(format!("expected 32 bytes, got {}", b.len())))?;
        Ok(Address(array))
    }
}

// Hex string for JSON, raw 32-byte tuple for bincode.
impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&hex::encode(self.0))
        } else {
            let mut tuple = serializer.serialize_tuple(ADDRESS_BYTES)?;
            for byte in &self.0 {
                tuple.serialize_element(byte)?;
            }
            tuple.end()
        }
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Address::from_str(&s).map_err(de::Error::custom)
        } else {
            struct BytesVisitor;

            impl<'de> Visitor<'de> for BytesVisitor {
                type Value = Address;

                fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                    write!(f, "{} address bytes", ADDRESS_BYTES)
                }

                fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Address, A::Error> {
                    let mut bytes = [0u8; ADDRESS_BYTES];
                    for (i, slot) in bytes.iter_mut().enumerate() {
                        *slot = seq
                            .next_element()?
                            .ok_or_else(|| de::Error::invalid_length(i, &self))?;
                    }
                    Ok(Address(bytes))
                }
            }

            deserializer.deserialize_tuple(ADDRESS_BYTES, BytesVisitor)
        }
    }
}

// ============================================================================
// DERIVATION
// ============================================================================

/// Hash arbitrary-length data down to a single 32-byte seed
pub fn hash_to_seed(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// One derivation step with an explicit bump.
///
/// Fails with `InvalidSeeds` when the candidate lies on the curve.
pub fn create_derived_address(
    seeds: &[&[u8]],
    bump: u8,
    namespace: &Address,
) -> Result<Address, AddressError> {
    check_seeds(seeds)?;

    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update([bump]);
    hasher.update(namespace.as_ref());
    hasher.update(DERIVED_ADDRESS_MARKER);

    let candidate = Address(hasher.finalize().into());
    if candidate.is_on_curve() {
        return Err(AddressError::InvalidSeeds);
    }
    Ok(candidate)
}

/// Search bumps from 255 down and return the first off-curve candidate.
pub fn find_derived_address(
    seeds: &[&[u8]],
    namespace: &Address,
) -> Result<(Address, u8), AddressError> {
    check_seeds(seeds)?;

    for bump in (0..=u8::MAX).rev() {
        match create_derived_address(seeds, bump, namespace) {
            Ok(address) => return Ok((address, bump)),
            Err(AddressError::InvalidSeeds) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(AddressError::NoViableBump)
}

fn check_seeds(seeds: &[&[u8]]) -> Result<(), AddressError> {
    if seeds.len() > MAX_SEEDS {
        return Err(AddressError::MaxSeedLengthExceeded);
    }
    if seeds.iter().any(|seed| seed.len() > MAX_SEED_LEN) {
        return Err(AddressError::MaxSeedLengthExceeded);
    }
    Ok(())
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressError {
    MaxSeedLengthExceeded,
    InvalidSeeds,
    NoViableBump,
    InvalidEncoding(String),
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressError::MaxSeedLengthExceeded => write!(f, "Seed count or seed length exceeds the derivation limit"),
            AddressError::InvalidSeeds => write!(f, "Seeds produce an address on the Ed25519 curve"),
            AddressError::NoViableBump => write!(f, "No bump produces an off-curve address"),
            AddressError::InvalidEncoding(msg) => write!(f, "Invalid address encoding: {}", msg),
        }
    }
}

impl std::error::Error for AddressError {}

// ============================================================================
// TESTS
// ============================================================================

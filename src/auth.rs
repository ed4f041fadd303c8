//! Signed instruction envelopes
//!
//! The host only dispatches instructions whose Ed25519 signature checks out
//! against the signer's public key. The signer address IS the public key.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::address::Address;
use crate::market::Instruction;

/// Envelope validity window (5 minutes)
pub const INSTRUCTION_EXPIRY_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedInstruction {
    /// Ed25519 public key of the submitter
    pub signer: Address,
    /// Must be greater than the last nonce accepted from this signer
    pub nonce: u64,
    /// Unix seconds at signing
    pub timestamp: u64,
    pub instruction: Instruction,
    /// Ed25519 signature (128 hex chars)
    pub signature: String,
}

impl SignedInstruction {
    /// Sign `instruction` with `key`
    pub fn sign(key: &SigningKey, nonce: u64, timestamp: u64, instruction: Instruction) -> Result<Self, AuthError> {
        let mut envelope = SignedInstruction {
            signer: Address::from(&key.verifying_key()),
            nonce,
            timestamp,
            instruction,
            signature: String::new(),
        };
        let message = envelope.signing_bytes()?;
        envelope.signature = hex::encode(key.sign(&message).to_bytes());
        Ok(envelope)
    }

    /// SHA256(nonce || timestamp || signer || instruction_json)
    pub fn signing_bytes(&self) -> Result<Vec<u8>, AuthError> {
        let instruction = serde_json::to_vec(&self.instruction)
            .map_err(|e| AuthError::SerializationError(e.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(self.nonce.to_be_bytes());
        hasher.update(self.timestamp.to_be_bytes());
        hasher.update(self.signer.as_ref());
        hasher.update(&instruction);
        Ok(hasher.finalize().to_vec())
    }

    pub fn verify(&self) -> Result<(), AuthError> {
        let verifying_key = VerifyingKey::from_bytes(&self.signer.to_bytes())
            .map_err(|e| AuthError::InvalidPubkey(e.to_string()))?;

        let sig_bytes = hex::decode(&self.signature).map_err(|e| AuthError::InvalidSignature(e.to_string()))?;
        let sig_array: [u8; 64] = sig_bytes
            .try_into()
            .map_err(|b: Vec<u8>| AuthError::InvalidSignature(format!("Expected 64 bytes, got {}", b.len())))?;
        let signature = Signature::from_bytes(&sig_array);

        verifying_key
            .verify(&self.signing_bytes()?, &signature)
            .map_err(|_| AuthError::SignatureMismatch)
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.timestamp) > INSTRUCTION_EXPIRY_SECS
    }

    /// Signature and expiry together
    pub fn validate(&self, now: u64) -> Result<(), AuthError> {
        if self.is_expired(now) {
            return Err(AuthError::Expired);
        }
        self.verify()
    }
}

/// Deterministic keypair derived from SHA256(seed || name); dev and tests only
pub fn signing_key_from_seed(seed: &[u8; 32], name: &str) -> SigningKey {
    let mut hasher = Sha256::new();
    hasher.update(seed);
    hasher.update(name.as_bytes());
    let derived: [u8; 32] = hasher.finalize().into();
    SigningKey::from_bytes(&derived)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    InvalidPubkey(String),
    InvalidSignature(String),
    SignatureMismatch,
    Expired,
    StaleNonce { nonce: u64, last: u64 },
    SerializationError(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidPubkey(msg) => write!(f, "Invalid pubkey: {}", msg),
            AuthError::InvalidSignature(msg) => write!(f, "Invalid signature: {}", msg),
            AuthError::SignatureMismatch => write!(f, "Signature does not match"),
            AuthError::Expired => write!(f, "Instruction expired"),
            AuthError::StaleNonce { nonce, last } => write!(f, "Invalid nonce: {} <= {}", nonce, last),
            AuthError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

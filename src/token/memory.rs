use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Holding, LedgerError, TokenLedger};
use crate::address::{find_derived_address, Address};

/// Namespace for holding addresses inside the in-memory ledger
pub const TOKEN_LEDGER_ID: Address = Address::new([
    0x06, 0xdd, 0xf6, 0xe1, 0xd7, 0x65, 0xa1, 0x93, 0xd9, 0xcb, 0xe1, 0x46, 0xce, 0xeb, 0x79, 0xac,
    0x1c, 0xb4, 0x85, 0xed, 0x5f, 0x5b, 0x37, 0x91, 0x3a, 0x8c, 0xf5, 0x85, 0x7e, 0xff, 0x00, 0xa9,
]);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintInfo {
    pub decimals: u8,
    pub supply: u64,
}

/// In-process token ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryTokenLedger {
    pub mints: BTreeMap<Address, MintInfo>,
    pub holdings: BTreeMap<Address, Holding>,
}

impl MemoryTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh mint and return its address
    pub fn create_mint(&mut self, decimals: u8) -> Address {
        let mint = Address::new_unique();
        self.mints.insert(mint, MintInfo { decimals, supply: 0 });
        tracing::debug!(%mint, decimals, "mint created");
        mint
    }

    /// Address a holding of `mint` for `owner` lives at, open or not
    pub fn holding_address(owner: &Address, mint: &Address) -> Address {
        // Two 32-byte seeds always fit the derivation limits.
        find_derived_address(&[owner.as_ref(), mint.as_ref()], &TOKEN_LEDGER_ID)
            .map(|(address, _)| address)
            .unwrap_or_default()
    }

    pub fn supply(&self, mint: &Address) -> Option<u64> {
        self.mints.get(mint).map(|m| m.supply)
    }
}

impl TokenLedger for MemoryTokenLedger {
    fn create_holding(&mut self, owner: &Address, mint: &Address) -> Result<Address, LedgerError> {
        if !self.mints.contains_key(mint) {
            return Err(LedgerError::MintNotFound(*mint));
        }
        let address = Self::holding_address(owner, mint);
        if self.holdings.contains_key(&address) {
            return Err(LedgerError::HoldingAlreadyExists(address));
        }
        self.holdings.insert(address, Holding { owner: *owner, mint: *mint, amount: 0 });
        tracing::debug!(%owner, %mint, holding = %address, "holding opened");
        Ok(address)
    }

    fn find_holding(&self, owner: &Address, mint: &Address) -> Option<Address> {
        let address = Self::holding_address(owner, mint);
        self.holdings.contains_key(&address).then_some(address)
    }

    fn holding(&self, holding: &Address) -> Result<Holding, LedgerError> {
        self.holdings
            .get(holding)
            .cloned()
            .ok_or(LedgerError::HoldingNotFound(*holding))
    }

    fn mint_exists(&self, mint: &Address) -> bool {
        self.mints.contains_key(mint)
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: u64, mint: &Address) -> Result<(), LedgerError> {
        let source = self.holding(from)?;
        let destination = self.holding(to)?;

        for holding in [&source, &destination] {
            if holding.mint != *mint {
                return Err(LedgerError::MintMismatch { expected: *mint, actual: holding.mint });
            }
        }
        if source.amount < amount {
            return Err(LedgerError::InsufficientFunds { available: source.amount, required: amount });
        }
        if from == to {
            return Ok(());
        }
        let credited = destination.amount.checked_add(amount).ok_or(LedgerError::Overflow)?;

        if let Some(h) = self.holdings.get_mut(from) {
            h.amount -= amount;
        }
        if let Some(h) = self.holdings.get_mut(to) {
            h.amount = credited;
        }
        Ok(())
    }

    fn mint_to(&mut self, to: &Address, amount: u64) -> Result<(), LedgerError> {
        let holding = self.holding(to)?;
        let info = self
            .mints
            .get(&holding.mint)
            .ok_or(LedgerError::MintNotFound(holding.mint))?;

        let supply = info.supply.checked_add(amount).ok_or(LedgerError::Overflow)?;
        let balance = holding.amount.checked_add(amount).ok_or(LedgerError::Overflow)?;

        if let Some(info) = self.mints.get_mut(&holding.mint) {
            info.supply = supply;
        }
        if let Some(h) = self.holdings.get_mut(to) {
            h.amount = balance;
        }
        Ok(())
    }

    fn close_holding(&mut self, holding: &Address) -> Result<(), LedgerError> {
        let current = self.holding(holding)?;
        if current.amount != 0 {
            return Err(LedgerError::NonZeroBalance { holding: *holding, amount: current.amount });
        }
        self.holdings.remove(holding);
        Ok(())
    }
}

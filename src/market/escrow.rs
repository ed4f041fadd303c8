//! Pool escrow ledger
//!
//! Each market has a Higher and a Lower pool. A pool is a `Pool` record plus a
//! custody holding in the token ledger owned by the pool's derived address.
//! The record balance mirrors the custody holding: it only grows (seed, then
//! bets) until `drain` empties and destroys both.

use super::{pool_address, Transaction};
use crate::address::{create_derived_address, Address};
use crate::error::MarketError;
use crate::state::{Direction, Market, Pool};
use crate::token::{LedgerError, TokenLedger};

/// Recompute a pool address from the bump recorded on the market
pub(crate) fn existing_pool_address(
    program_id: &Address,
    market_address: &Address,
    market: &Market,
    direction: Direction,
) -> Result<Address, MarketError> {
    let bump = market
        .pool_bump(direction)
        .ok_or(MarketError::InvalidMarketInitialization)?;
    Ok(create_derived_address(
        &[direction.pool_seed().as_bytes(), market_address.as_ref()],
        bump,
        program_id,
    )?)
}

fn custody_holding<L: TokenLedger>(ledger: &L, pool: &Address, mint: &Address) -> Result<Address, MarketError> {
    ledger
        .find_holding(pool, mint)
        .ok_or(MarketError::Ledger(LedgerError::NoHolding { owner: *pool, mint: *mint }))
}

/// Create the pool record and its custody holding, then move `seed` into it.
/// Returns the pool address and bump.
pub(crate) fn open_pool<L: TokenLedger>(
    tx: &mut Transaction<L>,
    market: &Address,
    direction: Direction,
    mint: &Address,
    funder: &Address,
    seed: u64,
) -> Result<(Address, u8), MarketError> {
    let (address, bump) = pool_address(&tx.program_id, market, direction)?;

    tx.accounts.create(address, tx.program_id, &Pool { market: *market, bump, balance: 0 })?;
    tx.ledger.create_holding(&address, mint)?;
    credit(tx, &address, funder, seed, mint)?;

    tracing::debug!(%market, pool = %address, %direction, seed, "pool opened");
    Ok((address, bump))
}

/// Move `amount` from `from` into the pool and bump its balance.
/// Returns the new balance.
pub(crate) fn credit<L: TokenLedger>(
    tx: &mut Transaction<L>,
    pool_address: &Address,
    from: &Address,
    amount: u64,
    mint: &Address,
) -> Result<u64, MarketError> {
    let mut pool: Pool = tx.accounts.load(pool_address)?;
    let custody = custody_holding(&tx.ledger, pool_address, mint)?;
    let balance = pool.balance.checked_add(amount).ok_or(MarketError::ArithmeticOverflow)?;

    tx.ledger.transfer(from, &custody, amount, mint)?;
    pool.balance = balance;
    tx.accounts.store(pool_address, &pool)?;
    Ok(balance)
}

/// Pay the whole pool out to `to`, close the custody holding and destroy the
/// record. Returns the amount paid.
pub(crate) fn drain<L: TokenLedger>(
    tx: &mut Transaction<L>,
    pool_address: &Address,
    to: &Address,
    mint: &Address,
) -> Result<u64, MarketError> {
    let pool: Pool = tx.accounts.load(pool_address)?;
    let custody = custody_holding(&tx.ledger, pool_address, mint)?;

    let held = tx.ledger.balance(&custody)?;
    if held != pool.balance {
        return Err(MarketError::EscrowMismatch { pool: *pool_address, recorded: pool.balance, held });
    }

    if pool.balance > 0 {
        tx.ledger.transfer(&custody, to, pool.balance, mint)?;
    }
    tx.ledger.close_holding(&custody)?;
    tx.accounts.close::<Pool>(pool_address)?;

    tracing::debug!(pool = %pool_address, amount = pool.balance, "pool drained");
    Ok(pool.balance)
}

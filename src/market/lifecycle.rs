//! Market lifecycle
//!
//! The five operations of the program. Each one validates signer and phase
//! before touching anything, then runs inside `transact` so a failure leaves
//! accounts, ledger and event log as they were.

use super::escrow::{self, existing_pool_address};
use super::settlement::{self, combined_payout, Settlement};
use super::{bet_address, market_address, Context, PredictionMarket, Transaction};
use crate::address::Address;
use crate::error::MarketError;
use crate::events::MarketEvent;
use crate::oracle::PriceOracle;
use crate::state::{Bet, Direction, FeedId, Market, MarketInitialization};
use crate::token::{LedgerError, TokenLedger};

fn require_creator(market: &Market, ctx: &Context) -> Result<(), MarketError> {
    if market.creator != ctx.signer {
        return Err(MarketError::UnauthorizedUser { expected: market.creator, actual: ctx.signer });
    }
    Ok(())
}

fn require_phase(market: &Market, phase: MarketInitialization) -> Result<(), MarketError> {
    if market.initialization != phase {
        return Err(MarketError::InvalidMarketInitialization);
    }
    Ok(())
}

fn holding_of<L: TokenLedger>(ledger: &L, owner: &Address, mint: &Address) -> Result<Address, MarketError> {
    ledger
        .find_holding(owner, mint)
        .ok_or(MarketError::Ledger(LedgerError::NoHolding { owner: *owner, mint: *mint }))
}

fn market_mint(market: &Market) -> Result<Address, MarketError> {
    market.mint.ok_or(MarketError::InvalidMarketInitialization)
}

impl PredictionMarket {
    /// Create a market record in phase `InitializedMarket`. Moves no funds.
    pub fn initialize_market(
        &mut self,
        ctx: &Context,
        target_price: u64,
        feed_id: &str,
        market_duration: u64,
    ) -> Result<Address, MarketError> {
        let result = self.create_market(ctx, target_price, feed_id, market_duration);
        if let Err(e) = &result {
            tracing::warn!(operation = "initialize_market", code = e.code(), error = %e, "operation rejected");
        }
        result
    }

    fn create_market(
        &mut self,
        ctx: &Context,
        target_price: u64,
        feed_id: &str,
        market_duration: u64,
    ) -> Result<Address, MarketError> {
        let feed_id = FeedId::parse(feed_id)?;
        if market_duration < self.config.min_market_duration {
            return Err(MarketError::ShortMarketDuration {
                duration: market_duration,
                min: self.config.min_market_duration,
            });
        }

        let program_id = self.config.program_id;
        let (address, bump) = market_address(&program_id, &ctx.signer, &feed_id, target_price, market_duration)?;

        let market = Market {
            creator: ctx.signer,
            feed_id,
            target_price,
            start_time: ctx.now,
            market_duration,
            mint: None,
            higher_pool_bump: None,
            lower_pool_bump: None,
            initialization: MarketInitialization::InitializedMarket,
            bump,
        };
        // create is the only write, so a failure here leaves nothing behind
        self.accounts.create(address, program_id, &market)?;

        self.events.push(MarketEvent::MarketInitialized {
            market: address,
            creator: ctx.signer,
            target_price,
            market_duration,
            start_time: ctx.now,
        });
        tracing::info!(market = %address, creator = %ctx.signer, target_price, market_duration, "market initialized");
        Ok(address)
    }

    /// Open and seed both pools from the creator's holding of `mint`.
    /// Returns the (higher, lower) pool addresses.
    pub fn initialize_pools<L: TokenLedger + Clone>(
        &mut self,
        ctx: &Context,
        ledger: &mut L,
        market_address: &Address,
        mint: &Address,
    ) -> Result<(Address, Address), MarketError> {
        self.transact("initialize_pools", ledger, |tx| {
            let mut market: Market = tx.accounts.load(market_address)?;
            require_creator(&market, ctx)?;
            require_phase(&market, MarketInitialization::InitializedMarket)?;

            if !tx.config.is_mint_allowed(mint) {
                return Err(MarketError::InvalidPoolMint(*mint));
            }
            if !tx.ledger.mint_exists(mint) {
                return Err(LedgerError::MintNotFound(*mint).into());
            }
            let funder = holding_of(&tx.ledger, &ctx.signer, mint)?;
            let seed = tx.config.initial_pool_amount;

            let (higher, higher_bump) =
                escrow::open_pool(tx, market_address, Direction::Higher, mint, &funder, seed)?;
            let (lower, lower_bump) =
                escrow::open_pool(tx, market_address, Direction::Lower, mint, &funder, seed)?;

            market.mint = Some(*mint);
            market.higher_pool_bump = Some(higher_bump);
            market.lower_pool_bump = Some(lower_bump);
            market.initialization = MarketInitialization::InitializedPools;
            tx.accounts.store(market_address, &market)?;

            tx.events.push(MarketEvent::PoolsInitialized { market: *market_address, mint: *mint, seed_amount: seed });
            tracing::info!(market = %market_address, %mint, seed, "pools initialized");
            Ok((higher, lower))
        })
    }

    /// Stake `amount` on `direction`. Returns the bet address.
    pub fn place_bet<L: TokenLedger + Clone>(
        &mut self,
        ctx: &Context,
        ledger: &mut L,
        market_address: &Address,
        amount: u64,
        direction: Direction,
    ) -> Result<Address, MarketError> {
        self.transact("place_bet", ledger, |tx| {
            if amount == 0 {
                return Err(MarketError::InvalidBetAmount);
            }
            let market: Market = tx.accounts.load(market_address)?;
            require_phase(&market, MarketInitialization::InitializedPools)?;
            if !betting_open(tx, &market, ctx.now) {
                return Err(MarketError::MarketDurationOver);
            }

            let mint = market_mint(&market)?;
            let from = holding_of(&tx.ledger, &ctx.signer, &mint)?;
            let pool = existing_pool_address(&tx.program_id, market_address, &market, direction)?;

            let (bet, bump) = bet_address(&tx.program_id, &ctx.signer, market_address, amount, direction)?;
            tx.accounts.create(bet, tx.program_id, &Bet {
                market: *market_address,
                user: ctx.signer,
                amount,
                direction,
                bump,
            })?;
            let pool_balance = escrow::credit(tx, &pool, &from, amount, &mint)?;

            tx.events.push(MarketEvent::BetPlaced {
                market: *market_address,
                bet,
                user: ctx.signer,
                amount,
                direction,
            });
            tracing::info!(market = %market_address, %bet, user = %ctx.signer, amount, %direction, pool_balance, "bet placed");
            Ok(bet)
        })
    }

    /// Close the market and return everything held in its pools to the
    /// creator. Returns the refunded amount.
    pub fn cancel_market<L: TokenLedger + Clone>(
        &mut self,
        ctx: &Context,
        ledger: &mut L,
        market_address: &Address,
    ) -> Result<u64, MarketError> {
        self.transact("cancel_market", ledger, |tx| {
            let market: Market = tx.accounts.load(market_address)?;
            require_creator(&market, ctx)?;

            let refunded = match market.initialization {
                MarketInitialization::InitializedMarket => 0,
                MarketInitialization::InitializedPools => {
                    let (higher, lower) = drain_pools(tx, market_address, &market)?;
                    combined_payout(higher, lower)?
                }
            };
            tx.accounts.close::<Market>(market_address)?;

            tx.events.push(MarketEvent::MarketCancelled { market: *market_address, refunded });
            tracing::info!(market = %market_address, refunded, "market cancelled");
            Ok(refunded)
        })
    }

    /// Settle an expired market against the oracle and pay both pools to the
    /// creator.
    pub fn finalize_market<L, O>(
        &mut self,
        ctx: &Context,
        ledger: &mut L,
        oracle: &O,
        market_address: &Address,
    ) -> Result<Settlement, MarketError>
    where
        L: TokenLedger + Clone,
        O: PriceOracle + ?Sized,
    {
        self.transact("finalize_market", ledger, |tx| {
            let market: Market = tx.accounts.load(market_address)?;
            require_creator(&market, ctx)?;
            require_phase(&market, MarketInitialization::InitializedPools)?;
            if !market.is_expired(ctx.now) {
                return Err(MarketError::MarketDurationNotOver);
            }

            let resolution = settlement::resolve(&market, oracle, ctx.now, tx.config.max_price_age)?;

            let (higher_pool, lower_pool) = drain_pools(tx, market_address, &market)?;
            let payout = combined_payout(higher_pool, lower_pool)?;
            tx.accounts.close::<Market>(market_address)?;

            tx.events.push(MarketEvent::MarketFinalized {
                market: *market_address,
                winning_direction: resolution.winning_direction,
                final_price: resolution.final_price,
                payout,
            });
            tracing::info!(
                market = %market_address,
                winning_direction = %resolution.winning_direction,
                final_price = resolution.final_price,
                target_price = market.target_price,
                payout,
                "market finalized"
            );

            Ok(Settlement {
                market: *market_address,
                creator: market.creator,
                winning_direction: resolution.winning_direction,
                final_price: resolution.final_price,
                higher_pool,
                lower_pool,
                payout,
            })
        })
    }
}

fn betting_open<L>(tx: &Transaction<L>, market: &Market, now: u64) -> bool {
    let elapsed = market.elapsed(now);
    elapsed < market.market_duration
        || (elapsed == market.market_duration && tx.config.accept_bets_at_expiry)
}

/// Empty both pools into the creator's holding
fn drain_pools<L: TokenLedger>(
    tx: &mut Transaction<L>,
    market_address: &Address,
    market: &Market,
) -> Result<(u64, u64), MarketError> {
    let mint = market_mint(market)?;
    let to = holding_of(&tx.ledger, &market.creator, &mint)?;

    let higher = existing_pool_address(&tx.program_id, market_address, market, Direction::Higher)?;
    let lower = existing_pool_address(&tx.program_id, market_address, market, Direction::Lower)?;

    let higher_amount = escrow::drain(tx, &higher, &to, &mint)?;
    let lower_amount = escrow::drain(tx, &lower, &to, &mint)?;
    Ok((higher_amount, lower_amount))
}

/// Market lifecycle integration tests
///
/// Drives the program through the library API with the in-memory ledger and
/// oracle: create, fund pools, bet, then cancel or finalize.

use binary_price_market::oracle::feed_key_from_hex;
use binary_price_market::{
    Address, Context, Direction, Instruction, InstructionOutcome, LedgerError, MarketConfig, MarketError,
    MarketEvent, MarketInitialization, MemoryPriceOracle, MemoryTokenLedger, PredictionMarket, PriceObservation,
    TokenLedger, INITIAL_POOL_AMOUNT,
};
use tokio_test::assert_ok;

// ============================================================================
// FIXTURES
// ============================================================================

const FEED: &str = "0xef0d8b6fda2ceba41da15d4095d1da392a0d2f8ed0c6c7bc0f4cfac8c280b56d";
const TARGET_PRICE: u64 = 140;
const DURATION: u64 = 1300;
const START: u64 = 1_700_000_000;
const SEED: u64 = INITIAL_POOL_AMOUNT;
const CREATOR_FUNDS: u64 = 3 * INITIAL_POOL_AMOUNT;
const BET: u64 = 10_000;

struct World {
    program: PredictionMarket,
    ledger: MemoryTokenLedger,
    oracle: MemoryPriceOracle,
    mint: Address,
    alice: Address,
    bob: Address,
    market: Address,
}

impl World {
    fn new(config: MarketConfig) -> Self {
        let mut ledger = MemoryTokenLedger::new();
        let mint = ledger.create_mint(6);
        let alice = Address::new_unique();
        let bob = Address::new_unique();

        let alice_holding = ledger.create_holding(&alice, &mint).unwrap();
        ledger.mint_to(&alice_holding, CREATOR_FUNDS).unwrap();
        let bob_holding = ledger.create_holding(&bob, &mint).unwrap();
        ledger.mint_to(&bob_holding, BET).unwrap();

        let mut program = PredictionMarket::new(config);
        let market = program
            .initialize_market(&Context::new(alice, START), TARGET_PRICE, FEED, DURATION)
            .unwrap();

        Self { program, ledger, oracle: MemoryPriceOracle::new(), mint, alice, bob, market }
    }

    fn with_pools() -> Self {
        let mut world = Self::new(MarketConfig::default());
        assert_ok!(world.initialize_pools(world.alice));
        world
    }

    fn initialize_pools(&mut self, signer: Address) -> Result<(Address, Address), MarketError> {
        self.program
            .initialize_pools(&Context::new(signer, START + 1), &mut self.ledger, &self.market, &self.mint)
    }

    fn bet(&mut self, user: Address, at: u64, amount: u64, direction: Direction) -> Result<Address, MarketError> {
        self.program
            .place_bet(&Context::new(user, START + at), &mut self.ledger, &self.market, amount, direction)
    }

    fn finalize(&mut self, signer: Address, at: u64) -> Result<binary_price_market::Settlement, MarketError> {
        self.program
            .finalize_market(&Context::new(signer, START + at), &mut self.ledger, &self.oracle, &self.market)
    }

    fn publish(&mut self, price: i64, exponent: i32, publish_time: u64) {
        let feed = feed_key_from_hex(FEED).unwrap();
        self.oracle.publish(feed, PriceObservation { price, exponent, publish_time });
    }

    fn balance_of(&self, owner: &Address) -> u64 {
        let holding = self.ledger.find_holding(owner, &self.mint).unwrap();
        self.ledger.balance(&holding).unwrap()
    }

    fn pool_balance(&self, direction: Direction) -> u64 {
        self.program.pool(&self.market, direction).unwrap().balance
    }
}

// ============================================================================
// FULL SCENARIO
// ============================================================================

fn settle_with_price(price: i64) -> (World, binary_price_market::Settlement) {
    let mut world = World::with_pools();
    assert_eq!(world.pool_balance(Direction::Higher), SEED);
    assert_eq!(world.pool_balance(Direction::Lower), SEED);

    let bob = world.bob;
    assert_ok!(world.bet(bob, 100, BET, Direction::Higher));
    assert_eq!(world.pool_balance(Direction::Higher), SEED + BET);
    assert_eq!(world.balance_of(&bob), 0);

    let before = world.balance_of(&world.alice);
    world.publish(price, 0, START + DURATION);
    let settlement = world.finalize(world.alice, DURATION).unwrap();

    assert_eq!(world.balance_of(&world.alice) - before, 2 * SEED + BET);
    (world, settlement)
}

#[test]
fn test_finalize_pays_creator_when_higher_wins() {
    let (world, settlement) = settle_with_price(150);

    assert_eq!(settlement.winning_direction, Direction::Higher);
    assert_eq!(settlement.final_price, 150);
    assert_eq!(settlement.payout, 2 * SEED + BET);
    assert_eq!(settlement.higher_pool, SEED + BET);
    assert_eq!(settlement.lower_pool, SEED);

    assert_eq!(world.program.market(&world.market), Err(MarketError::AccountNotFound(world.market)));
    assert!(world.program.pool(&world.market, Direction::Higher).is_err());
    assert!(world.program.pool(&world.market, Direction::Lower).is_err());
}

#[test]
fn test_finalize_pays_creator_when_lower_wins() {
    let (_, settlement) = settle_with_price(120);
    assert_eq!(settlement.winning_direction, Direction::Lower);
    assert_eq!(settlement.payout, 2 * SEED + BET);
}

#[test]
fn test_bets_survive_settlement() {
    let (world, _) = settle_with_price(150);
    let bets = world.program.bets_for_market(&world.market);
    assert_eq!(bets.len(), 1);
    assert_eq!(bets[0].1.user, world.bob);
    assert_eq!(bets[0].1.amount, BET);
    assert_eq!(world.program.bets_for_user(&world.bob).len(), 1);
}

#[test]
fn test_exact_target_settles_higher() {
    let mut world = World::with_pools();
    world.publish(14_000, -2, START + DURATION);
    let settlement = world.finalize(world.alice, DURATION).unwrap();
    assert_eq!(settlement.final_price, TARGET_PRICE);
    assert_eq!(settlement.winning_direction, Direction::Higher);
}

#[test]
fn test_events_follow_lifecycle() {
    let (world, _) = settle_with_price(150);
    let names: Vec<&str> = world.program.events().iter().map(MarketEvent::name).collect();
    assert_eq!(names, vec!["market_initialized", "pools_initialized", "bet_placed", "market_finalized"]);
    assert!(world.program.events().iter().all(|e| *e.market() == world.market));
}

#[test]
fn test_tiny_scaled_price_still_settles() {
    let mut world = World::with_pools();
    world.publish(5, -20, START + DURATION);
    let settlement = world.finalize(world.alice, DURATION).unwrap();
    assert_eq!(settlement.final_price, 0);
    assert_eq!(settlement.winning_direction, Direction::Lower);
    assert_eq!(settlement.payout, 2 * SEED);
}

// ============================================================================
// STORED RECORDS
// ============================================================================

#[test]
fn test_market_record_matches_inputs() {
    let world = World::new(MarketConfig::default());
    let market = world.program.market(&world.market).unwrap();

    assert_eq!(market.creator, world.alice);
    assert_eq!(market.feed_id.as_str().unwrap(), FEED);
    assert_eq!(market.target_price, TARGET_PRICE);
    assert_eq!(market.market_duration, DURATION);
    assert_eq!(market.start_time, START);
    assert_eq!(market.higher_pool_bump, None);
    assert_eq!(market.lower_pool_bump, None);
    assert_eq!(world.program.market_address(&world.alice, FEED, TARGET_PRICE, DURATION).unwrap(), world.market);
}

#[test]
fn test_pools_record_mint_and_bumps() {
    let world = World::with_pools();
    let market = world.program.market(&world.market).unwrap();

    assert_eq!(market.initialization, MarketInitialization::InitializedPools);
    assert_eq!(market.mint, Some(world.mint));
    assert!(market.higher_pool_bump.is_some());
    assert!(market.lower_pool_bump.is_some());

    let higher = world.program.pool(&world.market, Direction::Higher).unwrap();
    let lower = world.program.pool(&world.market, Direction::Lower).unwrap();
    assert_eq!(market.higher_pool_bump, Some(higher.bump));
    assert_eq!(market.lower_pool_bump, Some(lower.bump));
    assert_eq!(higher.market, world.market);
    assert_eq!(lower.market, world.market);
}

#[test]
fn test_bet_record_at_derived_address() {
    let mut world = World::with_pools();
    let bob = world.bob;
    let placed = world.bet(bob, 30, 2_500, Direction::Lower).unwrap();

    let address = world.program.bet_address(&bob, &world.market, 2_500, Direction::Lower).unwrap();
    assert_eq!(placed, address);

    let bet = world.program.bet(&address).unwrap();
    assert_eq!(bet.market, world.market);
    assert_eq!(bet.user, bob);
    assert_eq!(bet.amount, 2_500);
    assert_eq!(bet.direction, Direction::Lower);
    assert_eq!(world.pool_balance(Direction::Lower), SEED + 2_500);
    assert_eq!(world.pool_balance(Direction::Higher), SEED);
}

// ============================================================================
// TERMINAL STATES
// ============================================================================

#[test]
fn test_double_finalize_is_not_found() {
    let mut world = World::with_pools();
    world.publish(150, 0, START + DURATION);
    assert_ok!(world.finalize(world.alice, DURATION));

    let balance = world.balance_of(&world.alice);
    assert_eq!(world.finalize(world.alice, DURATION), Err(MarketError::AccountNotFound(world.market)));
    assert_eq!(world.balance_of(&world.alice), balance);
}

#[test]
fn test_cancel_refunds_pools_and_bets_to_creator() {
    let mut world = World::with_pools();
    let bob = world.bob;
    assert_ok!(world.bet(bob, 10, BET, Direction::Lower));

    let refunded = world
        .program
        .cancel_market(&Context::new(world.alice, START + 20), &mut world.ledger, &world.market)
        .unwrap();

    assert_eq!(refunded, 2 * SEED + BET);
    assert_eq!(world.balance_of(&world.alice), CREATOR_FUNDS + BET);
    assert!(world.program.market(&world.market).is_err());

    let again = world
        .program
        .cancel_market(&Context::new(world.alice, START + 21), &mut world.ledger, &world.market);
    assert_eq!(again, Err(MarketError::AccountNotFound(world.market)));
}

#[test]
fn test_cancel_works_after_expiry_without_oracle() {
    let mut world = World::with_pools();
    let refunded = world
        .program
        .cancel_market(&Context::new(world.alice, START + 10 * DURATION), &mut world.ledger, &world.market)
        .unwrap();
    assert_eq!(refunded, 2 * SEED);
}

// ============================================================================
// REJECTIONS
// ============================================================================

#[test]
fn test_invalid_feed_id_length() {
    let mut program = PredictionMarket::new(MarketConfig::default());
    let err = program
        .initialize_market(&Context::new(Address::new_unique(), START), TARGET_PRICE, "Invalid FeedId Length", DURATION)
        .unwrap_err();
    assert_eq!(err.code(), "IncorrectFeedIDLength");
    assert!(program.accounts().is_empty());
}

#[test]
fn test_pools_need_creator_and_fresh_market() {
    let mut world = World::new(MarketConfig::default());
    let bob = world.bob;
    assert_eq!(
        world.initialize_pools(bob),
        Err(MarketError::UnauthorizedUser { expected: world.alice, actual: bob })
    );

    assert_ok!(world.initialize_pools(world.alice));
    assert_eq!(world.initialize_pools(world.alice), Err(MarketError::InvalidMarketInitialization));
}

#[test]
fn test_insufficient_seed_rolls_back_everything() {
    let mut world = World::new(MarketConfig::default());
    let alice_holding = world.ledger.find_holding(&world.alice, &world.mint).unwrap();
    let bob_holding = world.ledger.find_holding(&world.bob, &world.mint).unwrap();
    let mint = world.mint;
    // leave alice one unit short of the second seed
    world.ledger.transfer(&alice_holding, &bob_holding, CREATOR_FUNDS - SEED - 1, &mint).unwrap();
    let accounts_before = world.program.accounts().len();

    let err = world.initialize_pools(world.alice).unwrap_err();
    assert_eq!(err, MarketError::Ledger(LedgerError::InsufficientFunds { available: 1, required: SEED }));

    assert_eq!(world.balance_of(&world.alice), SEED + 1);
    assert_eq!(world.program.accounts().len(), accounts_before);
    let pool = world.program.pool_address(&world.market, Direction::Higher).unwrap();
    assert!(world.ledger.find_holding(&pool, &world.mint).is_none());
    assert_eq!(
        world.program.market(&world.market).unwrap().initialization,
        MarketInitialization::InitializedMarket
    );
}

#[test]
fn test_bet_window_closes_at_duration() {
    let mut world = World::with_pools();
    let bob = world.bob;
    assert_ok!(world.bet(bob, DURATION - 1, 1, Direction::Higher));
    assert_eq!(world.bet(bob, DURATION, 1, Direction::Lower), Err(MarketError::MarketDurationOver));
    assert_eq!(world.bet(bob, DURATION + 50, 2, Direction::Lower), Err(MarketError::MarketDurationOver));
}

#[test]
fn test_bet_without_holding() {
    let mut world = World::with_pools();
    let carol = Address::new_unique();
    let err = world.bet(carol, 5, 100, Direction::Higher).unwrap_err();
    assert_eq!(err.code(), "HoldingNotFound");
    assert_eq!(world.pool_balance(Direction::Higher), SEED);
}

#[test]
fn test_finalize_rejections() {
    let mut world = World::with_pools();
    world.publish(150, 0, START + DURATION);

    let bob = world.bob;
    assert_eq!(
        world.finalize(bob, DURATION),
        Err(MarketError::UnauthorizedUser { expected: world.alice, actual: bob })
    );
    assert_eq!(world.finalize(world.alice, DURATION - 1), Err(MarketError::MarketDurationNotOver));
    assert_eq!(
        world.finalize(world.alice, DURATION + 31),
        Err(MarketError::StalePrice { age: 31, max_age: 30 })
    );

    assert_eq!(world.pool_balance(Direction::Higher), SEED);
    assert_ok!(world.finalize(world.alice, DURATION + 30));
}

#[test]
fn test_finalize_before_pools() {
    let mut world = World::new(MarketConfig::default());
    world.publish(150, 0, START + DURATION);
    assert_eq!(world.finalize(world.alice, DURATION), Err(MarketError::InvalidMarketInitialization));
}

// ============================================================================
// DISPATCH
// ============================================================================

#[test]
fn test_process_runs_whole_lifecycle() {
    let mut world = World::new(MarketConfig::default());
    let World { program, ledger, oracle, mint, alice, bob, market } = &mut world;

    let outcome = program
        .process(
            &Context::new(*alice, START + 1),
            &mut *ledger,
            &*oracle,
            Instruction::InitializePools { market: *market, pool_token_mint: *mint },
        )
        .unwrap();
    let InstructionOutcome::PoolsInitialized { higher_pool, lower_pool } = outcome else {
        panic!("unexpected outcome: {:?}", outcome);
    };
    assert_eq!(higher_pool, program.pool_address(market, Direction::Higher).unwrap());
    assert_eq!(lower_pool, program.pool_address(market, Direction::Lower).unwrap());

    let outcome = program
        .process(
            &Context::new(*bob, START + 2),
            &mut *ledger,
            &*oracle,
            Instruction::PlaceBet { market: *market, amount: BET, direction: Direction::Lower },
        )
        .unwrap();
    let expected_bet = program.bet_address(bob, market, BET, Direction::Lower).unwrap();
    assert_eq!(outcome, InstructionOutcome::BetPlaced { bet: expected_bet });

    let outcome = program
        .process(&Context::new(*alice, START + 3), &mut *ledger, &*oracle, Instruction::CancelMarket { market: *market })
        .unwrap();
    assert_eq!(outcome, InstructionOutcome::MarketCancelled { refunded: 2 * SEED + BET });
}

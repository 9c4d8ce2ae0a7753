// Cross-contract tests wiring the capital-call ledger to its rate feeds
// through deployed contract clients.

#![cfg(test)]

use capital_call_core::{
    CapitalCallCoreContract, CapitalCallCoreContractClient, Error, PaymentTarget, TrancheSpec,
};
use mock_oracle::{MockOracleContract, MockOracleContractClient};
use price_oracle::{PriceOracleContract, PriceOracleContractClient};
use soroban_sdk::{
    testutils::{Address as _, Ledger},
    token::{Client as TokenClient, StellarAssetClient},
    vec, Address, Env,
};

const START: u64 = 1_700_000_000;
/// One native unit in the ledger's 18-decimal internal precision.
const ONE: i128 = 1_000_000_000_000_000_000;
/// 1.0000_0000 in the feed's 8-decimal precision.
const RATE_ONE_USD: i128 = 1_0000_0000;

struct FundFixture {
    env: Env,
    admin: Address,
    lp: Address,
    ledger_id: Address,
    ledger: CapitalCallCoreContractClient<'static>,
    oracle: PriceOracleContractClient<'static>,
    token: TokenClient<'static>,
    token_admin: StellarAssetClient<'static>,
}

impl FundFixture {
    fn setup() -> Self {
        let env = Env::default();
        env.mock_all_auths();
        env.ledger().with_mut(|l| {
            l.timestamp = START;
        });

        let admin = Address::generate(&env);
        let lp = Address::generate(&env);

        let token_id = env.register_stellar_asset_contract(admin.clone());
        let token = TokenClient::new(&env, &token_id);
        let token_admin = StellarAssetClient::new(&env, &token_id);

        let oracle_id = env.register_contract(None, PriceOracleContract);
        let oracle = PriceOracleContractClient::new(&env, &oracle_id);
        oracle.initialize(&admin);
        oracle.set_rate(&admin, &RATE_ONE_USD);

        let ledger_id = env.register_contract(None, CapitalCallCoreContract);
        let ledger = CapitalCallCoreContractClient::new(&env, &ledger_id);
        ledger.initialize(&admin, &token_id, &oracle_id);

        FundFixture {
            env,
            admin,
            lp,
            ledger_id,
            ledger,
            oracle,
            token,
            token_admin,
        }
    }

    fn warp_to(&self, timestamp: u64) {
        self.env.ledger().with_mut(|l| {
            l.timestamp = timestamp;
        });
    }
}

#[test]
fn test_full_lp_lifecycle() {
    let fx = FundFixture::setup();
    fx.token_admin.mint(&fx.lp, &(100_000 * ONE));

    // 40,000 native units committed, 25% due at +100 and 75% at +200
    let schedule = vec![
        &fx.env,
        TrancheSpec {
            percent: 25,
            period: 100,
        },
        TrancheSpec {
            percent: 75,
            period: 200,
        },
    ];
    fx.ledger.register_commitment(
        &fx.admin,
        &fx.lp,
        &(40_000 * ONE),
        &schedule,
        &(START + 10_000),
    );
    assert!(fx.ledger.is_lp(&fx.lp));
    assert_eq!(fx.ledger.remaining_commitment(&fx.lp), 40_000 * ONE);

    // first tranche paid in full: 25% of 40,000
    fx.ledger
        .apply_payment(&fx.lp, &fx.lp, &PaymentTarget::Tranche(0), &(10_000 * ONE));
    assert_eq!(fx.ledger.remaining_commitment(&fx.lp), 30_000 * ONE);

    // two cash calls on top of the schedule, deadlines strictly increasing
    let first = fx
        .ledger
        .create_call(&fx.admin, &fx.lp, &(2_000 * ONE), &(START + 300));
    let second = fx
        .ledger
        .create_call(&fx.admin, &fx.lp, &(3_000 * ONE), &(START + 400));
    assert_eq!((first, second), (0, 1));

    fx.ledger
        .apply_payment(&fx.lp, &fx.lp, &PaymentTarget::Call(0), &(2_000 * ONE));
    fx.ledger.execute_call(&fx.admin, &fx.lp, &0);
    assert!(fx.ledger.get_call(&fx.lp, &0).executed);

    assert_eq!(fx.ledger.get_commitment(&fx.lp).total_paid, 12_000 * ONE);
    assert_eq!(fx.ledger.custodied_balance(), 12_000 * ONE);
    assert_eq!(fx.token.balance(&fx.ledger_id), 12_000 * ONE);

    // the LP misses the second tranche; the first is forfeited and a
    // penalty lands on top
    fx.warp_to(START + 500);
    fx.ledger
        .apply_penalty(&fx.admin, &fx.lp, &Some(1), &(5_000 * ONE), &false);
    let commitment = fx.ledger.get_commitment(&fx.lp);
    assert_eq!(commitment.tranches.get(0).unwrap().paid_amount, 0);
    // 12,000 paid minus the 10,000 forfeited from tranche 0
    assert_eq!(commitment.total_paid, 2_000 * ONE);
    // 40,000 + 5,000 - 2,000
    assert_eq!(fx.ledger.remaining_commitment(&fx.lp), 43_000 * ONE);

    // revocation demotes the identity; re-registration starts clean
    fx.ledger.apply_penalty(&fx.admin, &fx.lp, &None, &0, &true);
    assert!(!fx.ledger.is_lp(&fx.lp));
    assert_eq!(fx.ledger.remaining_commitment(&fx.lp), 0);

    let fresh = vec![
        &fx.env,
        TrancheSpec {
            percent: 100,
            period: 1_000,
        },
    ];
    fx.ledger.register_commitment(
        &fx.admin,
        &fx.lp,
        &(15_000 * ONE),
        &fresh,
        &(START + 10_000),
    );
    assert!(fx.ledger.is_lp(&fx.lp));
    assert_eq!(fx.ledger.get_call_count(&fx.lp), 0);

    // custody survives the LP's demotion and can be disbursed
    let recipient = Address::generate(&fx.env);
    fx.ledger.withdraw(&fx.admin, &recipient, &(12_000 * ONE));
    assert_eq!(fx.token.balance(&recipient), 12_000 * ONE);
    assert_eq!(fx.ledger.custodied_balance(), 0);
}

#[test]
fn test_live_feed_gates_minimum_commitment() {
    let fx = FundFixture::setup();

    // at 0.25 USD per unit, 30,000 units are worth 7,500 USD
    fx.oracle.set_rate(&fx.admin, &2500_0000);
    let schedule = soroban_sdk::Vec::new(&fx.env);
    let result = fx.ledger.try_register_commitment(
        &fx.admin,
        &fx.lp,
        &(30_000 * ONE),
        &schedule,
        &(START + 10_000),
    );
    assert_eq!(result, Err(Ok(Error::BelowMinimum)));

    // a rate correction admits the same commitment
    fx.oracle.set_rate(&fx.admin, &RATE_ONE_USD);
    fx.ledger.register_commitment(
        &fx.admin,
        &fx.lp,
        &(30_000 * ONE),
        &schedule,
        &(START + 10_000),
    );
    assert!(fx.ledger.is_lp(&fx.lp));
}

#[test]
fn test_unvalidated_feed_surfaces_invalid_price_data() {
    let env = Env::default();
    env.mock_all_auths();
    env.ledger().with_mut(|l| {
        l.timestamp = START;
    });

    let admin = Address::generate(&env);
    let lp = Address::generate(&env);
    let token_id = env.register_stellar_asset_contract(admin.clone());

    // wire the ledger to the mock feed, which happily serves a zero rate
    let feed_id = env.register_contract(None, MockOracleContract);
    let feed = MockOracleContractClient::new(&env, &feed_id);

    let ledger_id = env.register_contract(None, CapitalCallCoreContract);
    let ledger = CapitalCallCoreContractClient::new(&env, &ledger_id);
    ledger.initialize(&admin, &token_id, &feed_id);

    let schedule = soroban_sdk::Vec::new(&env);
    let result = ledger.try_register_commitment(
        &admin,
        &lp,
        &(20_000 * ONE),
        &schedule,
        &(START + 1_000),
    );
    assert_eq!(result, Err(Ok(Error::InvalidPriceData)));

    feed.set_rate(&RATE_ONE_USD, &START);
    ledger.register_commitment(&admin, &lp, &(20_000 * ONE), &schedule, &(START + 1_000));
    assert!(ledger.is_lp(&lp));
}

#[test]
fn test_pause_sweeps_ledger_operations() {
    let fx = FundFixture::setup();
    fx.token_admin.mint(&fx.lp, &(50_000 * ONE));
    let schedule = soroban_sdk::Vec::new(&fx.env);
    fx.ledger.register_commitment(
        &fx.admin,
        &fx.lp,
        &(20_000 * ONE),
        &schedule,
        &(START + 10_000),
    );
    fx.ledger
        .create_call(&fx.admin, &fx.lp, &(1_000 * ONE), &(START + 100));

    fx.ledger.pause(&fx.admin);
    assert_eq!(
        fx.ledger
            .try_apply_payment(&fx.lp, &fx.lp, &PaymentTarget::Call(0), &(500 * ONE)),
        Err(Ok(Error::Paused))
    );
    assert_eq!(
        fx.ledger.try_execute_call(&fx.admin, &fx.lp, &0),
        Err(Ok(Error::Paused))
    );
    assert_eq!(fx.ledger.try_deposit(&fx.lp, &ONE), Err(Ok(Error::Paused)));

    // the admin set stays governable during the incident
    let second = Address::generate(&fx.env);
    fx.ledger.add_admin(&fx.admin, &second);
    assert!(fx.ledger.is_admin(&second));

    fx.ledger.unpause(&fx.admin);
    fx.ledger
        .apply_payment(&fx.lp, &fx.lp, &PaymentTarget::Call(0), &(500 * ONE));
    assert_eq!(fx.ledger.get_call(&fx.lp, &0).paid_amount, 500 * ONE);
}

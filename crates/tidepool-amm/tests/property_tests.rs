//! Property tests for pricing, the constant-product invariant and share
//! accounting

mod common;

use common::Market;
use proptest::prelude::*;
use tidepool_amm::{get_amount_in, get_amount_out, SwapRequest, TokenClient};
use tidepool_core::{replay_reserves, sort_tokens, Amount, BURN_ADDRESS};

fn reserve() -> impl Strategy<Value = Amount> {
    1_000u128..1_000_000_000_000_000_000_000_000
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 512,
        ..ProptestConfig::default()
    })]

    /// Paying the quoted input always buys at least the requested output
    #[test]
    fn exact_in_quote_covers_requested_output(
        reserve_in in reserve(),
        reserve_out in reserve(),
        fraction in 1u128..1_000,
    ) {
        let amount_out = (reserve_out / 1_000 * fraction).max(1);
        let amount_in = get_amount_in(amount_out, reserve_in, reserve_out).unwrap();
        let bought = get_amount_out(amount_in, reserve_in, reserve_out).unwrap();
        prop_assert!(bought >= amount_out);
    }

    /// Requoting an output never asks for more than one unit over what bought it
    #[test]
    fn exact_out_quote_never_exceeds_original_input(
        reserve_in in reserve(),
        reserve_out in reserve(),
        amount_in in 1u128..1_000_000_000_000_000_000,
    ) {
        let amount_out = get_amount_out(amount_in, reserve_in, reserve_out).unwrap();
        prop_assume!(amount_out > 0);
        let requoted = get_amount_in(amount_out, reserve_in, reserve_out).unwrap();
        prop_assert!(requoted <= amount_in + 1);
    }

    /// Without mints or burns, `reserve0 * reserve1` never decreases
    #[test]
    fn swaps_never_shrink_the_product(
        reserve0 in 10_000u128..100_000_000_000,
        reserve1 in 10_000u128..100_000_000_000,
        trades in prop::collection::vec((any::<bool>(), 1u128..1_000_000_000), 1..16),
    ) {
        let mut market = Market::new();
        let (token0, token1) = sort_tokens(market.a, market.b);
        let alice = market.alice;

        let pair = market
            .exchange
            .execute("seed", |registry, bank, events| {
                let pair = registry.create_pair(token0, token1, events)?;
                bank.transfer(&token0, &alice, &pair, reserve0, &[])?;
                bank.transfer(&token1, &alice, &pair, reserve1, &[])?;
                if let Some(ledger) = registry.ledger_mut(&pair) {
                    ledger.sync(bank, events)?;
                }
                Ok(pair)
            })
            .unwrap()
            .value;

        for (zero_for_one, amount_in) in trades {
            let before = market.exchange.registry().ledger(&pair).unwrap().get_reserves().unwrap();
            let (token_in, reserve_in, reserve_out) = if zero_for_one {
                (token0, before.reserve0, before.reserve1)
            } else {
                (token1, before.reserve1, before.reserve0)
            };
            let amount_out = get_amount_out(amount_in, reserve_in, reserve_out).unwrap();
            if amount_out == 0 {
                continue;
            }
            let request = if zero_for_one {
                SwapRequest::new(0, amount_out, alice)
            } else {
                SwapRequest::new(amount_out, 0, alice)
            };

            market
                .exchange
                .execute("trade", |registry, bank, events| {
                    bank.transfer(&token_in, &alice, &pair, amount_in, &[])?;
                    match registry.ledger_mut(&pair) {
                        Some(ledger) => ledger.swap(bank, &alice, request, None, events),
                        None => Err(tidepool_amm::AmmError::NotInitialized),
                    }
                })
                .unwrap();

            let after = market.exchange.registry().ledger(&pair).unwrap().get_reserves().unwrap();
            prop_assert!(after.reserve0 * after.reserve1 >= before.reserve0 * before.reserve1);
        }
    }

    /// Share balances always sum to total supply and events replay to reserves
    #[test]
    fn shares_and_reserves_stay_consistent(
        ops in prop::collection::vec((0u8..3, 1u128..10_000_000, 1u128..10_000_000), 1..12),
    ) {
        let mut market = Market::new();
        let (a, b) = (market.a, market.b);
        let (alice, bob) = (market.alice, market.bob);
        let mut history = market.add_liquidity(a, b, 5_000_000, 5_000_000).unwrap().events;
        let pair = market.pair(a, b);

        for (op, x, y) in ops {
            let result = match op {
                0 => market.add_liquidity(a, b, x, y).map(|r| r.events),
                1 => market.swap_exact_in(bob, x, 0, &[a, b]).map(|r| r.events),
                _ => market
                    .exchange
                    .execute("share_burn", |registry, bank, events| {
                        let ledger = registry
                            .ledger_mut(&pair)
                            .ok_or(tidepool_amm::AmmError::NotInitialized)?;
                        let shares = ledger.balance_of(&alice)?.min(x);
                        ledger.transfer_shares(&alice, &pair, shares)?;
                        ledger.burn(bank, &alice, &alice, events)
                    })
                    .map(|r| r.events),
            };
            // Rejected calls roll back and leave nothing to check
            if let Ok(events) = result {
                history.extend(events);
            }

            let ledger = market.exchange.registry().ledger(&pair).unwrap();
            let holders = ledger.share_holders().unwrap();
            let held: Amount = holders.iter().map(|(_, shares)| shares).sum();
            prop_assert_eq!(held, ledger.total_supply().unwrap());
            let known = [alice, bob, BURN_ADDRESS];
            prop_assert!(holders.iter().all(|(holder, _)| known.contains(holder)));

            let replayed = replay_reserves(history.iter());
            prop_assert_eq!(replayed.get(&pair).copied(), Some(ledger.get_reserves().unwrap()));

            let (token0, token1) = ledger.tokens().unwrap();
            let tokens = market.exchange.tokens();
            let reserves = ledger.get_reserves().unwrap();
            prop_assert_eq!(tokens.balance_of(&token0, &pair).unwrap(), reserves.reserve0);
            prop_assert_eq!(tokens.balance_of(&token1, &pair).unwrap(), reserves.reserve1);
        }
    }
}

#[test]
fn test_round_trip_concrete() {
    let out = get_amount_out(100, 1_000, 1_000).unwrap();
    assert_eq!(out, 90);
    assert_eq!(get_amount_in(out, 1_000, 1_000).unwrap(), 100);
}

//! Multi-hop routing, slippage limits and fee-on-transfer tokens

mod common;

use common::{Market, DEADLINE};
use tidepool_amm::{get_amount_in, get_amount_out, AmmError, SwapExactIn};
use tidepool_core::{AmmEvent, Amount};

/// `A/B` at 1:2 and `B/C` at 10:1, so reusing one pair's reserves for both
/// hops gives a very different answer
fn two_hop_market() -> Market {
    let mut market = Market::new();
    let (a, b, c) = (market.a, market.b, market.c);
    market.add_liquidity(a, b, 10_000, 20_000).unwrap();
    market.add_liquidity(b, c, 50_000, 5_000).unwrap();
    market
}

#[test]
fn test_amounts_out_prices_each_hop_against_its_own_pair() {
    let market = two_hop_market();
    let (a, b, c) = (market.a, market.b, market.c);

    let amounts = market
        .router
        .get_amounts_out(market.exchange.registry(), 1_000, &[a, b, c])
        .unwrap();

    let first = get_amount_out(1_000, 10_000, 20_000).unwrap();
    let second = get_amount_out(first, 50_000, 5_000).unwrap();
    assert_eq!(amounts, vec![1_000, first, second]);

    // Pricing the second hop with the first pair's reserves would overquote
    let reused = get_amount_out(first, 10_000, 20_000).unwrap();
    assert_ne!(second, reused);
    assert!(reused > second);
}

#[test]
fn test_amounts_in_prices_each_hop_against_its_own_pair() {
    let market = two_hop_market();
    let (a, b, c) = (market.a, market.b, market.c);

    let amounts = market
        .router
        .get_amounts_in(market.exchange.registry(), 300, &[a, b, c])
        .unwrap();

    let middle = get_amount_in(300, 50_000, 5_000).unwrap();
    let first = get_amount_in(middle, 10_000, 20_000).unwrap();
    assert_eq!(amounts, vec![first, middle, 300]);
}

#[test]
fn test_multi_hop_swap_routes_ledger_to_ledger() {
    let mut market = two_hop_market();
    let (a, b, c) = (market.a, market.b, market.c);
    let bob = market.bob;
    let bc_pair = market.pair(b, c);
    let before = (
        market.balance(a, bob),
        market.balance(b, bob),
        market.balance(c, bob),
    );

    let receipt = market.swap_exact_in(bob, 1_000, 1, &[a, b, c]).unwrap();
    let amounts = receipt.value;

    assert_eq!(market.balance(a, bob), before.0 - 1_000);
    assert_eq!(market.balance(b, bob), before.1);
    assert_eq!(market.balance(c, bob), before.2 + amounts[2]);
    assert_eq!(market.reserves(a, b), (11_000, 20_000 - amounts[1]));
    assert_eq!(market.reserves(b, c), (50_000 + amounts[1], 5_000 - amounts[2]));

    let names: Vec<&str> = receipt.events.iter().map(AmmEvent::name).collect();
    assert_eq!(names, vec!["sync", "swap", "sync", "swap"]);
    match &receipt.events[1] {
        AmmEvent::Swap { to, .. } => assert_eq!(*to, bc_pair),
        other => panic!("expected swap, got {:?}", other),
    }
}

#[test]
fn test_exact_output_swap_delivers_exactly() {
    let mut market = two_hop_market();
    let (a, b, c) = (market.a, market.b, market.c);
    let bob = market.bob;
    let (a_before, c_before) = (market.balance(a, bob), market.balance(c, bob));

    let amounts = market
        .swap_exact_out(bob, 300, 10_000, &[a, b, c])
        .unwrap()
        .value;

    assert_eq!(amounts[2], 300);
    assert_eq!(market.balance(c, bob), c_before + 300);
    assert_eq!(market.balance(a, bob), a_before - amounts[0]);
}

#[test]
fn test_slippage_limits() {
    let mut market = two_hop_market();
    let (a, b, c) = (market.a, market.b, market.c);
    let bob = market.bob;
    let quoted = market
        .router
        .get_amounts_out(market.exchange.registry(), 1_000, &[a, b, c])
        .unwrap();
    let reserves = market.reserves(a, b);

    assert!(matches!(
        market.swap_exact_in(bob, 1_000, quoted[2] + 1, &[a, b, c]),
        Err(AmmError::InsufficientOutputAmount)
    ));

    let needed = market
        .router
        .get_amounts_in(market.exchange.registry(), 300, &[a, b, c])
        .unwrap()[0];
    assert!(matches!(
        market.swap_exact_out(bob, 300, needed - 1, &[a, b, c]),
        Err(AmmError::ExcessiveInputAmount)
    ));
    assert_eq!(market.reserves(a, b), reserves);

    // Exactly at the limit is accepted
    market.swap_exact_in(bob, 1_000, quoted[2], &[a, b, c]).unwrap();
}

#[test]
fn test_missing_hop_is_pair_not_found() {
    let mut market = two_hop_market();
    let (a, b, d) = (market.a, market.b, market.d);
    let bob = market.bob;

    assert!(matches!(
        market.swap_exact_in(bob, 1_000, 0, &[a, b, d]),
        Err(AmmError::PairNotFound(x, y)) if x == b && y == d
    ));
    assert!(matches!(
        market.swap_exact_in(bob, 1_000, 0, &[a]),
        Err(AmmError::InvalidPath(_))
    ));
}

#[test]
fn test_reversed_create_pair_is_rejected() {
    let mut market = two_hop_market();
    let (a, b) = (market.a, market.b);
    let existing = market.pair(a, b);

    let result = market
        .exchange
        .execute("create_pair", |registry, _, events| {
            registry.create_pair(b, a, events)
        });
    assert!(matches!(result, Err(AmmError::PairExists(pair)) if pair == existing));
    assert_eq!(market.exchange.registry().all_pairs_length().unwrap(), 2);
}

#[test]
fn test_expired_deadline_rejects_swap() {
    let mut market = two_hop_market();
    let (a, b) = (market.a, market.b);
    let bob = market.bob;
    market.router.set_time(DEADLINE + 1);
    assert!(matches!(
        market.swap_exact_in(bob, 100, 0, &[a, b]),
        Err(AmmError::DeadlineExpired { .. })
    ));
}

#[test]
fn test_fee_on_transfer_input_needs_supporting_swap() {
    let mut market = Market::new();
    let (a, b) = (market.a, market.b);
    market.add_liquidity(a, b, 100_000, 100_000).unwrap();
    market
        .exchange
        .seed(|bank| {
            bank.set_transfer_fee_bps(&a, 100);
            Ok(())
        })
        .unwrap();

    let bob = market.bob;
    assert!(matches!(
        market.swap_exact_in(bob, 1_000, 0, &[a, b]),
        Err(AmmError::InvalidK)
    ));

    let (reserve_a, reserve_b) = market.reserves(a, b);
    let expected = get_amount_out(990, reserve_a, reserve_b).unwrap();
    let b_before = market.balance(b, bob);

    let router = market.router;
    let params = SwapExactIn {
        amount_in: 1_000,
        amount_out_min: expected,
        path: vec![a, b],
        to: bob,
        deadline: DEADLINE,
    };
    let received: Amount = market
        .exchange
        .execute("swap_fee_on_transfer", |registry, bank, events| {
            router.swap_exact_tokens_for_tokens_supporting_fee_on_transfer(
                registry, bank, &bob, &params, events,
            )
        })
        .unwrap()
        .value;

    assert_eq!(received, expected);
    assert_eq!(market.balance(b, bob), b_before + expected);
    assert_eq!(market.reserves(a, b), (reserve_a + 990, reserve_b - expected));
}

//! Shared market fixture for integration tests

#![allow(dead_code)]

use tidepool_amm::{
    AddLiquidity, AmmError, Exchange, LiquidityAdded, MemoryBank, PairRegistry, Receipt, Router,
    SwapExactIn, SwapExactOut, TokenClient,
};
use tidepool_core::{Address, Amount, TokenId};

pub const NOW: u64 = 1_700_000_000;
pub const DEADLINE: u64 = NOW + 600;
pub const STARTING_BALANCE: Amount = 1_000_000_000_000;

/// An exchange with four tokens and two funded accounts that approved the router
pub struct Market {
    pub exchange: Exchange,
    pub router: Router,
    pub alice: Address,
    pub bob: Address,
    pub a: TokenId,
    pub b: TokenId,
    pub c: TokenId,
    pub d: TokenId,
}

impl Market {
    pub fn new() -> Self {
        let router = Router::new(Address::from_label("router"), NOW);
        let alice = Address::from_label("account:alice");
        let bob = Address::from_label("account:bob");
        let a = Address::from_label("token:A");
        let b = Address::from_label("token:B");
        let c = Address::from_label("token:C");
        let d = Address::from_label("token:D");

        let mut exchange = Exchange::new(
            PairRegistry::new(Address::from_label("registry")),
            MemoryBank::new(),
        );
        let spender = router.address();
        exchange
            .seed(|bank| {
                for token in [a, b, c, d] {
                    for holder in [alice, bob] {
                        bank.mint(&token, &holder, STARTING_BALANCE)?;
                        bank.approve(&token, &holder, &spender, Amount::MAX);
                    }
                }
                Ok(())
            })
            .unwrap();

        Market {
            exchange,
            router,
            alice,
            bob,
            a,
            b,
            c,
            d,
        }
    }

    /// Alice deposits exactly the given amounts
    pub fn add_liquidity(
        &mut self,
        token_a: TokenId,
        token_b: TokenId,
        amount_a: Amount,
        amount_b: Amount,
    ) -> Result<Receipt<LiquidityAdded>, AmmError> {
        let router = self.router;
        let caller = self.alice;
        let params = AddLiquidity {
            token_a,
            token_b,
            amount_a_desired: amount_a,
            amount_b_desired: amount_b,
            amount_a_min: 0,
            amount_b_min: 0,
            to: caller,
            deadline: DEADLINE,
        };
        self.exchange
            .execute("add_liquidity", |registry, bank, events| {
                router.add_liquidity(registry, bank, &caller, &params, events)
            })
    }

    pub fn swap_exact_in(
        &mut self,
        caller: Address,
        amount_in: Amount,
        amount_out_min: Amount,
        path: &[TokenId],
    ) -> Result<Receipt<Vec<Amount>>, AmmError> {
        let router = self.router;
        let params = SwapExactIn {
            amount_in,
            amount_out_min,
            path: path.to_vec(),
            to: caller,
            deadline: DEADLINE,
        };
        self.exchange
            .execute("swap_exact_in", |registry, bank, events| {
                router.swap_exact_tokens_for_tokens(registry, bank, &caller, &params, events)
            })
    }

    pub fn swap_exact_out(
        &mut self,
        caller: Address,
        amount_out: Amount,
        amount_in_max: Amount,
        path: &[TokenId],
    ) -> Result<Receipt<Vec<Amount>>, AmmError> {
        let router = self.router;
        let params = SwapExactOut {
            amount_out,
            amount_in_max,
            path: path.to_vec(),
            to: caller,
            deadline: DEADLINE,
        };
        self.exchange
            .execute("swap_exact_out", |registry, bank, events| {
                router.swap_tokens_for_exact_tokens(registry, bank, &caller, &params, events)
            })
    }

    pub fn pair(&self, x: TokenId, y: TokenId) -> Address {
        self.exchange.registry().get_pair(&x, &y).unwrap().unwrap()
    }

    /// Reserves oriented to `(x, y)`
    pub fn reserves(&self, x: TokenId, y: TokenId) -> (Amount, Amount) {
        self.router
            .get_reserves(self.exchange.registry(), &x, &y)
            .unwrap()
    }

    pub fn balance(&self, token: TokenId, holder: Address) -> Amount {
        self.exchange.tokens().balance_of(&token, &holder).unwrap()
    }
}

//! Multi-hop routing and liquidity helpers over registry-resolved ledgers.
//!
//! The router holds no balances. Callers approve it as spender on their
//! input tokens and liquidity shares; it moves funds straight from the caller
//! into the first ledger and chains every intermediate hop ledger-to-ledger,
//! so only the first transfer-in and the final payout touch the caller side.

use serde::{Deserialize, Serialize};
use tidepool_core::{sort_tokens, Address, AmmEvent, Amount, TokenId};
use tidepool_state::Storage;
use tracing::debug;

use crate::client::{safe_transfer_from, TokenClient};
use crate::error::AmmError;
use crate::fee_math::{self, get_amount_in, get_amount_out};
use crate::pair::SwapRequest;
use crate::registry::PairRegistry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddLiquidity {
    pub token_a: TokenId,
    pub token_b: TokenId,
    pub amount_a_desired: Amount,
    pub amount_b_desired: Amount,
    pub amount_a_min: Amount,
    pub amount_b_min: Amount,
    pub to: Address,
    pub deadline: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityAdded {
    pub pair: Address,
    pub amount_a: Amount,
    pub amount_b: Amount,
    pub liquidity: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveLiquidity {
    pub token_a: TokenId,
    pub token_b: TokenId,
    pub liquidity: Amount,
    pub amount_a_min: Amount,
    pub amount_b_min: Amount,
    pub to: Address,
    pub deadline: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapExactIn {
    pub amount_in: Amount,
    pub amount_out_min: Amount,
    pub path: Vec<TokenId>,
    pub to: Address,
    pub deadline: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapExactOut {
    pub amount_out: Amount,
    pub amount_in_max: Amount,
    pub path: Vec<TokenId>,
    pub to: Address,
    pub deadline: u64,
}

/// Stateless entry point; `now` is the clock deadlines are checked against
#[derive(Debug, Clone, Copy)]
pub struct Router {
    address: Address,
    now: u64,
}

impl Router {
    pub fn new(address: Address, now: u64) -> Self {
        Router { address, now }
    }

    /// Spender identity callers approve
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn set_time(&mut self, now: u64) {
        self.now = now;
    }

    fn ensure(&self, deadline: u64) -> Result<(), AmmError> {
        if self.now > deadline {
            return Err(AmmError::DeadlineExpired {
                now: self.now,
                deadline,
            });
        }
        Ok(())
    }

    /// Deposit at the current price, creating the pair on first use
    pub fn add_liquidity<S: Storage + Default>(
        &self,
        registry: &mut PairRegistry<S>,
        tokens: &mut dyn TokenClient,
        caller: &Address,
        params: &AddLiquidity,
        events: &mut Vec<AmmEvent>,
    ) -> Result<LiquidityAdded, AmmError> {
        self.ensure(params.deadline)?;
        let (token_a, token_b) = (params.token_a, params.token_b);
        let pair = match registry.get_pair(&token_a, &token_b)? {
            Some(pair) => pair,
            None => registry.create_pair(token_a, token_b, events)?,
        };

        let (amount_a, amount_b) = self.optimal_amounts(registry, params)?;
        safe_transfer_from(tokens, &token_a, &self.address, caller, &pair, amount_a)?;
        safe_transfer_from(tokens, &token_b, &self.address, caller, &pair, amount_b)?;

        let ledger = registry
            .ledger_mut(&pair)
            .ok_or(AmmError::PairNotFound(token_a, token_b))?;
        let liquidity = ledger.mint(tokens, &params.to, events)?;

        Ok(LiquidityAdded {
            pair,
            amount_a,
            amount_b,
            liquidity,
        })
    }

    fn optimal_amounts<S: Storage + Default>(
        &self,
        registry: &PairRegistry<S>,
        params: &AddLiquidity,
    ) -> Result<(Amount, Amount), AmmError> {
        let (reserve_a, reserve_b) = self.get_reserves(registry, &params.token_a, &params.token_b)?;
        if reserve_a == 0 && reserve_b == 0 {
            return Ok((params.amount_a_desired, params.amount_b_desired));
        }

        let optimal_b = fee_math::quote(params.amount_a_desired, reserve_a, reserve_b)?;
        if optimal_b <= params.amount_b_desired {
            if optimal_b < params.amount_b_min {
                return Err(AmmError::InsufficientBAmount);
            }
            return Ok((params.amount_a_desired, optimal_b));
        }

        let optimal_a = fee_math::quote(params.amount_b_desired, reserve_b, reserve_a)?;
        if optimal_a < params.amount_a_min {
            return Err(AmmError::InsufficientAAmount);
        }
        Ok((optimal_a, params.amount_b_desired))
    }

    /// Redeem shares; returned amounts are in `(token_a, token_b)` order
    pub fn remove_liquidity<S: Storage + Default>(
        &self,
        registry: &mut PairRegistry<S>,
        tokens: &mut dyn TokenClient,
        caller: &Address,
        params: &RemoveLiquidity,
        events: &mut Vec<AmmEvent>,
    ) -> Result<(Amount, Amount), AmmError> {
        self.ensure(params.deadline)?;
        let pair = pair_for(registry, &params.token_a, &params.token_b)?;
        let ledger = registry
            .ledger_mut(&pair)
            .ok_or(AmmError::PairNotFound(params.token_a, params.token_b))?;

        ledger.transfer_shares_from(&self.address, caller, &pair, params.liquidity)?;
        let (amount0, amount1) = ledger.burn(tokens, &self.address, &params.to, events)?;

        let (token0, _) = ledger.tokens()?;
        let (amount_a, amount_b) = if params.token_a == token0 {
            (amount0, amount1)
        } else {
            (amount1, amount0)
        };
        if amount_a < params.amount_a_min || amount_b < params.amount_b_min {
            return Err(AmmError::InsufficientAmount);
        }
        Ok((amount_a, amount_b))
    }

    /// Sell exactly `amount_in`; returns the amount at every step of the path
    pub fn swap_exact_tokens_for_tokens<S: Storage + Default>(
        &self,
        registry: &mut PairRegistry<S>,
        tokens: &mut dyn TokenClient,
        caller: &Address,
        params: &SwapExactIn,
        events: &mut Vec<AmmEvent>,
    ) -> Result<Vec<Amount>, AmmError> {
        self.ensure(params.deadline)?;
        let amounts = self.get_amounts_out(registry, params.amount_in, &params.path)?;
        match amounts.last() {
            Some(&out) if out >= params.amount_out_min => {}
            _ => return Err(AmmError::InsufficientOutputAmount),
        }

        let first_pair = pair_for(registry, &params.path[0], &params.path[1])?;
        safe_transfer_from(
            tokens,
            &params.path[0],
            &self.address,
            caller,
            &first_pair,
            amounts[0],
        )?;
        self.swap_along(registry, tokens, &amounts, &params.path, &params.to, events)?;
        Ok(amounts)
    }

    /// Buy exactly `amount_out`; returns the amount at every step of the path
    pub fn swap_tokens_for_exact_tokens<S: Storage + Default>(
        &self,
        registry: &mut PairRegistry<S>,
        tokens: &mut dyn TokenClient,
        caller: &Address,
        params: &SwapExactOut,
        events: &mut Vec<AmmEvent>,
    ) -> Result<Vec<Amount>, AmmError> {
        self.ensure(params.deadline)?;
        let amounts = self.get_amounts_in(registry, params.amount_out, &params.path)?;
        if amounts[0] > params.amount_in_max {
            return Err(AmmError::ExcessiveInputAmount);
        }

        let first_pair = pair_for(registry, &params.path[0], &params.path[1])?;
        safe_transfer_from(
            tokens,
            &params.path[0],
            &self.address,
            caller,
            &first_pair,
            amounts[0],
        )?;
        self.swap_along(registry, tokens, &amounts, &params.path, &params.to, events)?;
        Ok(amounts)
    }

    /// Exact-input swap for tokens that take a cut of every transfer.
    ///
    /// Each hop is priced from what its ledger actually received, and the
    /// minimum is checked against what `to` actually received. Returns that
    /// received amount.
    pub fn swap_exact_tokens_for_tokens_supporting_fee_on_transfer<S: Storage + Default>(
        &self,
        registry: &mut PairRegistry<S>,
        tokens: &mut dyn TokenClient,
        caller: &Address,
        params: &SwapExactIn,
        events: &mut Vec<AmmEvent>,
    ) -> Result<Amount, AmmError> {
        self.ensure(params.deadline)?;
        let path = &params.path;
        check_path(path)?;

        let first_pair = pair_for(registry, &path[0], &path[1])?;
        safe_transfer_from(
            tokens,
            &path[0],
            &self.address,
            caller,
            &first_pair,
            params.amount_in,
        )?;

        let last = path[path.len() - 1];
        let balance_before = tokens.balance_of(&last, &params.to)?;

        for (i, hop) in path.windows(2).enumerate() {
            let (input, output) = (hop[0], hop[1]);
            let pair = pair_for(registry, &input, &output)?;
            let recipient = match path.get(i + 2) {
                Some(next) => pair_for(registry, &output, next)?,
                None => params.to,
            };

            let ledger = registry
                .ledger_mut(&pair)
                .ok_or(AmmError::PairNotFound(input, output))?;
            let (token0, _) = ledger.tokens()?;
            let reserves = ledger.get_reserves()?;
            let (reserve_in, reserve_out) = if input == token0 {
                (reserves.reserve0, reserves.reserve1)
            } else {
                (reserves.reserve1, reserves.reserve0)
            };

            let amount_in = tokens.balance_of(&input, &pair)?.saturating_sub(reserve_in);
            let amount_out = get_amount_out(amount_in, reserve_in, reserve_out)?;
            let (amount0_out, amount1_out) = if input == token0 {
                (0, amount_out)
            } else {
                (amount_out, 0)
            };

            ledger.swap(
                tokens,
                &self.address,
                SwapRequest::new(amount0_out, amount1_out, recipient),
                None,
                events,
            )?;
            debug!(
                "Hop {} -> {}: {} in, {} out",
                input.short(),
                output.short(),
                amount_in,
                amount_out
            );
        }

        let received = tokens
            .balance_of(&last, &params.to)?
            .saturating_sub(balance_before);
        if received < params.amount_out_min {
            return Err(AmmError::InsufficientOutputAmount);
        }
        Ok(received)
    }

    /// Reserves of the `(token_a, token_b)` pair in the caller's order
    pub fn get_reserves<S: Storage + Default>(
        &self,
        registry: &PairRegistry<S>,
        token_a: &TokenId,
        token_b: &TokenId,
    ) -> Result<(Amount, Amount), AmmError> {
        let ledger = registry.ledger_for(token_a, token_b)?;
        let (token0, _) = ledger.tokens()?;
        let reserves = ledger.get_reserves()?;
        if *token_a == token0 {
            Ok((reserves.reserve0, reserves.reserve1))
        } else {
            Ok((reserves.reserve1, reserves.reserve0))
        }
    }

    pub fn quote(
        &self,
        amount_a: Amount,
        reserve_a: Amount,
        reserve_b: Amount,
    ) -> Result<Amount, AmmError> {
        fee_math::quote(amount_a, reserve_a, reserve_b)
    }

    /// Forward quote; each hop is priced against its own pair's reserves
    pub fn get_amounts_out<S: Storage + Default>(
        &self,
        registry: &PairRegistry<S>,
        amount_in: Amount,
        path: &[TokenId],
    ) -> Result<Vec<Amount>, AmmError> {
        check_path(path)?;
        let mut amounts = Vec::with_capacity(path.len());
        let mut amount = amount_in;
        amounts.push(amount);
        for hop in path.windows(2) {
            let (reserve_in, reserve_out) = self.get_reserves(registry, &hop[0], &hop[1])?;
            amount = get_amount_out(amount, reserve_in, reserve_out)?;
            amounts.push(amount);
        }
        Ok(amounts)
    }

    /// Backward quote; each hop is priced against its own pair's reserves
    pub fn get_amounts_in<S: Storage + Default>(
        &self,
        registry: &PairRegistry<S>,
        amount_out: Amount,
        path: &[TokenId],
    ) -> Result<Vec<Amount>, AmmError> {
        check_path(path)?;
        let mut amounts = vec![0; path.len()];
        amounts[path.len() - 1] = amount_out;
        for i in (1..path.len()).rev() {
            let (reserve_in, reserve_out) = self.get_reserves(registry, &path[i - 1], &path[i])?;
            amounts[i - 1] = get_amount_in(amounts[i], reserve_in, reserve_out)?;
        }
        Ok(amounts)
    }

    /// Execute the hops for precomputed `amounts`, which must already sit in
    /// the first ledger
    fn swap_along<S: Storage + Default>(
        &self,
        registry: &mut PairRegistry<S>,
        tokens: &mut dyn TokenClient,
        amounts: &[Amount],
        path: &[TokenId],
        to: &Address,
        events: &mut Vec<AmmEvent>,
    ) -> Result<(), AmmError> {
        for (i, hop) in path.windows(2).enumerate() {
            let (input, output) = (hop[0], hop[1]);
            let (token0, _) = sort_tokens(input, output);
            let amount_out = amounts[i + 1];
            let (amount0_out, amount1_out) = if input == token0 {
                (0, amount_out)
            } else {
                (amount_out, 0)
            };
            let recipient = match path.get(i + 2) {
                Some(next) => pair_for(registry, &output, next)?,
                None => *to,
            };

            let pair = pair_for(registry, &input, &output)?;
            let ledger = registry
                .ledger_mut(&pair)
                .ok_or(AmmError::PairNotFound(input, output))?;
            ledger.swap(
                tokens,
                &self.address,
                SwapRequest::new(amount0_out, amount1_out, recipient),
                None,
                events,
            )?;
            debug!(
                "Hop {} -> {}: {} out to {}",
                input.short(),
                output.short(),
                amount_out,
                recipient.short()
            );
        }
        Ok(())
    }
}

fn check_path(path: &[TokenId]) -> Result<(), AmmError> {
    if path.len() < 2 {
        return Err(AmmError::InvalidPath(format!(
            "need at least 2 tokens, got {}",
            path.len()
        )));
    }
    Ok(())
}

fn pair_for<S: Storage + Default>(
    registry: &PairRegistry<S>,
    token_a: &TokenId,
    token_b: &TokenId,
) -> Result<Address, AmmError> {
    registry
        .get_pair(token_a, token_b)?
        .ok_or(AmmError::PairNotFound(*token_a, *token_b))
}

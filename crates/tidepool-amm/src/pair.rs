//! Reserve accounting for one token pair.
//!
//! Every mutator derives amounts from the tokens the ledger actually holds,
//! never from caller-declared amounts, and writes reserves only through
//! `update`, once per call, after all of that call's transfers.
//!
//! `swap` sends output before it verifies input. That is what makes flash
//! swaps possible, so there is no reentrancy guard here. A flash-swap callee
//! only receives the token collaborator; the exclusive borrow held on this
//! ledger for the duration of the call rules out nested mutation of it.

use tidepool_core::{
    Address, AmmEvent, Amount, PairInfo, Reserves, TokenId, BURN_ADDRESS, MINIMUM_LIQUIDITY,
};
use tidepool_state::{
    get_address, get_amount, load_or_default, put_address, put_amount, save, StateError, Storage,
    Transactional,
};
use tracing::debug;

use crate::client::{safe_transfer, FlashSwap, FlashSwapCallee, TokenClient};
use crate::error::AmmError;
use crate::fee_math::{mul_div, satisfies_invariant, sqrt_product};

mod keys {
    pub const FACTORY: &[u8] = b"meta:factory";
    pub const TOKEN0: &[u8] = b"meta:token0";
    pub const TOKEN1: &[u8] = b"meta:token1";
    pub const RESERVES: &[u8] = b"reserves";
    pub const TOTAL_SUPPLY: &[u8] = b"supply";
    pub const SHARES: &[u8] = b"lp:";
    pub const ALLOWANCE: &[u8] = b"lpa:";
}

/// Requested swap output
#[derive(Debug, Clone, Copy)]
pub struct SwapRequest<'a> {
    pub amount0_out: Amount,
    pub amount1_out: Amount,
    pub to: Address,
    /// Non-empty data triggers the flash-swap callee
    pub data: &'a [u8],
}

impl<'a> SwapRequest<'a> {
    pub fn new(amount0_out: Amount, amount1_out: Amount, to: Address) -> Self {
        SwapRequest {
            amount0_out,
            amount1_out,
            to,
            data: &[],
        }
    }

    pub fn with_data(mut self, data: &'a [u8]) -> Self {
        self.data = data;
        self
    }
}

/// Amounts a successful swap actually moved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapOutcome {
    pub amount0_in: Amount,
    pub amount1_in: Amount,
    pub amount0_out: Amount,
    pub amount1_out: Amount,
}

/// Pooled reserves and liquidity shares of one pair
#[derive(Debug, Clone)]
pub struct PairLedger<S: Storage> {
    address: Address,
    storage: S,
}

impl<S: Storage> PairLedger<S> {
    /// Deploy an uninitialized ledger that only `factory` may initialize
    pub fn new(address: Address, factory: Address, mut storage: S) -> Self {
        put_address(&mut storage, keys::FACTORY, &factory);
        PairLedger { address, storage }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// One-shot `Uninitialized -> Active` transition
    pub fn initialize(
        &mut self,
        caller: &Address,
        token0: TokenId,
        token1: TokenId,
    ) -> Result<(), AmmError> {
        if get_address(&self.storage, keys::FACTORY)? != Some(*caller) {
            return Err(AmmError::NotAuthorized(*caller));
        }
        if self.is_initialized() {
            return Err(AmmError::AlreadyInitialized);
        }
        if token0 == token1 {
            return Err(AmmError::IdenticalTokens);
        }

        put_address(&mut self.storage, keys::TOKEN0, &token0);
        put_address(&mut self.storage, keys::TOKEN1, &token1);

        debug!(
            "Initialized pair {} for {} / {}",
            self.address.short(),
            token0.short(),
            token1.short()
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.storage.exists(keys::TOKEN0)
    }

    /// Underlying `(token0, token1)`; fails until initialized
    pub fn tokens(&self) -> Result<(TokenId, TokenId), AmmError> {
        match (
            get_address(&self.storage, keys::TOKEN0)?,
            get_address(&self.storage, keys::TOKEN1)?,
        ) {
            (Some(token0), Some(token1)) => Ok((token0, token1)),
            _ => Err(AmmError::NotInitialized),
        }
    }

    pub fn get_reserves(&self) -> Result<Reserves, AmmError> {
        Ok(load_or_default(&self.storage, keys::RESERVES)?)
    }

    pub fn total_supply(&self) -> Result<Amount, AmmError> {
        Ok(get_amount(&self.storage, keys::TOTAL_SUPPLY)?)
    }

    /// Liquidity shares held by `holder`
    pub fn balance_of(&self, holder: &Address) -> Result<Amount, AmmError> {
        Ok(get_amount(&self.storage, &share_key(holder))?)
    }

    /// Every holder with a non-zero share balance, in address order
    pub fn share_holders(&self) -> Result<Vec<(Address, Amount)>, AmmError> {
        self.storage
            .keys_with_prefix(keys::SHARES)
            .iter()
            .map(|key| -> Result<(Address, Amount), AmmError> {
                let holder = Address::from_slice(&key[keys::SHARES.len()..]).ok_or_else(|| {
                    StateError::Corrupt {
                        key: String::from_utf8_lossy(key).into_owned(),
                        reason: "share key without a holder address".to_string(),
                    }
                })?;
                Ok((holder, self.balance_of(&holder)?))
            })
            .collect()
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Result<Amount, AmmError> {
        Ok(get_amount(&self.storage, &allowance_key(owner, spender))?)
    }

    pub fn info(&self) -> Result<PairInfo, AmmError> {
        let (token0, token1) = self.tokens()?;
        let reserves = self.get_reserves()?;
        Ok(PairInfo {
            pair: self.address,
            token0,
            token1,
            reserve0: reserves.reserve0,
            reserve1: reserves.reserve1,
            total_supply: self.total_supply()?,
        })
    }

    /// Allow `spender` to move up to `amount` of the owner's shares
    pub fn approve_shares(&mut self, owner: &Address, spender: &Address, amount: Amount) {
        put_amount(&mut self.storage, &allowance_key(owner, spender), amount);
    }

    pub fn transfer_shares(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), AmmError> {
        self.burn_shares(from, amount)?;
        self.mint_shares(to, amount)
    }

    pub fn transfer_shares_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), AmmError> {
        let allowed = self.allowance(from, spender)?;
        if allowed < amount {
            return Err(AmmError::InsufficientAllowance {
                have: allowed,
                need: amount,
            });
        }
        self.transfer_shares(from, to, amount)?;
        if allowed != Amount::MAX {
            self.approve_shares(from, spender, allowed - amount);
        }
        Ok(())
    }

    /// Issue shares for whatever the ledger holds beyond its reserves
    pub fn mint(
        &mut self,
        tokens: &mut dyn TokenClient,
        to: &Address,
        events: &mut Vec<AmmEvent>,
    ) -> Result<Amount, AmmError> {
        let (token0, token1) = self.tokens()?;
        let reserves = self.get_reserves()?;
        let balance0 = tokens.balance_of(&token0, &self.address)?;
        let balance1 = tokens.balance_of(&token1, &self.address)?;
        let amount0 = balance0.saturating_sub(reserves.reserve0);
        let amount1 = balance1.saturating_sub(reserves.reserve1);

        let total_supply = self.total_supply()?;
        let liquidity = if total_supply == 0 {
            let root = sqrt_product(amount0, amount1);
            if root <= MINIMUM_LIQUIDITY {
                return Err(AmmError::InsufficientLiquidityMinted);
            }
            self.mint_shares(&BURN_ADDRESS, MINIMUM_LIQUIDITY)?;
            root - MINIMUM_LIQUIDITY
        } else {
            let from0 = mul_div(amount0, total_supply, reserves.reserve0)?;
            let from1 = mul_div(amount1, total_supply, reserves.reserve1)?;
            from0.min(from1)
        };
        if liquidity == 0 {
            return Err(AmmError::InsufficientLiquidityMinted);
        }

        self.mint_shares(to, liquidity)?;
        self.update(balance0, balance1, events)?;
        events.push(AmmEvent::Mint {
            pair: self.address,
            to: *to,
            amount0,
            amount1,
        });

        debug!(
            "Minted {} shares of {} to {} for {} / {}",
            liquidity,
            self.address.short(),
            to.short(),
            amount0,
            amount1
        );
        Ok(liquidity)
    }

    /// Redeem the shares held by the ledger itself for a pro-rata slice of
    /// its actual balances
    pub fn burn(
        &mut self,
        tokens: &mut dyn TokenClient,
        sender: &Address,
        to: &Address,
        events: &mut Vec<AmmEvent>,
    ) -> Result<(Amount, Amount), AmmError> {
        let (token0, token1) = self.tokens()?;
        let me = self.address;
        let balance0 = tokens.balance_of(&token0, &me)?;
        let balance1 = tokens.balance_of(&token1, &me)?;
        let liquidity = self.balance_of(&me)?;

        let total_supply = self.total_supply()?;
        if total_supply == 0 {
            return Err(AmmError::InsufficientLiquidityBurned);
        }
        let amount0 = mul_div(liquidity, balance0, total_supply)?;
        let amount1 = mul_div(liquidity, balance1, total_supply)?;
        if amount0 == 0 || amount1 == 0 {
            return Err(AmmError::InsufficientLiquidityBurned);
        }

        self.burn_shares(&me, liquidity)?;
        safe_transfer(tokens, &token0, &me, to, amount0)?;
        safe_transfer(tokens, &token1, &me, to, amount1)?;

        let balance0 = tokens.balance_of(&token0, &me)?;
        let balance1 = tokens.balance_of(&token1, &me)?;
        self.update(balance0, balance1, events)?;
        events.push(AmmEvent::Burn {
            pair: me,
            sender: *sender,
            amount0,
            amount1,
            to: *to,
        });

        debug!(
            "Burned {} shares of {}: {} / {} to {}",
            liquidity,
            me.short(),
            amount0,
            amount1,
            to.short()
        );
        Ok((amount0, amount1))
    }

    /// Send the requested output, then verify the input received keeps the
    /// fee-adjusted constant product from decreasing
    pub fn swap(
        &mut self,
        tokens: &mut dyn TokenClient,
        sender: &Address,
        request: SwapRequest<'_>,
        callee: Option<&mut dyn FlashSwapCallee>,
        events: &mut Vec<AmmEvent>,
    ) -> Result<SwapOutcome, AmmError> {
        let SwapRequest {
            amount0_out,
            amount1_out,
            to,
            data,
        } = request;
        if amount0_out == 0 && amount1_out == 0 {
            return Err(AmmError::InsufficientOutputAmount);
        }
        let (token0, token1) = self.tokens()?;
        let reserves = self.get_reserves()?;
        if amount0_out > reserves.reserve0 || amount1_out > reserves.reserve1 {
            return Err(AmmError::InsufficientLiquidity);
        }
        if to == token0 || to == token1 {
            return Err(AmmError::InvalidRecipient(to));
        }

        let me = self.address;
        safe_transfer(tokens, &token0, &me, &to, amount0_out)?;
        safe_transfer(tokens, &token1, &me, &to, amount1_out)?;

        if !data.is_empty() {
            if let Some(callee) = callee {
                let flash = FlashSwap {
                    pair: me,
                    sender: *sender,
                    token0,
                    token1,
                    amount0_out,
                    amount1_out,
                    data,
                };
                callee.on_flash_swap(tokens, &flash)?;
            }
        }

        let balance0 = tokens.balance_of(&token0, &me)?;
        let balance1 = tokens.balance_of(&token1, &me)?;
        let amount0_in = balance0.saturating_sub(reserves.reserve0 - amount0_out);
        let amount1_in = balance1.saturating_sub(reserves.reserve1 - amount1_out);
        if amount0_in == 0 && amount1_in == 0 {
            return Err(AmmError::InsufficientInputAmount);
        }

        if !satisfies_invariant(
            balance0,
            balance1,
            amount0_in,
            amount1_in,
            reserves.reserve0,
            reserves.reserve1,
        ) {
            return Err(AmmError::InvalidK);
        }

        self.update(balance0, balance1, events)?;
        events.push(AmmEvent::Swap {
            pair: me,
            sender: *sender,
            amount0_in,
            amount1_in,
            amount0_out,
            amount1_out,
            to,
        });

        debug!(
            "Swap on {}: in {} / {}, out {} / {}",
            me.short(),
            amount0_in,
            amount1_in,
            amount0_out,
            amount1_out
        );
        Ok(SwapOutcome {
            amount0_in,
            amount1_in,
            amount0_out,
            amount1_out,
        })
    }

    /// Send any balance above the stored reserves to `to`
    pub fn skim(
        &self,
        tokens: &mut dyn TokenClient,
        to: &Address,
    ) -> Result<(Amount, Amount), AmmError> {
        let (token0, token1) = self.tokens()?;
        let reserves = self.get_reserves()?;
        let me = self.address;
        let excess0 = tokens.balance_of(&token0, &me)?.saturating_sub(reserves.reserve0);
        let excess1 = tokens.balance_of(&token1, &me)?.saturating_sub(reserves.reserve1);

        safe_transfer(tokens, &token0, &me, to, excess0)?;
        safe_transfer(tokens, &token1, &me, to, excess1)?;

        debug!("Skimmed {} / {} from {}", excess0, excess1, me.short());
        Ok((excess0, excess1))
    }

    /// Reconcile stored reserves with actual balances
    pub fn sync(
        &mut self,
        tokens: &mut dyn TokenClient,
        events: &mut Vec<AmmEvent>,
    ) -> Result<Reserves, AmmError> {
        let (token0, token1) = self.tokens()?;
        let balance0 = tokens.balance_of(&token0, &self.address)?;
        let balance1 = tokens.balance_of(&token1, &self.address)?;
        self.update(balance0, balance1, events)?;
        Ok(Reserves::new(balance0, balance1))
    }

    /// The only place reserves are written
    fn update(
        &mut self,
        balance0: Amount,
        balance1: Amount,
        events: &mut Vec<AmmEvent>,
    ) -> Result<(), AmmError> {
        save(
            &mut self.storage,
            keys::RESERVES,
            &Reserves::new(balance0, balance1),
        )?;
        events.push(AmmEvent::Sync {
            pair: self.address,
            reserve0: balance0,
            reserve1: balance1,
        });
        Ok(())
    }

    fn mint_shares(&mut self, to: &Address, amount: Amount) -> Result<(), AmmError> {
        let supply = self
            .total_supply()?
            .checked_add(amount)
            .ok_or(AmmError::Overflow)?;
        let balance = self
            .balance_of(to)?
            .checked_add(amount)
            .ok_or(AmmError::Overflow)?;
        put_amount(&mut self.storage, keys::TOTAL_SUPPLY, supply);
        put_amount(&mut self.storage, &share_key(to), balance);
        Ok(())
    }

    fn burn_shares(&mut self, from: &Address, amount: Amount) -> Result<(), AmmError> {
        let balance = self.balance_of(from)?;
        if balance < amount {
            return Err(AmmError::InsufficientShares {
                have: balance,
                need: amount,
            });
        }
        let supply = self.total_supply()?.saturating_sub(amount);
        put_amount(&mut self.storage, &share_key(from), balance - amount);
        put_amount(&mut self.storage, keys::TOTAL_SUPPLY, supply);
        Ok(())
    }
}

impl<S: Storage> Transactional for PairLedger<S> {
    fn prepare(&self) -> Result<(), StateError> {
        self.storage.prepare_commit()
    }

    fn commit(&mut self) -> Result<(), StateError> {
        self.storage.commit()
    }

    fn rollback(&mut self) {
        self.storage.rollback();
    }
}

fn share_key(holder: &Address) -> Vec<u8> {
    [keys::SHARES, holder.as_bytes()].concat()
}

fn allowance_key(owner: &Address, spender: &Address) -> Vec<u8> {
    [keys::ALLOWANCE, owner.as_bytes(), spender.as_bytes()].concat()
}

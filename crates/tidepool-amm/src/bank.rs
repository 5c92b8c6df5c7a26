//! In-memory multi-token ledger implementing [`TokenClient`].
//!
//! Supports allowances, fee-on-transfer tokens and frozen tokens so the
//! exchange can be exercised against adversarial collaborators.

use tidepool_core::{Address, Amount, TokenId};
use tidepool_state::{
    get_amount, get_u64, put_amount, put_u64, MemoryStorage, StateError, Storage, Transactional,
};
use tracing::debug;

use crate::client::TokenClient;
use crate::error::AmmError;

/// Basis points denominator for transfer fees
pub const BPS_DENOM: u64 = 10_000;

mod keys {
    pub const BALANCE: &[u8] = b"bal:";
    pub const ALLOWANCE: &[u8] = b"allow:";
    pub const SUPPLY: &[u8] = b"supply:";
    pub const TRANSFER_FEE: &[u8] = b"fee:";
    pub const FROZEN: &[u8] = b"frozen:";
}

#[derive(Debug, Clone, Default)]
pub struct MemoryBank<S: Storage = MemoryStorage> {
    storage: S,
}

impl MemoryBank<MemoryStorage> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: Storage> MemoryBank<S> {
    pub fn with_storage(storage: S) -> Self {
        MemoryBank { storage }
    }

    /// Create `amount` new tokens for `to`
    pub fn mint(
        &mut self,
        token: &TokenId,
        to: &Address,
        amount: Amount,
    ) -> Result<(), StateError> {
        let key = balance_key(token, to);
        let balance = get_amount(&self.storage, &key)?;
        put_amount(&mut self.storage, &key, balance.saturating_add(amount));

        let supply_key = scoped(keys::SUPPLY, &[token]);
        let supply = get_amount(&self.storage, &supply_key)?;
        put_amount(&mut self.storage, &supply_key, supply.saturating_add(amount));
        Ok(())
    }

    pub fn total_supply(&self, token: &TokenId) -> Result<Amount, StateError> {
        get_amount(&self.storage, &scoped(keys::SUPPLY, &[token]))
    }

    /// Allow `spender` to move up to `amount` of the owner's tokens.
    /// `Amount::MAX` never decreases.
    pub fn approve(&mut self, token: &TokenId, owner: &Address, spender: &Address, amount: Amount) {
        put_amount(
            &mut self.storage,
            &scoped(keys::ALLOWANCE, &[token, owner, spender]),
            amount,
        );
    }

    pub fn allowance(
        &self,
        token: &TokenId,
        owner: &Address,
        spender: &Address,
    ) -> Result<Amount, StateError> {
        get_amount(&self.storage, &scoped(keys::ALLOWANCE, &[token, owner, spender]))
    }

    /// Burn `bps` basis points of every transfer of `token`
    pub fn set_transfer_fee_bps(&mut self, token: &TokenId, bps: u64) {
        put_u64(
            &mut self.storage,
            &scoped(keys::TRANSFER_FEE, &[token]),
            bps.min(BPS_DENOM),
        );
    }

    pub fn transfer_fee_bps(&self, token: &TokenId) -> Result<u64, StateError> {
        get_u64(&self.storage, &scoped(keys::TRANSFER_FEE, &[token]))
    }

    /// Make every transfer of `token` return `false`
    pub fn set_frozen(&mut self, token: &TokenId, frozen: bool) {
        let key = scoped(keys::FROZEN, &[token]);
        if frozen {
            self.storage.put(&key, &[1u8]);
        } else {
            self.storage.delete(&key);
        }
    }

    pub fn is_frozen(&self, token: &TokenId) -> bool {
        self.storage.exists(&scoped(keys::FROZEN, &[token]))
    }

    fn move_tokens(
        &mut self,
        token: &TokenId,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<bool, StateError> {
        if self.is_frozen(token) {
            debug!("Token {} is frozen", token.short());
            return Ok(false);
        }

        let from_key = balance_key(token, from);
        let from_balance = get_amount(&self.storage, &from_key)?;
        if from_balance < amount {
            debug!(
                "Insufficient {} balance for {}: have {}, need {}",
                token.short(),
                from.short(),
                from_balance,
                amount
            );
            return Ok(false);
        }

        let fee = transfer_fee(amount, self.transfer_fee_bps(token)?);
        let received = amount - fee;
        let to_key = balance_key(token, to);
        let supply_key = scoped(keys::SUPPLY, &[token]);
        // All reads happen before the first write
        let to_balance = get_amount(&self.storage, &to_key)?;
        let supply = get_amount(&self.storage, &supply_key)?;

        put_amount(&mut self.storage, &from_key, from_balance - amount);
        let to_balance = if to_key == from_key {
            from_balance - amount
        } else {
            to_balance
        };
        put_amount(&mut self.storage, &to_key, to_balance.saturating_add(received));
        if fee > 0 {
            put_amount(&mut self.storage, &supply_key, supply.saturating_sub(fee));
        }
        Ok(true)
    }
}

impl<S: Storage> TokenClient for MemoryBank<S> {
    fn balance_of(&self, token: &TokenId, holder: &Address) -> Result<Amount, AmmError> {
        Ok(get_amount(&self.storage, &balance_key(token, holder))?)
    }

    fn transfer(
        &mut self,
        token: &TokenId,
        from: &Address,
        to: &Address,
        amount: Amount,
        _data: &[u8],
    ) -> Result<bool, AmmError> {
        Ok(self.move_tokens(token, from, to, amount)?)
    }

    fn transfer_from(
        &mut self,
        token: &TokenId,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<bool, AmmError> {
        let allowed = self.allowance(token, from, spender)?;
        if allowed < amount {
            debug!(
                "Allowance of {} for {} too low: have {}, need {}",
                from.short(),
                spender.short(),
                allowed,
                amount
            );
            return Ok(false);
        }
        if !self.move_tokens(token, from, to, amount)? {
            return Ok(false);
        }
        if allowed != Amount::MAX {
            self.approve(token, from, spender, allowed - amount);
        }
        Ok(true)
    }
}

impl<S: Storage> Transactional for MemoryBank<S> {
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

/// `floor(amount * bps / 10_000)` split to stay inside `u128`; never exceeds `amount`
fn transfer_fee(amount: Amount, bps: u64) -> Amount {
    let denom = Amount::from(BPS_DENOM);
    let bps = Amount::from(bps.min(BPS_DENOM));
    amount / denom * bps + amount % denom * bps / denom
}

fn balance_key(token: &TokenId, holder: &Address) -> Vec<u8> {
    scoped(keys::BALANCE, &[token, holder])
}

fn scoped(prefix: &[u8], parts: &[&Address]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + parts.len() * 32);
    key.extend_from_slice(prefix);
    for part in parts {
        key.extend_from_slice(part.as_bytes());
    }
    key
}

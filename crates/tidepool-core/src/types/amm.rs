use serde::{Deserialize, Serialize};

use crate::crypto::derive_address;
use crate::types::{Address, TokenId};

/// Token, reserve and share amounts
pub type Amount = u128;

/// Input-side fee multiplier (0.3% fee)
pub const FEE_NUMERATOR: Amount = 997;
/// Fee denominator
pub const FEE_DENOMINATOR: Amount = 1000;
/// Shares locked forever on the first mint of every pair
pub const MINIMUM_LIQUIDITY: Amount = 1000;
/// Holder of the locked minimum liquidity
pub const BURN_ADDRESS: Address = Address::ZERO;

const PAIR_DOMAIN: &[u8] = b"tidepool:pair";

/// Canonical unordered token pair with `token0 < token1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub token0: TokenId,
    pub token1: TokenId,
}

impl PairKey {
    /// Canonicalize two tokens. Returns `None` for identical tokens.
    pub fn new(token_a: TokenId, token_b: TokenId) -> Option<Self> {
        if token_a == token_b {
            return None;
        }
        let (token0, token1) = sort_tokens(token_a, token_b);
        Some(PairKey { token0, token1 })
    }

    /// Deterministic identity of the ledger for this key
    pub fn pair_address(&self) -> Address {
        compute_pair_address(self)
    }

    pub fn contains(&self, token: &TokenId) -> bool {
        self.token0 == *token || self.token1 == *token
    }

    /// Storage key bytes: `token0 || token1`
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(self.token0.as_bytes());
        out[32..].copy_from_slice(self.token1.as_bytes());
        out
    }
}

/// Sort a token pair by the fixed total order
pub fn sort_tokens(token_a: TokenId, token_b: TokenId) -> (TokenId, TokenId) {
    if token_a <= token_b {
        (token_a, token_b)
    } else {
        (token_b, token_a)
    }
}

/// Compute the deterministic pair identity from its canonical key
pub fn compute_pair_address(key: &PairKey) -> Address {
    derive_address(PAIR_DOMAIN, &[key.token0.as_bytes(), key.token1.as_bytes()])
}

/// Stored reserves of one pair as of its last update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reserves {
    pub reserve0: Amount,
    pub reserve1: Amount,
}

impl Reserves {
    pub fn new(reserve0: Amount, reserve1: Amount) -> Self {
        Reserves { reserve0, reserve1 }
    }
}

/// Read-only snapshot of a pair for enumeration and reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairInfo {
    pub pair: Address,
    pub token0: TokenId,
    pub token1: TokenId,
    pub reserve0: Amount,
    pub reserve1: Amount,
    pub total_supply: Amount,
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Address, Amount, Reserves, TokenId};

/// Notification emitted by a mutating exchange operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AmmEvent {
    PairCreated {
        token0: TokenId,
        token1: TokenId,
        pair: Address,
        all_pairs_length: u64,
    },
    Mint {
        pair: Address,
        to: Address,
        #[serde(with = "crate::serialize::amount")]
        amount0: Amount,
        #[serde(with = "crate::serialize::amount")]
        amount1: Amount,
    },
    Burn {
        pair: Address,
        sender: Address,
        #[serde(with = "crate::serialize::amount")]
        amount0: Amount,
        #[serde(with = "crate::serialize::amount")]
        amount1: Amount,
        to: Address,
    },
    Swap {
        pair: Address,
        sender: Address,
        #[serde(with = "crate::serialize::amount")]
        amount0_in: Amount,
        #[serde(with = "crate::serialize::amount")]
        amount1_in: Amount,
        #[serde(with = "crate::serialize::amount")]
        amount0_out: Amount,
        #[serde(with = "crate::serialize::amount")]
        amount1_out: Amount,
        to: Address,
    },
    Sync {
        pair: Address,
        #[serde(with = "crate::serialize::amount")]
        reserve0: Amount,
        #[serde(with = "crate::serialize::amount")]
        reserve1: Amount,
    },
}

impl AmmEvent {
    /// Short event name for logs
    pub fn name(&self) -> &'static str {
        match self {
            AmmEvent::PairCreated { .. } => "pair_created",
            AmmEvent::Mint { .. } => "mint",
            AmmEvent::Burn { .. } => "burn",
            AmmEvent::Swap { .. } => "swap",
            AmmEvent::Sync { .. } => "sync",
        }
    }
}

/// Receives the events of every committed call, in emission order
pub trait EventSink: Send + Sync {
    fn on_events(&self, events: &[AmmEvent]);
}

/// Rebuild the latest reserves of every pair from an event stream.
///
/// Only `Sync` carries reserves; every reserve write emits exactly one.
pub fn replay_reserves<'a, I>(events: I) -> BTreeMap<Address, Reserves>
where
    I: IntoIterator<Item = &'a AmmEvent>,
{
    let mut reserves = BTreeMap::new();
    for event in events {
        if let AmmEvent::Sync {
            pair,
            reserve0,
            reserve1,
        } = event
        {
            reserves.insert(*pair, Reserves::new(*reserve0, *reserve1));
        }
    }
    reserves
}

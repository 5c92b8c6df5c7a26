pub mod address;
pub mod amm;
pub mod event;

pub use address::{Address, TokenId};
pub use amm::{
    compute_pair_address, sort_tokens, Amount, PairInfo, PairKey, Reserves, BURN_ADDRESS,
    FEE_DENOMINATOR, FEE_NUMERATOR, MINIMUM_LIQUIDITY,
};
pub use event::{replay_reserves, AmmEvent, EventSink};

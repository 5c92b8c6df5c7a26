//! Tidepool AMM - Constant-product pair ledgers, registry and router
//!
//! [`PairLedger`] prices trades against pooled reserves and issues liquidity
//! shares, [`PairRegistry`] mints one ledger per unordered token pair, and
//! [`Router`] composes multi-hop swaps and liquidity calls on top of them.
//! [`Exchange`] runs each call atomically against every store involved.

pub mod bank;
pub mod client;
pub mod error;
pub mod exchange;
pub mod fee_math;
pub mod pair;
pub mod registry;
pub mod router;

pub use bank::MemoryBank;
pub use client::{FlashSwap, FlashSwapCallee, TokenClient};
pub use error::{AmmError, ErrorKind};
pub use exchange::{Exchange, Receipt};
pub use fee_math::{get_amount_in, get_amount_out, quote};
pub use pair::{PairLedger, SwapOutcome, SwapRequest};
pub use registry::PairRegistry;
pub use router::{
    AddLiquidity, LiquidityAdded, RemoveLiquidity, Router, SwapExactIn, SwapExactOut,
};

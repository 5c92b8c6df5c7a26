use thiserror::Error;
use tidepool_core::{Address, Amount};

/// Failure classes callers can act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller error; never retried automatically
    InputValidation,
    /// Economically invalid right now; retry only with different parameters
    State,
    /// An external collaborator refused; fatal to the call
    Collaborator,
    /// Caller lacks the required identity
    Authorization,
    /// Storage or encoding failure
    Internal,
}

#[derive(Debug, Error)]
pub enum AmmError {
    #[error("Identical tokens")]
    IdenticalTokens,

    #[error("Invalid amount")]
    InvalidAmount,

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(Address),

    #[error("Pair not found for {0} / {1}")]
    PairNotFound(Address, Address),

    #[error("Deadline expired: now {now}, deadline {deadline}")]
    DeadlineExpired { now: u64, deadline: u64 },

    #[error("Pair already exists: {0}")]
    PairExists(Address),

    #[error("Pair already initialized")]
    AlreadyInitialized,

    #[error("Pair not initialized")]
    NotInitialized,

    #[error("Insufficient liquidity")]
    InsufficientLiquidity,

    #[error("Insufficient liquidity minted")]
    InsufficientLiquidityMinted,

    #[error("Insufficient liquidity burned")]
    InsufficientLiquidityBurned,

    #[error("Insufficient output amount")]
    InsufficientOutputAmount,

    #[error("Insufficient input amount")]
    InsufficientInputAmount,

    #[error("Insufficient A amount")]
    InsufficientAAmount,

    #[error("Insufficient B amount")]
    InsufficientBAmount,

    #[error("Insufficient amount")]
    InsufficientAmount,

    #[error("Excessive input amount")]
    ExcessiveInputAmount,

    #[error("Invalid K")]
    InvalidK,

    #[error("Insufficient shares: have {have}, need {need}")]
    InsufficientShares { have: Amount, need: Amount },

    #[error("Insufficient allowance: have {have}, need {need}")]
    InsufficientAllowance { have: Amount, need: Amount },

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Transfer of {amount} {token} from {from} to {to} failed")]
    TransferFailed {
        token: Address,
        from: Address,
        to: Address,
        amount: Amount,
    },

    #[error("Flash swap callback failed: {0}")]
    Callback(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(Address),

    #[error("State error: {0}")]
    State(#[from] tidepool_state::StateError),

    #[error("Core error: {0}")]
    Core(#[from] tidepool_core::CoreError),
}

impl AmmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AmmError::IdenticalTokens
            | AmmError::InvalidAmount
            | AmmError::InvalidPath(_)
            | AmmError::InvalidRecipient(_)
            | AmmError::PairNotFound(..) => ErrorKind::InputValidation,

            AmmError::DeadlineExpired { .. }
            | AmmError::PairExists(_)
            | AmmError::AlreadyInitialized
            | AmmError::NotInitialized
            | AmmError::InsufficientLiquidity
            | AmmError::InsufficientLiquidityMinted
            | AmmError::InsufficientLiquidityBurned
            | AmmError::InsufficientOutputAmount
            | AmmError::InsufficientInputAmount
            | AmmError::InsufficientAAmount
            | AmmError::InsufficientBAmount
            | AmmError::InsufficientAmount
            | AmmError::ExcessiveInputAmount
            | AmmError::InvalidK
            | AmmError::InsufficientShares { .. }
            | AmmError::InsufficientAllowance { .. }
            | AmmError::Overflow => ErrorKind::State,

            AmmError::TransferFailed { .. } | AmmError::Callback(_) => ErrorKind::Collaborator,

            AmmError::NotAuthorized(_) => ErrorKind::Authorization,

            AmmError::State(_) | AmmError::Core(_) => ErrorKind::Internal,
        }
    }
}

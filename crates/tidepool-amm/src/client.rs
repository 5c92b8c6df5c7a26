use tidepool_core::{Address, Amount, TokenId};
use tracing::warn;

use crate::error::AmmError;

/// Narrow capability over external fungible tokens.
///
/// `Ok(false)` means the token refused the transfer; callers abort the whole
/// operation with [`AmmError::TransferFailed`]. `Err` means the collaborator
/// itself is broken and is passed through unchanged.
pub trait TokenClient {
    /// Current balance of `holder` in `token`
    fn balance_of(&self, token: &TokenId, holder: &Address) -> Result<Amount, AmmError>;

    /// Move `amount` of the holder's own tokens
    fn transfer(
        &mut self,
        token: &TokenId,
        from: &Address,
        to: &Address,
        amount: Amount,
        data: &[u8],
    ) -> Result<bool, AmmError>;

    /// Move `amount` on behalf of `from` using the allowance granted to `spender`
    fn transfer_from(
        &mut self,
        token: &TokenId,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<bool, AmmError>;
}

/// Context handed to a flash-swap callee
#[derive(Debug, Clone, Copy)]
pub struct FlashSwap<'a> {
    pub pair: Address,
    pub sender: Address,
    pub token0: TokenId,
    pub token1: TokenId,
    pub amount0_out: Amount,
    pub amount1_out: Amount,
    pub data: &'a [u8],
}

/// Receiver of optimistic swap output.
///
/// Runs after the pair has sent the requested output and before the
/// invariant check; it must leave the pair holding enough input to satisfy
/// the constant-product check.
pub trait FlashSwapCallee {
    fn on_flash_swap(
        &mut self,
        tokens: &mut dyn TokenClient,
        swap: &FlashSwap<'_>,
    ) -> Result<(), AmmError>;
}

/// Transfer out of `from`, mapping a refusal to `TransferFailed`. Zero is a no-op.
pub(crate) fn safe_transfer(
    tokens: &mut dyn TokenClient,
    token: &TokenId,
    from: &Address,
    to: &Address,
    amount: Amount,
) -> Result<(), AmmError> {
    if amount == 0 {
        return Ok(());
    }
    if !tokens.transfer(token, from, to, amount, &[])? {
        warn!("Transfer of {} {} to {} refused", amount, token.short(), to.short());
        return Err(AmmError::TransferFailed {
            token: *token,
            from: *from,
            to: *to,
            amount,
        });
    }
    Ok(())
}

/// Spender-authorized transfer, mapping a refusal to `TransferFailed`
pub(crate) fn safe_transfer_from(
    tokens: &mut dyn TokenClient,
    token: &TokenId,
    spender: &Address,
    from: &Address,
    to: &Address,
    amount: Amount,
) -> Result<(), AmmError> {
    if amount == 0 {
        return Ok(());
    }
    if !tokens.transfer_from(token, spender, from, to, amount)? {
        warn!(
            "TransferFrom of {} {} from {} refused",
            amount,
            token.short(),
            from.short()
        );
        return Err(AmmError::TransferFailed {
            token: *token,
            from: *from,
            to: *to,
            amount,
        });
    }
    Ok(())
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid address length: {0}")]
    InvalidAddressLength(usize),

    #[error("Hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}

pub mod hash;

pub use hash::{derive_address, hash_blake3};

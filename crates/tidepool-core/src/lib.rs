//! Tidepool Core - Identities, pair keys, events and serialization
//!
//! This crate provides the foundational types shared by the Tidepool
//! constant-product exchange: addresses, canonical pair keys, reserve
//! snapshots and the events emitted by every mutating operation.

pub mod crypto;
pub mod error;
pub mod serialize;
pub mod types;

pub use crypto::{derive_address, hash_blake3};
pub use error::CoreError;
pub use types::*;

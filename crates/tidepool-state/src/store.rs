//! Typed accessors over a [`Storage`].
//!
//! Absent keys read as zero, `None` or `T::default()`. Fixed-width scalars
//! (amounts, counters, addresses) are stored as raw little-endian bytes;
//! structured values go through bincode. A present value of the wrong shape
//! is always `StateError::Corrupt`, never a default.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tidepool_core::{serialize, Address, Amount};
use tracing::warn;

use crate::error::StateError;
use crate::storage::Storage;

/// Something that owns one or more stores and can settle a call.
///
/// Settling is two-phase: every participant is prepared before any of them
/// commits, so a refusal leaves all of them rollback-able.
pub trait Transactional {
    /// Check every owned store without making anything durable
    fn prepare(&self) -> Result<(), StateError>;

    /// Make every pending write durable
    fn commit(&mut self) -> Result<(), StateError>;

    /// Drop every pending write
    fn rollback(&mut self);
}

/// Load a bincode value
pub fn load<T, S>(storage: &S, key: &[u8]) -> Result<Option<T>, StateError>
where
    T: DeserializeOwned,
    S: Storage + ?Sized,
{
    match storage.get(key) {
        Some(bytes) => serialize::from_bytes(&bytes)
            .map(Some)
            .map_err(|e| corrupt(key, e.to_string())),
        None => Ok(None),
    }
}

/// Load a bincode value, falling back to its default when absent
pub fn load_or_default<T, S>(storage: &S, key: &[u8]) -> Result<T, StateError>
where
    T: DeserializeOwned + Default,
    S: Storage + ?Sized,
{
    Ok(load(storage, key)?.unwrap_or_default())
}

/// Save a bincode value
pub fn save<T, S>(storage: &mut S, key: &[u8], value: &T) -> Result<(), StateError>
where
    T: Serialize,
    S: Storage + ?Sized,
{
    let bytes = serialize::to_bytes(value)?;
    storage.put(key, &bytes);
    Ok(())
}

pub fn get_amount<S: Storage + ?Sized>(storage: &S, key: &[u8]) -> Result<Amount, StateError> {
    match storage.get(key) {
        Some(bytes) => <[u8; 16]>::try_from(bytes.as_slice())
            .map(Amount::from_le_bytes)
            .map_err(|_| malformed(key, "amount", &bytes)),
        None => Ok(0),
    }
}

/// Store an amount; zero deletes the key
pub fn put_amount<S: Storage + ?Sized>(storage: &mut S, key: &[u8], amount: Amount) {
    if amount == 0 {
        storage.delete(key);
    } else {
        storage.put(key, &amount.to_le_bytes());
    }
}

pub fn get_u64<S: Storage + ?Sized>(storage: &S, key: &[u8]) -> Result<u64, StateError> {
    match storage.get(key) {
        Some(bytes) => <[u8; 8]>::try_from(bytes.as_slice())
            .map(u64::from_le_bytes)
            .map_err(|_| malformed(key, "u64", &bytes)),
        None => Ok(0),
    }
}

pub fn put_u64<S: Storage + ?Sized>(storage: &mut S, key: &[u8], value: u64) {
    storage.put(key, &value.to_le_bytes());
}

pub fn get_address<S: Storage + ?Sized>(
    storage: &S,
    key: &[u8],
) -> Result<Option<Address>, StateError> {
    match storage.get(key) {
        Some(bytes) => Address::from_slice(&bytes)
            .map(Some)
            .ok_or_else(|| malformed(key, "address", &bytes)),
        None => Ok(None),
    }
}

pub fn put_address<S: Storage + ?Sized>(storage: &mut S, key: &[u8], address: &Address) {
    storage.put(key, address.as_bytes());
}

fn corrupt(key: &[u8], reason: String) -> StateError {
    StateError::Corrupt {
        key: printable(key),
        reason,
    }
}

fn malformed(key: &[u8], what: &str, bytes: &[u8]) -> StateError {
    warn!("Malformed {} under {}", what, printable(key));
    corrupt(key, format!("expected {}, found {} bytes", what, bytes.len()))
}

fn printable(key: &[u8]) -> String {
    String::from_utf8_lossy(key).into_owned()
}

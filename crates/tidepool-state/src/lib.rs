//! Tidepool State - Keyed stores owned by exchange components
//!
//! Every ledger, the pair registry and the in-memory token bank own a private
//! [`Storage`] instance. Writes stay pending until the owning call commits,
//! which is what lets a failed call leave no trace.

pub mod error;
pub mod storage;
pub mod store;

pub use error::StateError;
pub use storage::{MemoryStorage, Storage};
pub use store::{
    get_address, get_amount, get_u64, load, load_or_default, put_address, put_amount, put_u64,
    save, Transactional,
};

//! Pair registry: one ledger per unordered token pair.

use std::collections::BTreeMap;

use tidepool_core::{Address, AmmEvent, PairInfo, PairKey, TokenId};
use tidepool_state::{
    get_address, get_u64, put_address, put_u64, MemoryStorage, StateError, Storage, Transactional,
};
use tracing::{debug, info};

use crate::error::AmmError;
use crate::pair::PairLedger;

mod keys {
    pub const PAIR: &[u8] = b"pair:";
    pub const ALL_PAIRS: &[u8] = b"all:";
    pub const LENGTH: &[u8] = b"len";
}

/// Creates, initializes and owns every pair ledger
#[derive(Debug)]
pub struct PairRegistry<S: Storage + Default = MemoryStorage> {
    address: Address,
    storage: S,
    ledgers: BTreeMap<Address, PairLedger<S>>,
    /// Ledgers created since the last commit
    pending: Vec<Address>,
}

impl PairRegistry<MemoryStorage> {
    pub fn new(address: Address) -> Self {
        Self::with_storage(address, MemoryStorage::new())
    }
}

impl<S: Storage + Default> PairRegistry<S> {
    pub fn with_storage(address: Address, storage: S) -> Self {
        PairRegistry {
            address,
            storage,
            ledgers: BTreeMap::new(),
            pending: Vec::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Create and initialize the ledger for `(token_a, token_b)` in either order
    pub fn create_pair(
        &mut self,
        token_a: TokenId,
        token_b: TokenId,
        events: &mut Vec<AmmEvent>,
    ) -> Result<Address, AmmError> {
        let key = PairKey::new(token_a, token_b).ok_or(AmmError::IdenticalTokens)?;
        if let Some(existing) = get_address(&self.storage, &pair_key(&key))? {
            return Err(AmmError::PairExists(existing));
        }

        let pair = key.pair_address();
        let mut ledger = PairLedger::new(pair, self.address, S::default());
        ledger.initialize(&self.address, key.token0, key.token1)?;

        let index = self.all_pairs_length()?;
        put_address(&mut self.storage, &pair_key(&key), &pair);
        put_address(&mut self.storage, &index_key(index), &pair);
        put_u64(&mut self.storage, keys::LENGTH, index + 1);

        self.ledgers.insert(pair, ledger);
        self.pending.push(pair);

        events.push(AmmEvent::PairCreated {
            token0: key.token0,
            token1: key.token1,
            pair,
            all_pairs_length: index + 1,
        });

        info!(
            "Created pair {} for {} / {} ({} total)",
            pair.short(),
            key.token0.short(),
            key.token1.short(),
            index + 1
        );
        Ok(pair)
    }

    /// Ledger identity for the pair; `Ok(None)` if none was created
    pub fn get_pair(
        &self,
        token_a: &TokenId,
        token_b: &TokenId,
    ) -> Result<Option<Address>, AmmError> {
        match PairKey::new(*token_a, *token_b) {
            Some(key) => Ok(get_address(&self.storage, &pair_key(&key))?),
            None => Ok(None),
        }
    }

    pub fn all_pairs(&self, index: u64) -> Result<Option<Address>, AmmError> {
        Ok(get_address(&self.storage, &index_key(index))?)
    }

    pub fn all_pairs_length(&self) -> Result<u64, AmmError> {
        Ok(get_u64(&self.storage, keys::LENGTH)?)
    }

    pub fn ledger(&self, pair: &Address) -> Option<&PairLedger<S>> {
        self.ledgers.get(pair)
    }

    pub fn ledger_mut(&mut self, pair: &Address) -> Option<&mut PairLedger<S>> {
        self.ledgers.get_mut(pair)
    }

    /// Ledger for a token pair, failing with `PairNotFound` when absent
    pub fn ledger_for(
        &self,
        token_a: &TokenId,
        token_b: &TokenId,
    ) -> Result<&PairLedger<S>, AmmError> {
        self.get_pair(token_a, token_b)?
            .and_then(|pair| self.ledgers.get(&pair))
            .ok_or(AmmError::PairNotFound(*token_a, *token_b))
    }

    pub fn ledger_for_mut(
        &mut self,
        token_a: &TokenId,
        token_b: &TokenId,
    ) -> Result<&mut PairLedger<S>, AmmError> {
        match self.get_pair(token_a, token_b)? {
            Some(pair) => self
                .ledgers
                .get_mut(&pair)
                .ok_or(AmmError::PairNotFound(*token_a, *token_b)),
            None => Err(AmmError::PairNotFound(*token_a, *token_b)),
        }
    }

    /// Snapshot of every pair in creation order
    pub fn pairs(&self) -> Result<Vec<PairInfo>, AmmError> {
        let mut infos = Vec::new();
        for index in 0..self.all_pairs_length()? {
            let pair = self.all_pairs(index)?.ok_or_else(|| StateError::Corrupt {
                key: format!("all:{}", index),
                reason: "missing pair index".to_string(),
            })?;
            if let Some(ledger) = self.ledgers.get(&pair) {
                infos.push(ledger.info()?);
            }
        }
        Ok(infos)
    }
}

impl<S: Storage + Default> Transactional for PairRegistry<S> {
    fn prepare(&self) -> Result<(), StateError> {
        self.storage.prepare_commit()?;
        for ledger in self.ledgers.values() {
            ledger.prepare()?;
        }
        Ok(())
    }

    /// Callers run `prepare` first; see [`Transactional`]
    fn commit(&mut self) -> Result<(), StateError> {
        self.storage.commit()?;
        for ledger in self.ledgers.values_mut() {
            ledger.commit()?;
        }
        self.pending.clear();
        Ok(())
    }

    fn rollback(&mut self) {
        for pair in self.pending.drain(..) {
            debug!("Discarding uncommitted pair {}", pair.short());
            self.ledgers.remove(&pair);
        }
        self.storage.rollback();
        for ledger in self.ledgers.values_mut() {
            ledger.rollback();
        }
    }
}

fn pair_key(key: &PairKey) -> Vec<u8> {
    [keys::PAIR, &key.to_bytes()[..]].concat()
}

fn index_key(index: u64) -> Vec<u8> {
    [keys::ALL_PAIRS, &index.to_be_bytes()[..]].concat()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidepool_core::sort_tokens;

    fn tokens() -> (TokenId, TokenId, TokenId) {
        (
            Address::from_label("token:A"),
            Address::from_label("token:B"),
            Address::from_label("token:C"),
        )
    }

    #[test]
    fn test_create_pair_canonicalizes() {
        let (a, b, _) = tokens();
        let mut registry = PairRegistry::new(Address::from_label("registry"));
        let mut events = Vec::new();

        let pair = registry.create_pair(b, a, &mut events).unwrap();
        assert_eq!(registry.get_pair(&a, &b).unwrap(), Some(pair));
        assert_eq!(registry.get_pair(&b, &a).unwrap(), Some(pair));
        assert_eq!(pair, PairKey::new(a, b).unwrap().pair_address());

        let ledger = registry.ledger(&pair).unwrap();
        assert_eq!(ledger.tokens().unwrap(), sort_tokens(a, b));

        assert!(matches!(
            registry.create_pair(a, b, &mut events),
            Err(AmmError::PairExists(existing)) if existing == pair
        ));
        assert_eq!(registry.all_pairs_length().unwrap(), 1);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_identical_tokens_rejected() {
        let (a, _, _) = tokens();
        let mut registry = PairRegistry::new(Address::from_label("registry"));
        let mut events = Vec::new();
        assert!(matches!(
            registry.create_pair(a, a, &mut events),
            Err(AmmError::IdenticalTokens)
        ));
        assert!(events.is_empty());
    }

    #[test]
    fn test_enumeration_in_creation_order() {
        let (a, b, c) = tokens();
        let mut registry = PairRegistry::new(Address::from_label("registry"));
        let mut events = Vec::new();

        let first = registry.create_pair(a, b, &mut events).unwrap();
        let second = registry.create_pair(c, b, &mut events).unwrap();

        assert_eq!(registry.all_pairs_length().unwrap(), 2);
        assert_eq!(registry.all_pairs(0).unwrap(), Some(first));
        assert_eq!(registry.all_pairs(1).unwrap(), Some(second));
        assert_eq!(registry.all_pairs(2).unwrap(), None);

        let lengths: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                AmmEvent::PairCreated { all_pairs_length, .. } => Some(*all_pairs_length),
                _ => None,
            })
            .collect();
        assert_eq!(lengths, vec![1, 2]);

        let infos = registry.pairs().unwrap();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[1].pair, second);
    }

    #[test]
    fn test_missing_pair() {
        let (a, b, _) = tokens();
        let registry = PairRegistry::new(Address::from_label("registry"));
        assert_eq!(registry.get_pair(&a, &b).unwrap(), None);
        assert!(matches!(
            registry.ledger_for(&a, &b),
            Err(AmmError::PairNotFound(_, _))
        ));
    }

    #[test]
    fn test_corrupt_length_blocks_creation() {
        let (a, b, _) = tokens();
        let mut registry = PairRegistry::new(Address::from_label("registry"));
        let mut events = Vec::new();
        registry.storage.put(keys::LENGTH, &[9, 9]);

        assert!(matches!(
            registry.all_pairs_length(),
            Err(AmmError::State(StateError::Corrupt { .. }))
        ));
        assert!(matches!(
            registry.create_pair(a, b, &mut events),
            Err(AmmError::State(StateError::Corrupt { .. }))
        ));
        assert!(registry.pairs().is_err());
        assert!(events.is_empty());
    }

    #[test]
    fn test_rollback_forgets_new_pairs() {
        let (a, b, c) = tokens();
        let mut registry = PairRegistry::new(Address::from_label("registry"));
        let mut events = Vec::new();

        let kept = registry.create_pair(a, b, &mut events).unwrap();
        registry.commit().unwrap();

        let dropped = registry.create_pair(a, c, &mut events).unwrap();
        registry.rollback();

        assert_eq!(registry.all_pairs_length().unwrap(), 1);
        assert_eq!(registry.get_pair(&a, &c).unwrap(), None);
        assert!(registry.ledger(&dropped).is_none());
        assert!(registry.ledger(&kept).unwrap().is_initialized());

        // The same pair can be created again after the aborted attempt
        assert_eq!(registry.create_pair(c, a, &mut events).unwrap(), dropped);
    }
}

use tidepool_core::{AmmEvent, EventSink};
use tidepool_state::{MemoryStorage, StateError, Storage, Transactional};
use tracing::{info, warn};

use crate::bank::MemoryBank;
use crate::client::TokenClient;
use crate::error::AmmError;
use crate::registry::PairRegistry;

/// Result of a committed call together with the events it emitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt<T> {
    pub value: T,
    pub events: Vec<AmmEvent>,
}

/// Runs each logical call atomically across the registry, every pair ledger
/// and the token collaborator.
pub struct Exchange<S = MemoryStorage, B = MemoryBank>
where
    S: Storage + Default,
    B: TokenClient + Transactional,
{
    registry: PairRegistry<S>,
    tokens: B,
    sinks: Vec<Box<dyn EventSink>>,
}

impl<S, B> Exchange<S, B>
where
    S: Storage + Default,
    B: TokenClient + Transactional,
{
    pub fn new(registry: PairRegistry<S>, tokens: B) -> Self {
        Exchange {
            registry,
            tokens,
            sinks: Vec::new(),
        }
    }

    pub fn registry(&self) -> &PairRegistry<S> {
        &self.registry
    }

    pub fn tokens(&self) -> &B {
        &self.tokens
    }

    /// Deliver every committed batch of events to `sink`
    pub fn subscribe(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    /// Apply setup writes to the token collaborator and commit them at once
    pub fn seed<F>(&mut self, f: F) -> Result<(), AmmError>
    where
        F: FnOnce(&mut B) -> Result<(), AmmError>,
    {
        let settled = f(&mut self.tokens).and_then(|()| {
            self.tokens.prepare()?;
            Ok(self.tokens.commit()?)
        });
        if settled.is_err() {
            self.tokens.rollback();
        }
        settled
    }

    /// Run `f` as one call: commit everything on `Ok`, roll everything back
    /// on `Err`. Sinks only ever see committed events.
    pub fn execute<T, F>(&mut self, label: &str, f: F) -> Result<Receipt<T>, AmmError>
    where
        F: FnOnce(&mut PairRegistry<S>, &mut B, &mut Vec<AmmEvent>) -> Result<T, AmmError>,
    {
        let mut events = Vec::new();
        let value = match f(&mut self.registry, &mut self.tokens, &mut events) {
            Ok(value) => value,
            Err(err) => {
                self.rollback();
                warn!("{} rolled back: {}", label, err);
                return Err(err);
            }
        };

        if let Err(err) = self.commit() {
            self.rollback();
            warn!("{} failed to commit: {}", label, err);
            return Err(err.into());
        }

        for sink in &self.sinks {
            sink.on_events(&events);
        }
        info!("{} committed ({} events)", label, events.len());
        Ok(Receipt { value, events })
    }

    fn commit(&mut self) -> Result<(), StateError> {
        self.registry.prepare()?;
        self.tokens.prepare()?;
        self.registry.commit()?;
        self.tokens.commit()
    }

    fn rollback(&mut self) {
        self.registry.rollback();
        self.tokens.rollback();
    }
}

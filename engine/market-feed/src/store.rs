//! In-process price store
//!
//! The simulator is the only writer of quotes. Readers always get a cloned
//! snapshot, so a reader never observes an instrument half way through a tick.

use std::collections::BTreeMap;

use tokio::sync::RwLock;

use crate::instrument::Instrument;

/// Current quotes for every tracked instrument, keyed by instrument id
#[derive(Debug, Default)]
pub struct PriceStore {
    instruments: RwLock<BTreeMap<i32, Instrument>>,
}

impl PriceStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with the given instruments
    pub fn with_instruments(instruments: Vec<Instrument>) -> Self {
        let map = instruments.into_iter().map(|i| (i.id, i)).collect();
        Self { instruments: RwLock::new(map) }
    }

    /// All instruments ordered by id
    pub async fn snapshot(&self) -> Vec<Instrument> {
        let instruments = self.instruments.read().await;
        instruments.values().cloned().collect()
    }

    /// Look up an instrument by id
    pub async fn get(&self, id: i32) -> Option<Instrument> {
        let instruments = self.instruments.read().await;
        instruments.get(&id).cloned()
    }

    /// Replace a batch of instruments under one write lock.
    ///
    /// Ids that are not tracked are ignored. Returns how many were replaced
    /// together with the post-commit snapshot.
    pub async fn commit(&self, updated: Vec<Instrument>) -> (usize, Vec<Instrument>) {
        let mut instruments = self.instruments.write().await;
        let mut replaced = 0;
        for instrument in updated {
            if let Some(slot) = instruments.get_mut(&instrument.id) {
                *slot = instrument;
                replaced += 1;
            }
        }
        (replaced, instruments.values().cloned().collect())
    }

    /// Number of tracked instruments
    pub async fn len(&self) -> usize {
        self.instruments.read().await.len()
    }

    /// Whether the store tracks no instruments
    pub async fn is_empty(&self) -> bool {
        self.instruments.read().await.is_empty()
    }
}

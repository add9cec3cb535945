//! Durable storage seam for instrument quotes

use async_trait::async_trait;

use crate::error::Result;
use crate::instrument::Instrument;

/// Persistence for instrument quotes.
///
/// The price store is authoritative for readers; the repository seeds it at
/// startup and receives a write-through of every quote the simulator commits.
#[async_trait]
pub trait InstrumentRepository: Send + Sync {
    /// Load every persisted instrument
    async fn load_instruments(&self) -> Result<Vec<Instrument>>;

    /// Persist one instrument's quote fields
    async fn save_quote(&self, instrument: &Instrument) -> Result<()>;

    /// Insert instruments that do not exist yet, returning the stored rows
    async fn seed_instruments(&self, instruments: &[Instrument]) -> Result<Vec<Instrument>>;
}

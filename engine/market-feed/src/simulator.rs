//! Periodic random-walk price simulator
//!
//! One tick: snapshot the store, apply a random bid/ask delta to each
//! instrument, write each moved quote through to the repository, commit the
//! successful ones to the store under a single write lock, then broadcast the
//! full instrument list. Failures are per instrument and never stop the tick.

use std::sync::Arc;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::broadcaster::QuoteBroadcaster;
use crate::config::FeedConfig;
use crate::instrument::PRICE_SCALE;
use crate::repository::InstrumentRepository;
use crate::store::PriceStore;

/// Source of per-tick price deltas
pub trait DeltaSource: Send {
    /// Next delta in `[-max_delta, +max_delta]`
    fn next_delta(&mut self, max_delta: Decimal) -> Decimal;
}

/// Uniform deltas quantised to the price scale
pub struct UniformDeltas {
    rng: StdRng,
}

impl UniformDeltas {
    /// Seeded from OS entropy
    pub fn from_entropy() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    /// Deterministic sequence for reproducible runs
    pub fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }
}

impl DeltaSource for UniformDeltas {
    fn next_delta(&mut self, max_delta: Decimal) -> Decimal {
        // Whole price steps, so a delta never carries digits the price cannot hold
        let steps = (max_delta * Decimal::from(10i64.pow(PRICE_SCALE))).trunc().to_i64().unwrap_or(0);
        if steps <= 0 {
            return Decimal::ZERO;
        }
        Decimal::new(self.rng.gen_range(-steps..=steps), PRICE_SCALE)
    }
}

/// Outcome of one simulator tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    pub tick: u64,
    pub updated: usize,
    pub skipped: usize,
    pub subscribers_reached: usize,
}

/// Drives quote updates and fan-out on a fixed period
pub struct PriceSimulator<D: DeltaSource = UniformDeltas> {
    config: FeedConfig,
    store: Arc<PriceStore>,
    broadcaster: Arc<QuoteBroadcaster>,
    repository: Option<Arc<dyn InstrumentRepository>>,
    deltas: D,
    tick: u64,
}

impl PriceSimulator<UniformDeltas> {
    /// Create a simulator drawing deltas from OS entropy
    pub fn new(
        config: FeedConfig,
        store: Arc<PriceStore>,
        broadcaster: Arc<QuoteBroadcaster>,
    ) -> Self {
        Self::with_deltas(config, store, broadcaster, UniformDeltas::from_entropy())
    }
}

impl<D: DeltaSource> PriceSimulator<D> {
    /// Create a simulator with an explicit delta source
    pub fn with_deltas(
        config: FeedConfig,
        store: Arc<PriceStore>,
        broadcaster: Arc<QuoteBroadcaster>,
        deltas: D,
    ) -> Self {
        Self { config, store, broadcaster, repository: None, deltas, tick: 0 }
    }

    /// Write committed quotes through to a repository
    pub fn with_repository(mut self, repository: Arc<dyn InstrumentRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Number of ticks executed so far
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Run a single tick
    pub async fn tick(&mut self) -> TickReport {
        self.tick += 1;
        let now = Utc::now();
        let mut report = TickReport { tick: self.tick, ..Default::default() };

        let mut updated = Vec::new();
        for mut instrument in self.store.snapshot().await {
            let bid_delta = self.deltas.next_delta(self.config.max_delta);
            let ask_delta = self.deltas.next_delta(self.config.max_delta);

            if let Err(e) = instrument.apply_tick(bid_delta, ask_delta, now) {
                warn!("Skipping {} on tick {}: {}", instrument.symbol, self.tick, e);
                report.skipped += 1;
                continue;
            }

            if let Some(repository) = &self.repository {
                if let Err(e) = repository.save_quote(&instrument).await {
                    warn!("Failed to persist {} on tick {}: {}", instrument.symbol, self.tick, e);
                    report.skipped += 1;
                    continue;
                }
            }

            updated.push(instrument);
        }

        let (replaced, snapshot) = self.store.commit(updated).await;
        report.updated = replaced;
        match self.broadcaster.broadcast(&snapshot).await {
            Ok(reached) => report.subscribers_reached = reached,
            Err(e) => error!("Failed to broadcast tick {}: {}", self.tick, e),
        }

        debug!(
            "Tick {}: {} updated, {} skipped, {} subscribers",
            report.tick, report.updated, report.skipped, report.subscribers_reached
        );
        report
    }

    /// Tick on the configured period until `shutdown` flips to true.
    ///
    /// Ticks run one after another in this task; a tick that overruns the
    /// period causes the missed ticks to be skipped, never stacked.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick of a tokio interval completes immediately
        interval.tick().await;

        info!("Price simulator started (period {:?})", self.config.tick_interval());

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Price simulator stopped after {} ticks", self.tick);
    }
}

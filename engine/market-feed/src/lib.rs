//! MarketFeed - simulated FX quotes and real-time snapshot distribution
//!
//! This crate owns the live quote state for every tracked currency pair,
//! perturbs it on a fixed period, and pushes the full instrument list to
//! every connected subscriber after each tick.

pub mod broadcaster;
pub mod config;
pub mod defaults;
pub mod error;
pub mod instrument;
pub mod repository;
pub mod simulator;
pub mod store;

pub use broadcaster::{
    FeedMessage, QuoteBroadcaster, SnapshotReceiver, SubscriberId, SNAPSHOT_MESSAGE_TYPE,
};
pub use config::FeedConfig;
pub use defaults::default_instruments;
pub use error::{FeedError, Result};
pub use instrument::{round_percent, round_price, Instrument};
pub use repository::InstrumentRepository;
pub use simulator::{DeltaSource, PriceSimulator, TickReport, UniformDeltas};
pub use store::PriceStore;

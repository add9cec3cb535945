//! Service state management and component initialization

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::ServiceConfig;
use account_service::{seed_reference_data, AccountService, MemoryStorage, PgStorage, Storage};
use api_gateway::{create_routes, ApiContext, TokenValidator};
use market_feed::{
    default_instruments, Instrument, InstrumentRepository, PriceSimulator, PriceStore,
    QuoteBroadcaster,
};

/// Service state containing all initialized components
pub struct ServiceState {
    /// Service configuration
    pub config: ServiceConfig,

    /// Live quotes shared by the simulator and the API
    pub prices: Arc<PriceStore>,

    /// Snapshot fan-out to WebSocket subscribers
    pub broadcaster: Arc<QuoteBroadcaster>,

    /// Account, tournament and funded-account operations
    pub accounts: AccountService,

    /// Quote write-through target; `None` when running on the in-memory store
    pub repository: Option<Arc<dyn InstrumentRepository>>,

    shutdown_tx: watch::Sender<bool>,
}

impl ServiceState {
    /// Create a new service state with all components initialized
    pub async fn new(config: ServiceConfig) -> Result<Self> {
        info!("Initializing service components...");

        let (storage, repository): (Arc<dyn Storage>, Option<Arc<dyn InstrumentRepository>>) =
            if config.database.url.is_some() {
                info!("Connecting to Postgres...");
                let pg = Arc::new(
                    PgStorage::connect(&config.database)
                        .await
                        .context("Failed to connect to database")?,
                );
                let storage: Arc<dyn Storage> = pg.clone();
                let repository: Arc<dyn InstrumentRepository> = pg;
                (storage, Some(repository))
            } else {
                warn!("DATABASE_URL is not set; records are kept in memory and lost on exit");
                (Arc::new(MemoryStorage::new()), None)
            };

        let instruments = load_instruments(repository.as_deref(), config.feed.seed_defaults)
            .await
            .context("Failed to load currency pairs")?;
        info!("Loaded {} currency pairs", instruments.len());

        let prices = Arc::new(PriceStore::with_instruments(instruments));
        let accounts = AccountService::new(storage, prices.clone());

        if config.service.seed_reference_data {
            seed_reference_data(accounts.storage().as_ref())
                .await
                .context("Failed to seed reference data")?;
        }

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            prices,
            broadcaster: Arc::new(QuoteBroadcaster::new()),
            accounts,
            repository,
            shutdown_tx,
        })
    }

    /// Spawn the price simulator; it exits once shutdown is requested
    pub fn start_simulator(&self) -> JoinHandle<()> {
        info!("Starting PriceSimulator...");

        let mut simulator = PriceSimulator::new(
            self.config.feed.clone(),
            self.prices.clone(),
            self.broadcaster.clone(),
        );
        if let Some(repository) = &self.repository {
            simulator = simulator.with_repository(repository.clone());
        }

        tokio::spawn(simulator.run(self.shutdown_signal()))
    }

    /// Bind the HTTP server and spawn it; it drains and exits once shutdown is requested
    pub fn start_gateway(&self) -> Result<(SocketAddr, JoinHandle<()>)> {
        let addr = self.config.gateway.server_addr()?;
        let ctx = ApiContext {
            accounts: self.accounts.clone(),
            broadcaster: self.broadcaster.clone(),
            validator: Arc::new(TokenValidator::new(&self.config.gateway.auth)),
            max_body_bytes: self.config.gateway.server.max_body_bytes,
        };

        let mut shutdown = self.shutdown_signal();
        let (bound, server) = warp::serve(create_routes(ctx))
            .try_bind_with_graceful_shutdown(addr, async move {
                while !*shutdown.borrow_and_update() {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                }
            })
            .with_context(|| format!("Failed to bind {}", addr))?;

        info!("ApiGateway listening on {}", bound);
        Ok((bound, tokio::spawn(server)))
    }

    /// A receiver that observes `true` once shutdown is requested
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Ask every running component to stop
    pub fn request_shutdown(&self) {
        if !self.shutdown_tx.send_replace(true) {
            info!("Shutdown requested");
        }
    }

    pub fn shutdown_requested(&self) -> bool {
        *self.shutdown_tx.borrow()
    }
}

async fn load_instruments(
    repository: Option<&dyn InstrumentRepository>,
    seed_defaults: bool,
) -> Result<Vec<Instrument>> {
    let Some(repository) = repository else {
        return Ok(if seed_defaults { default_instruments() } else { Vec::new() });
    };

    let stored = repository.load_instruments().await?;
    if !stored.is_empty() || !seed_defaults {
        return Ok(stored);
    }

    info!("No currency pairs stored; seeding defaults");
    match repository.seed_instruments(&default_instruments()).await {
        Ok(seeded) => Ok(seeded),
        Err(e) => {
            error!("Failed to seed currency pairs: {}", e);
            Err(e.into())
        }
    }
}

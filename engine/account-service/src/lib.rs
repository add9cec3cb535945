//! AccountService - users, tournaments, positions and funded accounts
//!
//! This crate owns every persisted record of Forex Arena other than live
//! quotes: user profiles, subscription plans, tournaments and their
//! leaderboards, trading positions, and funded accounts with their
//! performance history. Records live behind the [`Storage`] trait with a
//! Postgres implementation for deployments and an in-memory one for
//! development and tests.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod funded;
pub mod leaderboard;
pub mod memory;
pub mod models;
pub mod positions;
pub mod postgres;
pub mod seed;
pub mod service;
pub mod storage;

pub use config::DatabaseConfig;
pub use dashboard::{build_dashboard, DashboardSnapshot};
pub use error::{AccountServiceError, ErrorKind, Result};
pub use funded::{CreateFundedAccountRequest, PerformanceSample};
pub use leaderboard::{rank_funded_traders, rank_participants, RankedEntry};
pub use memory::MemoryStorage;
pub use positions::{ClosePositionRequest, OpenPositionRequest};
pub use postgres::PgStorage;
pub use seed::seed_reference_data;
pub use service::AccountService;
pub use storage::Storage;

// Re-export commonly used types
pub use models::{
    AccountPerformance, FundedAccount, FundedAccountStatus, FundedTrader, PositionStatus,
    PositionType, Tournament, TournamentParticipant, TradingPlan, TradingPosition, UpsertUser,
    User,
};

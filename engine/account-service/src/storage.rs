//! Persistence seam for every record the service owns

use async_trait::async_trait;

use crate::error::Result;
use crate::funded::PerformanceSample;
use crate::models::{
    AccountPerformance, FundedAccount, FundedTrader, NewFundedAccount, NewParticipant,
    NewPosition, NewTournament, NewTradingPlan, PerformanceUpdate, Tournament,
    TournamentParticipant, TradingPlan, TradingPosition, UpsertUser, User,
};
use rust_decimal::Decimal;

/// Record store used by the service layer.
///
/// Lookups return `Ok(None)` for missing rows; the service decides whether
/// absence is an error. List operations define their own ordering and every
/// implementation must honour it, since ranking ties resolve by input order.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>>;

    /// Insert the user, or refresh their profile fields if they exist
    async fn upsert_user(&self, user: UpsertUser) -> Result<User>;

    async fn get_trading_plans(&self) -> Result<Vec<TradingPlan>>;

    async fn create_trading_plan(&self, plan: NewTradingPlan) -> Result<TradingPlan>;

    /// Newest first
    async fn get_tournaments(&self) -> Result<Vec<Tournament>>;

    async fn get_tournament(&self, tournament_id: i32) -> Result<Option<Tournament>>;

    /// Most recently created tournament with `is_active` set
    async fn get_active_tournament(&self) -> Result<Option<Tournament>>;

    async fn create_tournament(&self, tournament: NewTournament) -> Result<Tournament>;

    /// Ascending id order
    async fn get_tournament_participants(&self, tournament_id: i32) -> Result<Vec<TournamentParticipant>>;

    async fn get_participant(
        &self,
        tournament_id: i32,
        user_id: &str,
    ) -> Result<Option<TournamentParticipant>>;

    async fn join_tournament(&self, participant: NewParticipant) -> Result<TournamentParticipant>;

    /// Newest first
    async fn get_user_positions(&self, user_id: &str) -> Result<Vec<TradingPosition>>;

    async fn get_position(&self, position_id: i32) -> Result<Option<TradingPosition>>;

    async fn create_position(&self, position: NewPosition) -> Result<TradingPosition>;

    /// Mark an open position closed. Returns `None` when the position does
    /// not exist or is already closed.
    async fn close_position(
        &self,
        position_id: i32,
        close_price: Decimal,
        realized_pnl: Decimal,
    ) -> Result<Option<TradingPosition>>;

    /// Ascending id order
    async fn get_user_funded_accounts(&self, user_id: &str) -> Result<Vec<FundedAccount>>;

    async fn get_funded_account(&self, account_id: i32) -> Result<Option<FundedAccount>>;

    async fn create_funded_account(&self, account: NewFundedAccount) -> Result<FundedAccount>;

    /// Newest first
    async fn get_funded_account_performance(&self, account_id: i32) -> Result<Vec<AccountPerformance>>;

    /// Roll a sample into the account and append its history row as one
    /// atomic step. Concurrent samples for the same account are serialised.
    /// Returns `None` when the account does not exist.
    async fn apply_performance_sample(
        &self,
        account_id: i32,
        sample: &PerformanceSample,
    ) -> Result<Option<PerformanceUpdate>>;

    /// Active funded accounts joined with their owner, ascending account id
    async fn get_active_funded_traders(&self) -> Result<Vec<FundedTrader>>;
}

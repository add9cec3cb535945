//! AccountService: the operations behind every authenticated and public
//! read/write route

use market_feed::PriceStore;
use std::sync::Arc;
use tracing::{debug, info};

use crate::dashboard::{build_dashboard, DashboardSnapshot};
use crate::error::{AccountServiceError, Result};
use crate::funded::{CreateFundedAccountRequest, PerformanceSample};
use crate::leaderboard::{rank_funded_traders, rank_participants, RankedEntry};
use crate::models::{
    AccountPerformance, FundedAccount, FundedTrader, NewParticipant, PerformanceUpdate,
    PositionStatus, Tournament, TournamentParticipant, TradingPlan, TradingPosition, UpsertUser,
    User,
};
use crate::positions::{realized_pnl, ClosePositionRequest, OpenPositionRequest};
use crate::storage::Storage;

#[derive(Clone)]
pub struct AccountService {
    storage: Arc<dyn Storage>,
    prices: Arc<PriceStore>,
}

impl AccountService {
    pub fn new(storage: Arc<dyn Storage>, prices: Arc<PriceStore>) -> Self {
        Self { storage, prices }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn prices(&self) -> &Arc<PriceStore> {
        &self.prices
    }

    /// Create or refresh the caller's user record from identity claims
    pub async fn login(&self, profile: UpsertUser) -> Result<User> {
        let user = self.storage.upsert_user(profile).await?;
        info!("User {} logged in", user.id);
        Ok(user)
    }

    pub async fn current_user(&self, user_id: &str) -> Result<User> {
        self.storage
            .get_user(user_id)
            .await?
            .ok_or_else(|| AccountServiceError::UserNotFound { user_id: user_id.to_string() })
    }

    pub async fn trading_plans(&self) -> Result<Vec<TradingPlan>> {
        self.storage.get_trading_plans().await
    }

    pub async fn tournaments(&self) -> Result<Vec<Tournament>> {
        self.storage.get_tournaments().await
    }

    /// Participants of a tournament with derived rank and profit
    pub async fn tournament_leaderboard(
        &self,
        tournament_id: i32,
    ) -> Result<Vec<RankedEntry<TournamentParticipant>>> {
        if self.storage.get_tournament(tournament_id).await?.is_none() {
            return Err(AccountServiceError::TournamentNotFound { tournament_id });
        }
        let participants = self.storage.get_tournament_participants(tournament_id).await?;
        Ok(rank_participants(participants))
    }

    /// Join the active tournament, which must be the one named by `tournament_id`
    pub async fn join_tournament(&self, user_id: &str, tournament_id: i32) -> Result<TournamentParticipant> {
        self.current_user(user_id).await?;

        let tournament = self
            .storage
            .get_active_tournament()
            .await?
            .filter(|t| t.id == tournament_id)
            .ok_or(AccountServiceError::TournamentNotFound { tournament_id })?;

        if self.storage.get_participant(tournament.id, user_id).await?.is_some() {
            return Err(AccountServiceError::validation("already joined this tournament"));
        }

        let participant = self
            .storage
            .join_tournament(NewParticipant {
                tournament_id: tournament.id,
                user_id: user_id.to_string(),
                initial_balance: tournament.initial_balance,
            })
            .await?;
        info!("User {} joined tournament {}", user_id, tournament.id);
        Ok(participant)
    }

    pub async fn dashboard(&self, user_id: &str) -> Result<DashboardSnapshot> {
        build_dashboard(self.storage.as_ref(), &self.prices, user_id).await
    }

    pub async fn positions(&self, user_id: &str) -> Result<Vec<TradingPosition>> {
        self.storage.get_user_positions(user_id).await
    }

    pub async fn open_position(&self, user_id: &str, request: OpenPositionRequest) -> Result<TradingPosition> {
        let new_position = request.validate(user_id)?;
        if self.prices.get(new_position.currency_pair_id).await.is_none() {
            return Err(AccountServiceError::CurrencyPairNotFound {
                currency_pair_id: new_position.currency_pair_id,
            });
        }
        self.current_user(user_id).await?;

        let position = self.storage.create_position(new_position).await?;
        debug!(
            "Opened position {} for {}: {} {} @ {}",
            position.id,
            user_id,
            position.position_type.as_str(),
            position.amount,
            position.open_price
        );
        Ok(position)
    }

    /// Close one of the caller's open positions, realising its profit or loss
    pub async fn close_position(
        &self,
        user_id: &str,
        position_id: i32,
        request: ClosePositionRequest,
    ) -> Result<TradingPosition> {
        let close_price = request.validate()?;

        let position = self
            .storage
            .get_position(position_id)
            .await?
            .filter(|p| p.user_id == user_id)
            .ok_or(AccountServiceError::PositionNotFound { position_id })?;

        if position.status != PositionStatus::Open {
            return Err(AccountServiceError::validation("position is already closed"));
        }

        let pnl = realized_pnl(&position, close_price);
        let closed = self
            .storage
            .close_position(position_id, close_price, pnl)
            .await?
            .ok_or_else(|| AccountServiceError::validation("position is already closed"))?;

        debug!("Closed position {} for {} with pnl {}", closed.id, user_id, closed.current_pnl);
        Ok(closed)
    }

    pub async fn funded_accounts(&self, user_id: &str) -> Result<Vec<FundedAccount>> {
        self.storage.get_user_funded_accounts(user_id).await
    }

    pub async fn create_funded_account(
        &self,
        user_id: &str,
        request: CreateFundedAccountRequest,
    ) -> Result<FundedAccount> {
        let new_account = request.validate(user_id)?;
        self.current_user(user_id).await?;

        let account = self.storage.create_funded_account(new_account).await?;
        info!("Created funded account {} for {}", account.id, user_id);
        Ok(account)
    }

    async fn owned_funded_account(&self, user_id: &str, account_id: i32) -> Result<FundedAccount> {
        self.storage
            .get_funded_account(account_id)
            .await?
            .filter(|a| a.user_id == user_id)
            .ok_or(AccountServiceError::FundedAccountNotFound { account_id })
    }

    pub async fn funded_account_performance(
        &self,
        user_id: &str,
        account_id: i32,
    ) -> Result<Vec<AccountPerformance>> {
        self.owned_funded_account(user_id, account_id).await?;
        self.storage.get_funded_account_performance(account_id).await
    }

    /// Store a performance sample and roll it into the account's live state.
    ///
    /// The account update and the history row are written together or not
    /// at all.
    pub async fn record_performance(
        &self,
        user_id: &str,
        account_id: i32,
        sample: PerformanceSample,
    ) -> Result<AccountPerformance> {
        sample.validate()?;
        let previous_status = self.owned_funded_account(user_id, account_id).await?.status;

        let PerformanceUpdate { account, record } = self
            .storage
            .apply_performance_sample(account_id, &sample)
            .await?
            .ok_or(AccountServiceError::FundedAccountNotFound { account_id })?;

        if account.status != previous_status {
            info!("Funded account {} is now {}", account.id, account.status);
        }
        Ok(record)
    }

    /// Top active funded traders by absolute profit
    pub async fn funded_trader_leaderboard(&self) -> Result<Vec<RankedEntry<FundedTrader>>> {
        let traders = self.storage.get_active_funded_traders().await?;
        Ok(rank_funded_traders(traders))
    }
}

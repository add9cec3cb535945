//! In-process storage used in development mode and by tests

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::error::{AccountServiceError, Result};
use crate::funded::{apply_sample, performance_record, PerformanceSample};
use crate::models::{
    AccountPerformance, FundedAccount, FundedAccountStatus, FundedTrader, NewFundedAccount,
    NewParticipant, NewPosition, NewTournament, NewTradingPlan, PerformanceUpdate,
    PositionStatus, Tournament, TournamentParticipant, TradingPlan, TradingPosition, UpsertUser,
    User,
};
use crate::storage::Storage;

#[derive(Default)]
struct Tables {
    users: BTreeMap<String, User>,
    plans: BTreeMap<i32, TradingPlan>,
    tournaments: BTreeMap<i32, Tournament>,
    participants: BTreeMap<i32, TournamentParticipant>,
    positions: BTreeMap<i32, TradingPosition>,
    funded_accounts: BTreeMap<i32, FundedAccount>,
    performance: BTreeMap<i32, AccountPerformance>,
    last_id: i32,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }
}

/// `Storage` backed by ordered maps behind a single lock.
///
/// Ids come from one shared counter, so they are unique across tables and
/// grow with insertion order the same way serial columns do.
#[derive(Default)]
pub struct MemoryStorage {
    tables: RwLock<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(user_id).cloned())
    }

    async fn upsert_user(&self, user: UpsertUser) -> Result<User> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let record = match tables.users.get(&user.id) {
            Some(existing) => User {
                email: user.email,
                first_name: user.first_name,
                last_name: user.last_name,
                profile_image_url: user.profile_image_url,
                updated_at: now,
                ..existing.clone()
            },
            None => User {
                id: user.id.clone(),
                email: user.email,
                first_name: user.first_name,
                last_name: user.last_name,
                profile_image_url: user.profile_image_url,
                role: "user".to_string(),
                subscription_plan_id: None,
                created_at: now,
                updated_at: now,
            },
        };
        tables.users.insert(user.id, record.clone());
        Ok(record)
    }

    async fn get_trading_plans(&self) -> Result<Vec<TradingPlan>> {
        Ok(self.tables.read().await.plans.values().cloned().collect())
    }

    async fn create_trading_plan(&self, plan: NewTradingPlan) -> Result<TradingPlan> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let record = TradingPlan {
            id,
            name: plan.name,
            price: plan.price,
            max_positions: plan.max_positions,
            features: plan.features,
            is_popular: plan.is_popular,
        };
        tables.plans.insert(id, record.clone());
        Ok(record)
    }

    async fn get_tournaments(&self) -> Result<Vec<Tournament>> {
        Ok(self.tables.read().await.tournaments.values().rev().cloned().collect())
    }

    async fn get_tournament(&self, tournament_id: i32) -> Result<Option<Tournament>> {
        Ok(self.tables.read().await.tournaments.get(&tournament_id).cloned())
    }

    async fn get_active_tournament(&self) -> Result<Option<Tournament>> {
        let tables = self.tables.read().await;
        Ok(tables.tournaments.values().rev().find(|t| t.is_active).cloned())
    }

    async fn create_tournament(&self, tournament: NewTournament) -> Result<Tournament> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let record = Tournament {
            id,
            name: tournament.name,
            description: tournament.description,
            start_date: tournament.start_date,
            end_date: tournament.end_date,
            initial_balance: tournament.initial_balance,
            is_active: tournament.is_active,
            created_at: Utc::now(),
        };
        tables.tournaments.insert(id, record.clone());
        Ok(record)
    }

    async fn get_tournament_participants(&self, tournament_id: i32) -> Result<Vec<TournamentParticipant>> {
        let tables = self.tables.read().await;
        Ok(tables
            .participants
            .values()
            .filter(|p| p.tournament_id == tournament_id)
            .cloned()
            .collect())
    }

    async fn get_participant(
        &self,
        tournament_id: i32,
        user_id: &str,
    ) -> Result<Option<TournamentParticipant>> {
        let tables = self.tables.read().await;
        Ok(tables
            .participants
            .values()
            .find(|p| p.tournament_id == tournament_id && p.user_id == user_id)
            .cloned())
    }

    async fn join_tournament(&self, participant: NewParticipant) -> Result<TournamentParticipant> {
        let mut tables = self.tables.write().await;
        let duplicate = tables
            .participants
            .values()
            .any(|p| p.tournament_id == participant.tournament_id && p.user_id == participant.user_id);
        if duplicate {
            return Err(AccountServiceError::validation("already joined this tournament"));
        }

        let id = tables.next_id();
        let record = TournamentParticipant {
            id,
            tournament_id: participant.tournament_id,
            user_id: participant.user_id,
            initial_balance: participant.initial_balance,
            current_balance: participant.initial_balance,
            total_pnl: Decimal::ZERO,
            joined_at: Utc::now(),
        };
        tables.participants.insert(id, record.clone());
        Ok(record)
    }

    async fn get_user_positions(&self, user_id: &str) -> Result<Vec<TradingPosition>> {
        let tables = self.tables.read().await;
        Ok(tables
            .positions
            .values()
            .rev()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_position(&self, position_id: i32) -> Result<Option<TradingPosition>> {
        Ok(self.tables.read().await.positions.get(&position_id).cloned())
    }

    async fn create_position(&self, position: NewPosition) -> Result<TradingPosition> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let record = TradingPosition {
            id,
            user_id: position.user_id,
            currency_pair_id: position.currency_pair_id,
            position_type: position.position_type,
            amount: position.amount,
            open_price: position.open_price,
            close_price: None,
            current_pnl: Decimal::ZERO,
            status: PositionStatus::Open,
            opened_at: Utc::now(),
            closed_at: None,
        };
        tables.positions.insert(id, record.clone());
        Ok(record)
    }

    async fn close_position(
        &self,
        position_id: i32,
        close_price: Decimal,
        realized_pnl: Decimal,
    ) -> Result<Option<TradingPosition>> {
        let mut tables = self.tables.write().await;
        let Some(position) = tables.positions.get_mut(&position_id) else {
            return Ok(None);
        };
        if position.status != PositionStatus::Open {
            return Ok(None);
        }

        position.status = PositionStatus::Closed;
        position.close_price = Some(close_price);
        position.current_pnl = realized_pnl;
        position.closed_at = Some(Utc::now());
        Ok(Some(position.clone()))
    }

    async fn get_user_funded_accounts(&self, user_id: &str) -> Result<Vec<FundedAccount>> {
        let tables = self.tables.read().await;
        Ok(tables
            .funded_accounts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_funded_account(&self, account_id: i32) -> Result<Option<FundedAccount>> {
        Ok(self.tables.read().await.funded_accounts.get(&account_id).cloned())
    }

    async fn create_funded_account(&self, account: NewFundedAccount) -> Result<FundedAccount> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let now = Utc::now();
        let record = FundedAccount {
            id,
            user_id: account.user_id,
            account_type: account.account_type,
            initial_balance: account.initial_balance,
            current_balance: account.initial_balance,
            equity: account.initial_balance,
            max_drawdown: account.max_drawdown,
            current_drawdown: Decimal::ZERO,
            profit_target: account.profit_target,
            status: FundedAccountStatus::Active,
            created_at: now,
            updated_at: now,
        };
        tables.funded_accounts.insert(id, record.clone());
        Ok(record)
    }

    async fn get_funded_account_performance(&self, account_id: i32) -> Result<Vec<AccountPerformance>> {
        let tables = self.tables.read().await;
        Ok(tables
            .performance
            .values()
            .rev()
            .filter(|p| p.funded_account_id == account_id)
            .cloned()
            .collect())
    }

    async fn apply_performance_sample(
        &self,
        account_id: i32,
        sample: &PerformanceSample,
    ) -> Result<Option<PerformanceUpdate>> {
        let mut tables = self.tables.write().await;
        let Some(mut account) = tables.funded_accounts.get(&account_id).cloned() else {
            return Ok(None);
        };

        apply_sample(&mut account, sample);
        account.updated_at = Utc::now();
        let new_record = performance_record(&account, sample.trades_count);

        let id = tables.next_id();
        let record = AccountPerformance {
            id,
            funded_account_id: account_id,
            recorded_at: account.updated_at,
            balance: new_record.balance,
            equity: new_record.equity,
            drawdown: new_record.drawdown,
            profit: new_record.profit,
            trades_count: new_record.trades_count,
        };
        tables.performance.insert(id, record.clone());
        tables.funded_accounts.insert(account_id, account.clone());

        Ok(Some(PerformanceUpdate { account, record }))
    }

    async fn get_active_funded_traders(&self) -> Result<Vec<FundedTrader>> {
        let tables = self.tables.read().await;
        Ok(tables
            .funded_accounts
            .values()
            .filter(|a| a.status == FundedAccountStatus::Active)
            .filter_map(|account| {
                tables.users.get(&account.user_id).map(|user| FundedTrader {
                    account: account.clone(),
                    user: user.clone(),
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PositionType;
    use chrono::Duration;

    fn login(id: &str) -> UpsertUser {
        UpsertUser {
            id: id.to_string(),
            email: Some(format!("{}@example.com", id)),
            ..Default::default()
        }
    }

    fn tournament(name: &str, is_active: bool) -> NewTournament {
        let now = Utc::now();
        NewTournament {
            name: name.to_string(),
            description: None,
            start_date: now,
            end_date: now + Duration::days(30),
            initial_balance: Decimal::new(10000, 0),
            is_active,
        }
    }

    #[tokio::test]
    async fn test_upsert_user_keeps_created_at() {
        let storage = MemoryStorage::new();
        let first = storage.upsert_user(login("u1")).await.unwrap();

        let mut update = login("u1");
        update.first_name = Some("Ada".to_string());
        let second = storage.upsert_user(update).await.unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.first_name.as_deref(), Some("Ada"));
        assert_eq!(second.role, "user");
    }

    #[tokio::test]
    async fn test_active_tournament_is_newest_active() {
        let storage = MemoryStorage::new();
        storage.create_tournament(tournament("old", true)).await.unwrap();
        let newer = storage.create_tournament(tournament("new", true)).await.unwrap();
        storage.create_tournament(tournament("draft", false)).await.unwrap();

        let active = storage.get_active_tournament().await.unwrap().unwrap();
        assert_eq!(active.id, newer.id);

        let listed = storage.get_tournaments().await.unwrap();
        assert_eq!(listed.first().map(|t| t.name.as_str()), Some("draft"));
    }

    #[tokio::test]
    async fn test_join_rejects_duplicates() {
        let storage = MemoryStorage::new();
        let t = storage.create_tournament(tournament("cup", true)).await.unwrap();
        let entry = NewParticipant {
            tournament_id: t.id,
            user_id: "u1".to_string(),
            initial_balance: t.initial_balance,
        };

        let joined = storage.join_tournament(entry.clone()).await.unwrap();
        assert_eq!(joined.current_balance, t.initial_balance);
        assert_eq!(joined.total_pnl, Decimal::ZERO);

        let err = storage.join_tournament(entry).await.unwrap_err();
        assert!(matches!(err, AccountServiceError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_positions_newest_first_and_close_once() {
        let storage = MemoryStorage::new();
        let mut ids = Vec::new();
        for _ in 0..3 {
            let position = storage
                .create_position(NewPosition {
                    user_id: "u1".to_string(),
                    currency_pair_id: 1,
                    position_type: PositionType::Buy,
                    amount: Decimal::new(1000, 0),
                    open_price: Decimal::new(108450, 5),
                })
                .await
                .unwrap();
            ids.push(position.id);
        }

        let listed: Vec<i32> = storage
            .get_user_positions("u1")
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        ids.reverse();
        assert_eq!(listed, ids);

        let closed = storage
            .close_position(ids[0], Decimal::new(108500, 5), Decimal::new(50, 2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(closed.status, PositionStatus::Closed);
        assert!(closed.closed_at.is_some());

        let again = storage
            .close_position(ids[0], Decimal::new(108500, 5), Decimal::ZERO)
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_active_funded_traders_skip_inactive() {
        let storage = MemoryStorage::new();
        storage.upsert_user(login("u1")).await.unwrap();
        storage.upsert_user(login("u2")).await.unwrap();

        let new_account = |user: &str| NewFundedAccount {
            user_id: user.to_string(),
            account_type: "challenge".to_string(),
            initial_balance: Decimal::new(50000, 0),
            max_drawdown: Decimal::new(10, 0),
            profit_target: None,
        };
        storage.create_funded_account(new_account("u1")).await.unwrap();
        let failed = storage.create_funded_account(new_account("u2")).await.unwrap();
        let breach = PerformanceSample {
            balance: Decimal::new(40000, 0),
            equity: Decimal::new(40000, 0),
            trades_count: 2,
        };
        let update = storage.apply_performance_sample(failed.id, &breach).await.unwrap().unwrap();
        assert_eq!(update.account.status, FundedAccountStatus::Failed);

        let traders = storage.get_active_funded_traders().await.unwrap();
        assert_eq!(traders.len(), 1);
        assert_eq!(traders[0].user.id, "u1");
    }

    #[tokio::test]
    async fn test_performance_sample_writes_account_and_history_together() {
        let storage = MemoryStorage::new();
        storage.upsert_user(login("u1")).await.unwrap();
        let account = storage
            .create_funded_account(NewFundedAccount {
                user_id: "u1".to_string(),
                account_type: "challenge".to_string(),
                initial_balance: Decimal::new(10000, 0),
                max_drawdown: Decimal::new(10, 0),
                profit_target: None,
            })
            .await
            .unwrap();

        let sample = |equity: i64| PerformanceSample {
            balance: Decimal::new(equity, 0),
            equity: Decimal::new(equity, 0),
            trades_count: 1,
        };
        let sample_a = sample(9800);
        let sample_b = sample(9700);
        let (first, second) = tokio::join!(
            storage.apply_performance_sample(account.id, &sample_a),
            storage.apply_performance_sample(account.id, &sample_b),
        );
        first.unwrap().unwrap();
        second.unwrap().unwrap();

        let history = storage.get_funded_account_performance(account.id).await.unwrap();
        assert_eq!(history.len(), 2);
        let stored = storage.get_funded_account(account.id).await.unwrap().unwrap();
        assert_eq!(stored.current_balance, history[0].balance);

        let missing = storage.apply_performance_sample(account.id + 100, &sample(1)).await.unwrap();
        assert!(missing.is_none());
    }
}

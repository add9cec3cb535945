//! Postgres-backed storage

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use market_feed::{FeedError, Instrument, InstrumentRepository};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::collections::HashMap;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::{AccountServiceError, Result};
use crate::funded::{apply_sample, performance_record, PerformanceSample};
use crate::models::{
    AccountPerformance, FundedAccount, FundedAccountStatus, FundedTrader, NewFundedAccount,
    NewParticipant, NewPosition, NewTournament, NewTradingPlan, PerformanceUpdate,
    PositionStatus, Tournament, TournamentParticipant, TradingPlan, TradingPosition, UpsertUser,
    User,
};
use crate::storage::Storage;

const USER_COLUMNS: &str = "id, email, first_name, last_name, profile_image_url, role, \
     subscription_plan_id, created_at, updated_at";
const PARTICIPANT_COLUMNS: &str = "id, tournament_id, user_id, initial_balance, current_balance, \
     total_pnl, joined_at";
const POSITION_COLUMNS: &str = "id, user_id, currency_pair_id, type, amount, open_price, \
     close_price, current_pnl, status, opened_at, closed_at";
const FUNDED_COLUMNS: &str = "id, user_id, account_type, initial_balance, current_balance, equity, \
     max_drawdown, current_drawdown, profit_target, status, created_at, updated_at";

/// `Storage` over a Postgres connection pool
#[derive(Debug, Clone)]
pub struct PgStorage {
    db_pool: PgPool,
}

impl PgStorage {
    /// Connect to the configured database and apply pending migrations
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let url = config.url.as_deref().ok_or_else(|| AccountServiceError::InvalidConfig {
            message: "database url is not set".to_string(),
        })?;

        let db_pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(url)
            .await?;

        if config.run_migrations {
            sqlx::migrate!("./migrations").run(&db_pool).await?;
            info!("Database migrations applied");
        }

        Ok(Self { db_pool })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl Storage for PgStorage {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql).bind(user_id).fetch_optional(&self.db_pool).await?)
    }

    async fn upsert_user(&self, user: UpsertUser) -> Result<User> {
        let sql = format!(
            "INSERT INTO users (id, email, first_name, last_name, profile_image_url) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO UPDATE SET \
                 email = EXCLUDED.email, \
                 first_name = EXCLUDED.first_name, \
                 last_name = EXCLUDED.last_name, \
                 profile_image_url = EXCLUDED.profile_image_url, \
                 updated_at = NOW() \
             RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(&user.id)
            .bind(&user.email)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.profile_image_url)
            .fetch_one(&self.db_pool)
            .await?)
    }

    async fn get_trading_plans(&self) -> Result<Vec<TradingPlan>> {
        Ok(sqlx::query_as::<_, TradingPlan>(
            "SELECT id, name, price, max_positions, features, is_popular FROM trading_plans ORDER BY id",
        )
        .fetch_all(&self.db_pool)
        .await?)
    }

    async fn create_trading_plan(&self, plan: NewTradingPlan) -> Result<TradingPlan> {
        Ok(sqlx::query_as::<_, TradingPlan>(
            "INSERT INTO trading_plans (name, price, max_positions, features, is_popular) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, name, price, max_positions, features, is_popular",
        )
        .bind(&plan.name)
        .bind(plan.price)
        .bind(plan.max_positions)
        .bind(&plan.features)
        .bind(plan.is_popular)
        .fetch_one(&self.db_pool)
        .await?)
    }

    async fn get_tournaments(&self) -> Result<Vec<Tournament>> {
        Ok(sqlx::query_as::<_, Tournament>(
            "SELECT * FROM tournaments ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.db_pool)
        .await?)
    }

    async fn get_tournament(&self, tournament_id: i32) -> Result<Option<Tournament>> {
        Ok(sqlx::query_as::<_, Tournament>("SELECT * FROM tournaments WHERE id = $1")
            .bind(tournament_id)
            .fetch_optional(&self.db_pool)
            .await?)
    }

    async fn get_active_tournament(&self) -> Result<Option<Tournament>> {
        Ok(sqlx::query_as::<_, Tournament>(
            "SELECT * FROM tournaments WHERE is_active = TRUE ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .fetch_optional(&self.db_pool)
        .await?)
    }

    async fn create_tournament(&self, tournament: NewTournament) -> Result<Tournament> {
        Ok(sqlx::query_as::<_, Tournament>(
            "INSERT INTO tournaments (name, description, start_date, end_date, initial_balance, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(&tournament.name)
        .bind(&tournament.description)
        .bind(tournament.start_date)
        .bind(tournament.end_date)
        .bind(tournament.initial_balance)
        .bind(tournament.is_active)
        .fetch_one(&self.db_pool)
        .await?)
    }

    async fn get_tournament_participants(&self, tournament_id: i32) -> Result<Vec<TournamentParticipant>> {
        let sql = format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM tournament_participants WHERE tournament_id = $1 ORDER BY id"
        );
        Ok(sqlx::query_as::<_, TournamentParticipant>(&sql)
            .bind(tournament_id)
            .fetch_all(&self.db_pool)
            .await?)
    }

    async fn get_participant(
        &self,
        tournament_id: i32,
        user_id: &str,
    ) -> Result<Option<TournamentParticipant>> {
        let sql = format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM tournament_participants \
             WHERE tournament_id = $1 AND user_id = $2"
        );
        Ok(sqlx::query_as::<_, TournamentParticipant>(&sql)
            .bind(tournament_id)
            .bind(user_id)
            .fetch_optional(&self.db_pool)
            .await?)
    }

    async fn join_tournament(&self, participant: NewParticipant) -> Result<TournamentParticipant> {
        let sql = format!(
            "INSERT INTO tournament_participants (tournament_id, user_id, initial_balance, current_balance, total_pnl) \
             VALUES ($1, $2, $3, $3, 0) RETURNING {PARTICIPANT_COLUMNS}"
        );
        sqlx::query_as::<_, TournamentParticipant>(&sql)
            .bind(participant.tournament_id)
            .bind(&participant.user_id)
            .bind(participant.initial_balance)
            .fetch_one(&self.db_pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AccountServiceError::validation("already joined this tournament")
                } else {
                    e.into()
                }
            })
    }

    async fn get_user_positions(&self, user_id: &str) -> Result<Vec<TradingPosition>> {
        let sql = format!(
            "SELECT {POSITION_COLUMNS} FROM trading_positions WHERE user_id = $1 \
             ORDER BY opened_at DESC, id DESC"
        );
        Ok(sqlx::query_as::<_, TradingPosition>(&sql)
            .bind(user_id)
            .fetch_all(&self.db_pool)
            .await?)
    }

    async fn get_position(&self, position_id: i32) -> Result<Option<TradingPosition>> {
        let sql = format!("SELECT {POSITION_COLUMNS} FROM trading_positions WHERE id = $1");
        Ok(sqlx::query_as::<_, TradingPosition>(&sql)
            .bind(position_id)
            .fetch_optional(&self.db_pool)
            .await?)
    }

    async fn create_position(&self, position: NewPosition) -> Result<TradingPosition> {
        let sql = format!(
            "INSERT INTO trading_positions (user_id, currency_pair_id, type, amount, open_price, status) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {POSITION_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, TradingPosition>(&sql)
            .bind(&position.user_id)
            .bind(position.currency_pair_id)
            .bind(position.position_type.as_str())
            .bind(position.amount)
            .bind(position.open_price)
            .bind(PositionStatus::Open.as_str())
            .fetch_one(&self.db_pool)
            .await?)
    }

    async fn close_position(
        &self,
        position_id: i32,
        close_price: Decimal,
        realized_pnl: Decimal,
    ) -> Result<Option<TradingPosition>> {
        let sql = format!(
            "UPDATE trading_positions \
             SET status = $2, close_price = $3, current_pnl = $4, closed_at = NOW() \
             WHERE id = $1 AND status = $5 RETURNING {POSITION_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, TradingPosition>(&sql)
            .bind(position_id)
            .bind(PositionStatus::Closed.as_str())
            .bind(close_price)
            .bind(realized_pnl)
            .bind(PositionStatus::Open.as_str())
            .fetch_optional(&self.db_pool)
            .await?)
    }

    async fn get_user_funded_accounts(&self, user_id: &str) -> Result<Vec<FundedAccount>> {
        let sql = format!("SELECT {FUNDED_COLUMNS} FROM funded_accounts WHERE user_id = $1 ORDER BY id");
        Ok(sqlx::query_as::<_, FundedAccount>(&sql)
            .bind(user_id)
            .fetch_all(&self.db_pool)
            .await?)
    }

    async fn get_funded_account(&self, account_id: i32) -> Result<Option<FundedAccount>> {
        let sql = format!("SELECT {FUNDED_COLUMNS} FROM funded_accounts WHERE id = $1");
        Ok(sqlx::query_as::<_, FundedAccount>(&sql)
            .bind(account_id)
            .fetch_optional(&self.db_pool)
            .await?)
    }

    async fn create_funded_account(&self, account: NewFundedAccount) -> Result<FundedAccount> {
        let sql = format!(
            "INSERT INTO funded_accounts \
                 (user_id, account_type, initial_balance, current_balance, equity, max_drawdown, profit_target, status) \
             VALUES ($1, $2, $3, $3, $3, $4, $5, $6) RETURNING {FUNDED_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, FundedAccount>(&sql)
            .bind(&account.user_id)
            .bind(&account.account_type)
            .bind(account.initial_balance)
            .bind(account.max_drawdown)
            .bind(account.profit_target)
            .bind(FundedAccountStatus::Active.as_str())
            .fetch_one(&self.db_pool)
            .await?)
    }

    async fn get_funded_account_performance(&self, account_id: i32) -> Result<Vec<AccountPerformance>> {
        Ok(sqlx::query_as::<_, AccountPerformance>(
            "SELECT * FROM account_performance WHERE funded_account_id = $1 \
             ORDER BY recorded_at DESC, id DESC",
        )
        .bind(account_id)
        .fetch_all(&self.db_pool)
        .await?)
    }

    async fn apply_performance_sample(
        &self,
        account_id: i32,
        sample: &PerformanceSample,
    ) -> Result<Option<PerformanceUpdate>> {
        let mut tx = self.db_pool.begin().await?;

        let sql = format!("SELECT {FUNDED_COLUMNS} FROM funded_accounts WHERE id = $1 FOR UPDATE");
        let Some(mut account) = sqlx::query_as::<_, FundedAccount>(&sql)
            .bind(account_id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };
        apply_sample(&mut account, sample);

        let sql = format!(
            "UPDATE funded_accounts \
             SET current_balance = $2, equity = $3, current_drawdown = $4, status = $5, updated_at = NOW() \
             WHERE id = $1 RETURNING {FUNDED_COLUMNS}"
        );
        let account = sqlx::query_as::<_, FundedAccount>(&sql)
            .bind(account.id)
            .bind(account.current_balance)
            .bind(account.equity)
            .bind(account.current_drawdown)
            .bind(account.status.as_str())
            .fetch_one(&mut *tx)
            .await?;

        let new_record = performance_record(&account, sample.trades_count);
        let record = sqlx::query_as::<_, AccountPerformance>(
            "INSERT INTO account_performance \
                 (funded_account_id, balance, equity, drawdown, profit, trades_count) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(new_record.funded_account_id)
        .bind(new_record.balance)
        .bind(new_record.equity)
        .bind(new_record.drawdown)
        .bind(new_record.profit)
        .bind(new_record.trades_count)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(PerformanceUpdate { account, record }))
    }

    async fn get_active_funded_traders(&self) -> Result<Vec<FundedTrader>> {
        let sql = format!("SELECT {FUNDED_COLUMNS} FROM funded_accounts WHERE status = $1 ORDER BY id");
        let accounts = sqlx::query_as::<_, FundedAccount>(&sql)
            .bind(FundedAccountStatus::Active.as_str())
            .fetch_all(&self.db_pool)
            .await?;

        let user_ids: Vec<String> = accounts.iter().map(|a| a.user_id.clone()).collect();
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)");
        let users: HashMap<String, User> = sqlx::query_as::<_, User>(&sql)
            .bind(&user_ids)
            .fetch_all(&self.db_pool)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        Ok(accounts
            .into_iter()
            .filter_map(|account| {
                let user = users.get(&account.user_id)?.clone();
                Some(FundedTrader { account, user })
            })
            .collect())
    }
}

#[derive(Debug, FromRow)]
struct CurrencyPairRow {
    id: i32,
    symbol: String,
    name: String,
    bid: Decimal,
    ask: Decimal,
    change: Decimal,
    change_percent: Decimal,
    last_updated: DateTime<Utc>,
}

impl From<CurrencyPairRow> for Instrument {
    fn from(row: CurrencyPairRow) -> Self {
        Instrument {
            id: row.id,
            symbol: row.symbol,
            name: row.name,
            bid: row.bid,
            ask: row.ask,
            change: row.change,
            change_percent: row.change_percent,
            last_updated: row.last_updated,
        }
    }
}

fn repository_error(err: sqlx::Error) -> FeedError {
    FeedError::Repository(err.to_string())
}

#[async_trait]
impl InstrumentRepository for PgStorage {
    async fn load_instruments(&self) -> market_feed::Result<Vec<Instrument>> {
        let rows = sqlx::query_as::<_, CurrencyPairRow>(
            "SELECT id, symbol, name, bid, ask, change, change_percent, last_updated \
             FROM currency_pairs ORDER BY id",
        )
        .fetch_all(&self.db_pool)
        .await
        .map_err(repository_error)?;

        Ok(rows.into_iter().map(Instrument::from).collect())
    }

    async fn save_quote(&self, instrument: &Instrument) -> market_feed::Result<()> {
        let result = sqlx::query(
            "UPDATE currency_pairs \
             SET bid = $2, ask = $3, change = $4, change_percent = $5, last_updated = $6 \
             WHERE id = $1",
        )
        .bind(instrument.id)
        .bind(instrument.bid)
        .bind(instrument.ask)
        .bind(instrument.change)
        .bind(instrument.change_percent)
        .bind(instrument.last_updated)
        .execute(&self.db_pool)
        .await
        .map_err(repository_error)?;

        if result.rows_affected() == 0 {
            return Err(FeedError::InstrumentNotFound(instrument.symbol.clone()));
        }
        Ok(())
    }

    async fn seed_instruments(&self, instruments: &[Instrument]) -> market_feed::Result<Vec<Instrument>> {
        for instrument in instruments {
            sqlx::query(
                "INSERT INTO currency_pairs (symbol, name, bid, ask, change, change_percent, last_updated) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) ON CONFLICT (symbol) DO NOTHING",
            )
            .bind(&instrument.symbol)
            .bind(&instrument.name)
            .bind(instrument.bid)
            .bind(instrument.ask)
            .bind(instrument.change)
            .bind(instrument.change_percent)
            .bind(instrument.last_updated)
            .execute(&self.db_pool)
            .await
            .map_err(repository_error)?;
        }

        self.load_instruments().await
    }
}

//! Stored records and the inputs used to create them

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use crate::error::{AccountServiceError, UnknownVariant};

/// Fractional digits kept by money columns
pub const MONEY_SCALE: u32 = 2;

/// Reject a value with more fractional digits than its column keeps
pub(crate) fn ensure_scale(field: &str, value: Decimal, scale: u32) -> crate::error::Result<()> {
    if value.normalize().scale() > scale {
        return Err(AccountServiceError::validation(format!(
            "{field} allows at most {scale} decimal places"
        )));
    }
    Ok(())
}

/// User record, keyed by the identity provider's subject id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_image_url: Option<String>,
    pub role: String,
    pub subscription_plan_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile fields supplied by the identity provider at login
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertUser {
    pub id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_image_url: Option<String>,
}

/// Subscription plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TradingPlan {
    pub id: i32,
    pub name: String,
    pub price: Decimal,
    /// -1 means unlimited
    pub max_positions: i32,
    pub features: Vec<String>,
    pub is_popular: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTradingPlan {
    pub name: String,
    pub price: Decimal,
    pub max_positions: i32,
    pub features: Vec<String>,
    pub is_popular: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub initial_balance: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTournament {
    pub name: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub initial_balance: Decimal,
    pub is_active: bool,
}

/// A user's entry in a tournament.
///
/// Rank is not part of the record; it is derived by the leaderboard on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TournamentParticipant {
    pub id: i32,
    pub tournament_id: i32,
    pub user_id: String,
    pub initial_balance: Decimal,
    pub current_balance: Decimal,
    pub total_pnl: Decimal,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewParticipant {
    pub tournament_id: i32,
    pub user_id: String,
    pub initial_balance: Decimal,
}

/// Direction of a trading position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionType {
    Buy,
    Sell,
}

impl PositionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionType::Buy => "buy",
            PositionType::Sell => "sell",
        }
    }
}

impl FromStr for PositionType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(PositionType::Buy),
            "sell" => Ok(PositionType::Sell),
            other => Err(UnknownVariant { column: "type", value: other.to_string() }),
        }
    }
}

impl TryFrom<String> for PositionType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Open,
    Closed,
}

impl PositionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionStatus::Open => "open",
            PositionStatus::Closed => "closed",
        }
    }
}

impl TryFrom<String> for PositionStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "open" => Ok(PositionStatus::Open),
            "closed" => Ok(PositionStatus::Closed),
            _ => Err(UnknownVariant { column: "status", value }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TradingPosition {
    pub id: i32,
    pub user_id: String,
    pub currency_pair_id: i32,
    #[serde(rename = "type")]
    #[sqlx(rename = "type", try_from = "String")]
    pub position_type: PositionType,
    pub amount: Decimal,
    pub open_price: Decimal,
    pub close_price: Option<Decimal>,
    pub current_pnl: Decimal,
    #[sqlx(try_from = "String")]
    pub status: PositionStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// A validated position about to be opened
#[derive(Debug, Clone, PartialEq)]
pub struct NewPosition {
    pub user_id: String,
    pub currency_pair_id: i32,
    pub position_type: PositionType,
    pub amount: Decimal,
    pub open_price: Decimal,
}

/// Lifecycle state of a funded account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FundedAccountStatus {
    Active,
    Suspended,
    Passed,
    Failed,
}

impl FundedAccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FundedAccountStatus::Active => "active",
            FundedAccountStatus::Suspended => "suspended",
            FundedAccountStatus::Passed => "passed",
            FundedAccountStatus::Failed => "failed",
        }
    }
}

impl TryFrom<String> for FundedAccountStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "active" => Ok(FundedAccountStatus::Active),
            "suspended" => Ok(FundedAccountStatus::Suspended),
            "passed" => Ok(FundedAccountStatus::Passed),
            "failed" => Ok(FundedAccountStatus::Failed),
            _ => Err(UnknownVariant { column: "status", value }),
        }
    }
}

impl fmt::Display for FundedAccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capital-backed trading account with drawdown and profit-target rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FundedAccount {
    pub id: i32,
    pub user_id: String,
    pub account_type: String,
    pub initial_balance: Decimal,
    pub current_balance: Decimal,
    pub equity: Decimal,
    /// Percentage
    pub max_drawdown: Decimal,
    /// Percentage
    pub current_drawdown: Decimal,
    pub profit_target: Option<Decimal>,
    #[sqlx(try_from = "String")]
    pub status: FundedAccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewFundedAccount {
    pub user_id: String,
    pub account_type: String,
    pub initial_balance: Decimal,
    pub max_drawdown: Decimal,
    pub profit_target: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AccountPerformance {
    pub id: i32,
    pub funded_account_id: i32,
    pub recorded_at: DateTime<Utc>,
    pub balance: Decimal,
    pub equity: Decimal,
    pub drawdown: Decimal,
    pub profit: Decimal,
    pub trades_count: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPerformanceRecord {
    pub funded_account_id: i32,
    pub balance: Decimal,
    pub equity: Decimal,
    pub drawdown: Decimal,
    pub profit: Decimal,
    pub trades_count: i32,
}

/// Account state and history row written by one performance sample
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceUpdate {
    pub account: FundedAccount,
    pub record: AccountPerformance,
}

/// An active funded account together with its owner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundedTrader {
    #[serde(flatten)]
    pub account: FundedAccount,
    pub user: User,
}

//! Funded account rules: validation, drawdown and status evaluation

use market_feed::round_percent;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{AccountServiceError, Result};
use crate::models::{
    ensure_scale, FundedAccount, FundedAccountStatus, NewFundedAccount, NewPerformanceRecord,
    MONEY_SCALE,
};

/// Request to open a funded account
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFundedAccountRequest {
    pub account_type: String,
    pub initial_balance: Decimal,
    pub max_drawdown: Decimal,
    #[serde(default)]
    pub profit_target: Option<Decimal>,
}

impl CreateFundedAccountRequest {
    pub fn validate(self, user_id: &str) -> Result<NewFundedAccount> {
        if self.account_type.trim().is_empty() {
            return Err(AccountServiceError::validation("accountType must not be empty"));
        }
        if self.initial_balance <= Decimal::ZERO {
            return Err(AccountServiceError::validation("initialBalance must be positive"));
        }
        if self.max_drawdown <= Decimal::ZERO || self.max_drawdown > Decimal::ONE_HUNDRED {
            return Err(AccountServiceError::validation("maxDrawdown must be in (0, 100]"));
        }
        if matches!(self.profit_target, Some(target) if target <= Decimal::ZERO) {
            return Err(AccountServiceError::validation("profitTarget must be positive"));
        }
        ensure_scale("initialBalance", self.initial_balance, MONEY_SCALE)?;
        ensure_scale("maxDrawdown", self.max_drawdown, MONEY_SCALE)?;
        if let Some(target) = self.profit_target {
            ensure_scale("profitTarget", target, MONEY_SCALE)?;
        }

        Ok(NewFundedAccount {
            user_id: user_id.to_string(),
            account_type: self.account_type,
            initial_balance: self.initial_balance,
            max_drawdown: self.max_drawdown,
            profit_target: self.profit_target,
        })
    }
}

/// Performance sample reported for a funded account
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSample {
    pub balance: Decimal,
    pub equity: Decimal,
    #[serde(default)]
    pub trades_count: i32,
}

impl PerformanceSample {
    pub fn validate(&self) -> Result<()> {
        if self.trades_count < 0 {
            return Err(AccountServiceError::validation("tradesCount must not be negative"));
        }
        ensure_scale("balance", self.balance, MONEY_SCALE)?;
        ensure_scale("equity", self.equity, MONEY_SCALE)
    }
}

/// Percentage lost from the initial balance, never negative
pub fn drawdown_percent(initial_balance: Decimal, equity: Decimal) -> Decimal {
    if initial_balance <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let loss = (initial_balance - equity).max(Decimal::ZERO);
    round_percent(loss / initial_balance * Decimal::ONE_HUNDRED)
}

/// Status after applying the drawdown limit and profit target.
///
/// Only active accounts change state; a breached drawdown wins over a met
/// target.
pub fn evaluate_status(account: &FundedAccount) -> FundedAccountStatus {
    if account.status != FundedAccountStatus::Active {
        return account.status;
    }
    if account.current_drawdown >= account.max_drawdown {
        return FundedAccountStatus::Failed;
    }
    let profit = account.current_balance - account.initial_balance;
    match account.profit_target {
        Some(target) if profit >= target => FundedAccountStatus::Passed,
        _ => account.status,
    }
}

/// Apply a performance sample to the account's live fields
pub fn apply_sample(account: &mut FundedAccount, sample: &PerformanceSample) {
    account.current_balance = sample.balance;
    account.equity = sample.equity;
    account.current_drawdown = drawdown_percent(account.initial_balance, sample.equity);
    account.status = evaluate_status(account);
}

/// History row describing the account right after a sample was applied
pub fn performance_record(account: &FundedAccount, trades_count: i32) -> NewPerformanceRecord {
    NewPerformanceRecord {
        funded_account_id: account.id,
        balance: account.current_balance,
        equity: account.equity,
        drawdown: account.current_drawdown,
        profit: account.current_balance - account.initial_balance,
        trades_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};
    use chrono::Utc;

    fn account(initial: i64, max_drawdown: i64, target: Option<i64>) -> FundedAccount {
        let now = Utc::now();
        FundedAccount {
            id: 1,
            user_id: "u1".to_string(),
            account_type: "challenge".to_string(),
            initial_balance: Decimal::new(initial, 0),
            current_balance: Decimal::new(initial, 0),
            equity: Decimal::new(initial, 0),
            max_drawdown: Decimal::new(max_drawdown, 0),
            current_drawdown: Decimal::ZERO,
            profit_target: target.map(|t| Decimal::new(t, 0)),
            status: FundedAccountStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    fn sample(balance: i64, equity: i64) -> PerformanceSample {
        PerformanceSample {
            balance: Decimal::new(balance, 0),
            equity: Decimal::new(equity, 0),
            trades_count: 1,
        }
    }

    #[test]
    fn test_drawdown_percent() {
        assert_eq!(drawdown_percent(Decimal::new(10000, 0), Decimal::new(9250, 0)), Decimal::new(750, 2));
        assert_eq!(drawdown_percent(Decimal::new(10000, 0), Decimal::new(11000, 0)), Decimal::ZERO);
        assert_eq!(drawdown_percent(Decimal::ZERO, Decimal::new(100, 0)), Decimal::ZERO);
        assert_eq!(drawdown_percent(Decimal::new(3, 0), Decimal::new(2, 0)), Decimal::new(3333, 2));
    }

    #[test]
    fn test_breached_drawdown_fails_account() {
        let mut acct = account(10000, 10, Some(1000));
        apply_sample(&mut acct, &sample(9000, 9000));

        assert_eq!(acct.current_drawdown, Decimal::new(10, 0));
        assert_eq!(acct.status, FundedAccountStatus::Failed);
    }

    #[test]
    fn test_met_target_passes_account() {
        let mut acct = account(10000, 10, Some(1000));
        apply_sample(&mut acct, &sample(11000, 11000));

        assert_eq!(acct.status, FundedAccountStatus::Passed);
    }

    #[test]
    fn test_no_target_stays_active() {
        let mut acct = account(10000, 10, None);
        apply_sample(&mut acct, &sample(50000, 50000));

        assert_eq!(acct.status, FundedAccountStatus::Active);
        assert_eq!(acct.equity, Decimal::new(50000, 0));
    }

    #[test]
    fn test_terminal_status_is_sticky() {
        let mut acct = account(10000, 10, Some(1000));
        acct.status = FundedAccountStatus::Failed;
        apply_sample(&mut acct, &sample(12000, 12000));

        assert_eq!(acct.status, FundedAccountStatus::Failed);
    }

    #[test]
    fn test_create_request_validation() {
        let valid = CreateFundedAccountRequest {
            account_type: "challenge".to_string(),
            initial_balance: Decimal::new(50000, 0),
            max_drawdown: Decimal::new(10, 0),
            profit_target: Some(Decimal::new(5000, 0)),
        };
        assert_ok!(valid.clone().validate("u1"));

        let mut bad = valid.clone();
        bad.max_drawdown = Decimal::new(101, 0);
        assert_err!(bad.validate("u1"));

        let mut bad = valid.clone();
        bad.initial_balance = Decimal::ZERO;
        assert_err!(bad.validate("u1"));

        let mut bad = valid.clone();
        bad.profit_target = Some(Decimal::new(-1, 0));
        assert_err!(bad.validate("u1"));

        let mut bad = valid.clone();
        bad.initial_balance = Decimal::new(50000001, 3);
        assert_err!(bad.validate("u1"));

        let mut bad = valid;
        bad.profit_target = Some(Decimal::new(1, 3));
        assert_err!(bad.validate("u1"));
    }

    #[test]
    fn test_sample_validation() {
        assert_ok!(sample(9000, 9100).validate());

        let mut bad = sample(9000, 9000);
        bad.trades_count = -1;
        assert_err!(bad.validate());

        let mut bad = sample(9000, 9000);
        bad.equity = Decimal::new(9000005, 3);
        assert_err!(bad.validate());

        let mut cents = sample(9000, 9000);
        cents.balance = Decimal::new(900050, 2);
        assert_ok!(cents.validate());
    }

    #[test]
    fn test_performance_record_reflects_applied_sample() {
        let mut acct = account(10000, 10, None);
        apply_sample(&mut acct, &sample(9400, 9300));

        let record = performance_record(&acct, 4);
        assert_eq!(record.balance, Decimal::new(9400, 0));
        assert_eq!(record.drawdown, Decimal::new(700, 2));
        assert_eq!(record.profit, Decimal::new(-600, 0));
        assert_eq!(record.trades_count, 4);
    }
}

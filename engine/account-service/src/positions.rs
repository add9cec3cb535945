//! Position opening and closing rules

use market_feed::instrument::PRICE_SCALE;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;

use crate::error::{AccountServiceError, Result};
use crate::models::{ensure_scale, NewPosition, PositionType, TradingPosition, MONEY_SCALE};

/// Scale of stored profit and loss values
pub const PNL_SCALE: u32 = MONEY_SCALE;

/// Request to open a position, as received from a client
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPositionRequest {
    pub currency_pair_id: i32,
    #[serde(rename = "type")]
    pub position_type: String,
    pub amount: Decimal,
    pub open_price: Decimal,
}

impl OpenPositionRequest {
    /// Check field-level rules and produce the position to store.
    ///
    /// Whether the currency pair exists is checked by the caller.
    pub fn validate(self, user_id: &str) -> Result<NewPosition> {
        let position_type: PositionType = self
            .position_type
            .parse()
            .map_err(|_| AccountServiceError::validation("type must be 'buy' or 'sell'"))?;

        if self.amount <= Decimal::ZERO {
            return Err(AccountServiceError::validation("amount must be positive"));
        }
        if self.open_price <= Decimal::ZERO {
            return Err(AccountServiceError::validation("openPrice must be positive"));
        }
        ensure_scale("amount", self.amount, MONEY_SCALE)?;
        ensure_scale("openPrice", self.open_price, PRICE_SCALE)?;

        Ok(NewPosition {
            user_id: user_id.to_string(),
            currency_pair_id: self.currency_pair_id,
            position_type,
            amount: self.amount,
            open_price: self.open_price,
        })
    }
}

/// Request to close a position
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosePositionRequest {
    pub close_price: Decimal,
}

impl ClosePositionRequest {
    /// The close price, if it is positive and fits the stored price scale
    pub fn validate(&self) -> Result<Decimal> {
        if self.close_price <= Decimal::ZERO {
            return Err(AccountServiceError::validation("closePrice must be positive"));
        }
        ensure_scale("closePrice", self.close_price, PRICE_SCALE)?;
        Ok(self.close_price)
    }
}

/// Profit or loss of closing `position` at `close_price`
pub fn realized_pnl(position: &TradingPosition, close_price: Decimal) -> Decimal {
    let movement = match position.position_type {
        PositionType::Buy => close_price - position.open_price,
        PositionType::Sell => position.open_price - close_price,
    };
    (movement * position.amount).round_dp_with_strategy(PNL_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_err;
    use crate::models::PositionStatus;
    use chrono::Utc;

    fn request(kind: &str, amount: i64, open_price: Decimal) -> OpenPositionRequest {
        OpenPositionRequest {
            currency_pair_id: 1,
            position_type: kind.to_string(),
            amount: Decimal::new(amount, 0),
            open_price,
        }
    }

    fn open_position(kind: PositionType) -> TradingPosition {
        TradingPosition {
            id: 1,
            user_id: "u1".to_string(),
            currency_pair_id: 1,
            position_type: kind,
            amount: Decimal::new(10000, 0),
            open_price: Decimal::new(108450, 5),
            close_price: None,
            current_pnl: Decimal::ZERO,
            status: PositionStatus::Open,
            opened_at: Utc::now(),
            closed_at: None,
        }
    }

    #[test]
    fn test_validate_accepts_buy() {
        let position = request("buy", 1000, Decimal::new(108450, 5)).validate("u1").unwrap();
        assert_eq!(position.position_type, PositionType::Buy);
        assert_eq!(position.user_id, "u1");
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        let price = Decimal::new(108450, 5);
        assert_err!(request("hold", 1000, price).validate("u1"));
        assert_err!(request("buy", 0, price).validate("u1"));
        assert_err!(request("sell", -5, price).validate("u1"));
        assert_err!(request("sell", 5, Decimal::ZERO).validate("u1"));
    }

    #[test]
    fn test_validate_rejects_values_finer_than_stored_scale() {
        let price = Decimal::new(108450, 5);
        let mut dust = request("buy", 1000, price);
        dust.amount = Decimal::new(1, 3);
        assert_err!(dust.validate("u1"));

        assert_err!(request("buy", 1000, Decimal::new(1084501, 6)).validate("u1"));

        let mut cents = request("buy", 1000, Decimal::new(1084500, 6));
        cents.amount = Decimal::new(1050, 2);
        let position = cents.validate("u1").unwrap();
        assert_eq!(position.amount, Decimal::new(1050, 2));
    }

    #[test]
    fn test_close_request_validation() {
        let close = |price| ClosePositionRequest { close_price: price };

        assert_eq!(close(Decimal::new(108550, 5)).validate().unwrap(), Decimal::new(108550, 5));
        assert_err!(close(Decimal::ZERO).validate());
        assert_err!(close(Decimal::new(1085501, 6)).validate());
    }

    #[test]
    fn test_request_deserializes_from_camel_case() {
        let body = r#"{"currencyPairId":3,"type":"sell","amount":"2500","openPrice":"1.26500"}"#;
        let req: OpenPositionRequest = serde_json::from_str(body).unwrap();

        assert_eq!(req.currency_pair_id, 3);
        assert_eq!(req.position_type, "sell");
        assert_eq!(req.open_price, Decimal::new(126500, 5));
    }

    #[test]
    fn test_realized_pnl_by_direction() {
        let close = Decimal::new(108550, 5);

        assert_eq!(realized_pnl(&open_position(PositionType::Buy), close), Decimal::new(1000, 2));
        assert_eq!(realized_pnl(&open_position(PositionType::Sell), close), Decimal::new(-1000, 2));
    }

    #[test]
    fn test_realized_pnl_rounds_to_cents() {
        let mut position = open_position(PositionType::Buy);
        position.amount = Decimal::new(333, 0);

        // 0.00001 * 333 = 0.00333
        let pnl = realized_pnl(&position, Decimal::new(108451, 5));
        assert_eq!(pnl, Decimal::ZERO);
        assert_eq!(pnl.scale(), 2);
    }
}

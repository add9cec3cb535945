//! Instrument quotes and the per-tick quote arithmetic

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{FeedError, Result};

/// Fractional digits kept for bid, ask and change
pub const PRICE_SCALE: u32 = 5;

/// Fractional digits kept for the change percentage
pub const PERCENT_SCALE: u32 = 2;

/// Round a price to [`PRICE_SCALE`] digits, midpoint away from zero
pub fn round_price(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Round a percentage to [`PERCENT_SCALE`] digits, midpoint away from zero
pub fn round_percent(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(PERCENT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// A tradable currency pair with its live quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    pub id: i32,
    pub symbol: String,
    pub name: String,
    pub bid: Decimal,
    pub ask: Decimal,
    pub change: Decimal,
    pub change_percent: Decimal,
    pub last_updated: DateTime<Utc>,
}

impl Instrument {
    /// Create an instrument with no recorded change
    pub fn new(id: i32, symbol: &str, name: &str, bid: Decimal, ask: Decimal) -> Self {
        Self {
            id,
            symbol: symbol.to_string(),
            name: name.to_string(),
            bid: round_price(bid),
            ask: round_price(ask),
            change: Decimal::ZERO,
            change_percent: Decimal::ZERO,
            last_updated: Utc::now(),
        }
    }

    /// Spread between ask and bid
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }

    /// Apply one tick's deltas.
    ///
    /// `change` and `change_percent` are derived from the bid before it is
    /// overwritten. A zero previous bid yields a zero percentage. A quote that
    /// would fall to zero or below is rejected and the instrument is left as is.
    pub fn apply_tick(
        &mut self,
        bid_delta: Decimal,
        ask_delta: Decimal,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let old_bid = self.bid;
        let new_bid = round_price(old_bid + bid_delta);
        let new_ask = round_price(self.ask + ask_delta);

        if new_bid <= Decimal::ZERO || new_ask <= Decimal::ZERO {
            return Err(FeedError::NonPositiveQuote {
                symbol: self.symbol.clone(),
                bid: new_bid.to_string(),
                ask: new_ask.to_string(),
            });
        }

        let change = round_price(new_bid - old_bid);
        let change_percent = if old_bid.is_zero() {
            Decimal::ZERO
        } else {
            round_percent(change / old_bid * Decimal::ONE_HUNDRED)
        };

        self.bid = new_bid;
        self.ask = new_ask;
        self.change = change;
        self.change_percent = change_percent;
        self.last_updated = now;
        Ok(())
    }
}

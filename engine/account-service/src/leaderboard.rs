//! Leaderboard ranking
//!
//! Rank is never stored: every read recomputes it from balances so a stale
//! persisted value can never leak into a response.

use market_feed::round_percent;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{FundedTrader, TournamentParticipant};

/// Funded-trader leaderboards show this many entries
pub const FUNDED_LEADERBOARD_SIZE: usize = 10;

/// Anything with a starting and a current balance
pub trait Rankable {
    fn initial_balance(&self) -> Decimal;
    fn current_balance(&self) -> Decimal;
}

impl Rankable for TournamentParticipant {
    fn initial_balance(&self) -> Decimal {
        self.initial_balance
    }

    fn current_balance(&self) -> Decimal {
        self.current_balance
    }
}

impl Rankable for FundedTrader {
    fn initial_balance(&self) -> Decimal {
        self.account.initial_balance
    }

    fn current_balance(&self) -> Decimal {
        self.account.current_balance
    }
}

/// An entry with its derived rank and profit figures
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry<T> {
    #[serde(flatten)]
    pub entry: T,
    /// 1-based
    pub rank: u32,
    pub profit: Decimal,
    pub profit_percent: Decimal,
}

/// Profit and profit percent for one entry
pub fn profit_of<T: Rankable>(entry: &T) -> (Decimal, Decimal) {
    let initial = entry.initial_balance();
    let profit = entry.current_balance() - initial;
    let percent = if initial.is_zero() {
        Decimal::ZERO
    } else {
        round_percent(profit / initial * Decimal::ONE_HUNDRED)
    };
    (profit, percent)
}

/// Rank entries by profit, highest first.
///
/// The sort is stable, so entries with equal profit keep their input order.
pub fn rank<T: Rankable>(entries: Vec<T>) -> Vec<RankedEntry<T>> {
    let mut scored: Vec<(Decimal, Decimal, T)> = entries
        .into_iter()
        .map(|entry| {
            let (profit, percent) = profit_of(&entry);
            (profit, percent, entry)
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));

    scored
        .into_iter()
        .enumerate()
        .map(|(index, (profit, profit_percent, entry))| RankedEntry {
            entry,
            rank: index as u32 + 1,
            profit,
            profit_percent,
        })
        .collect()
}

pub fn rank_participants(participants: Vec<TournamentParticipant>) -> Vec<RankedEntry<TournamentParticipant>> {
    rank(participants)
}

/// Top funded traders by absolute profit
pub fn rank_funded_traders(traders: Vec<FundedTrader>) -> Vec<RankedEntry<FundedTrader>> {
    let mut ranked = rank(traders);
    ranked.truncate(FUNDED_LEADERBOARD_SIZE);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn participant(id: i32, initial: i64, current: i64) -> TournamentParticipant {
        TournamentParticipant {
            id,
            tournament_id: 1,
            user_id: format!("user-{}", id),
            initial_balance: Decimal::new(initial, 0),
            current_balance: Decimal::new(current, 0),
            total_pnl: Decimal::new(current - initial, 0),
            joined_at: Utc::now(),
        }
    }

    #[test]
    fn test_orders_by_profit_descending() {
        let ranked = rank_participants(vec![
            participant(1, 10000, 9500),
            participant(2, 10000, 12000),
            participant(3, 10000, 10100),
        ]);

        let ids: Vec<i32> = ranked.iter().map(|r| r.entry.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert_eq!(ranked.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(ranked[0].profit, Decimal::new(2000, 0));
        assert_eq!(ranked[0].profit_percent, Decimal::new(2000, 2));
        assert_eq!(ranked[2].profit, Decimal::new(-500, 0));
    }

    #[test]
    fn test_ties_keep_input_order() {
        let ranked = rank_participants(vec![participant(1, 10000, 10500), participant(2, 10000, 10500)]);

        assert_eq!(ranked[0].entry.id, 1);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].entry.id, 2);
        assert_eq!(ranked[1].rank, 2);
    }

    #[test]
    fn test_ranking_is_idempotent() {
        let input = vec![
            participant(1, 10000, 10000),
            participant(2, 5000, 7000),
            participant(3, 10000, 12000),
            participant(4, 10000, 12000),
        ];
        let once = rank_participants(input);
        let again = rank_participants(once.iter().map(|r| r.entry.clone()).collect());

        assert_eq!(once, again);
    }

    #[test]
    fn test_zero_initial_balance_has_zero_percent() {
        let ranked = rank_participants(vec![participant(1, 0, 250)]);

        assert_eq!(ranked[0].profit, Decimal::new(250, 0));
        assert_eq!(ranked[0].profit_percent, Decimal::ZERO);
    }

    #[test]
    fn test_percent_rounds_to_two_places() {
        let ranked = rank_participants(vec![participant(1, 3, 4)]);
        assert_eq!(ranked[0].profit_percent, Decimal::new(3333, 2));
    }

    #[test]
    fn test_serializes_flat_with_rank() {
        let ranked = rank_participants(vec![participant(7, 10000, 10250)]);
        let json = serde_json::to_value(&ranked[0]).unwrap();

        assert_eq!(json["id"], 7);
        assert_eq!(json["userId"], "user-7");
        assert_eq!(json["rank"], 1);
        assert_eq!(json["profit"], "250");
        assert_eq!(json["profitPercent"], "2.50");
    }
}

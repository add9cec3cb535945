//! Reference data for a fresh store

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing::info;

use crate::error::Result;
use crate::models::{NewTournament, NewTradingPlan};
use crate::storage::Storage;

pub fn default_trading_plans() -> Vec<NewTradingPlan> {
    let features = |items: &[&str]| -> Vec<String> { items.iter().map(|s| s.to_string()).collect() };
    vec![
        NewTradingPlan {
            name: "Starter".to_string(),
            price: Decimal::new(2900, 2),
            max_positions: 5,
            features: features(&["Real-time quotes", "Monthly tournament entry"]),
            is_popular: false,
        },
        NewTradingPlan {
            name: "Pro".to_string(),
            price: Decimal::new(7900, 2),
            max_positions: 25,
            features: features(&[
                "Real-time quotes",
                "All tournaments",
                "Funded account challenges",
            ]),
            is_popular: true,
        },
        NewTradingPlan {
            name: "Elite".to_string(),
            price: Decimal::new(14900, 2),
            max_positions: -1,
            features: features(&[
                "Real-time quotes",
                "All tournaments",
                "Funded account challenges",
                "Unlimited positions",
            ]),
            is_popular: false,
        },
    ]
}

/// A month-long tournament starting now
pub fn default_tournament() -> NewTournament {
    let now = Utc::now();
    NewTournament {
        name: "Monthly Forex Championship".to_string(),
        description: Some("Trade the majors for the highest return".to_string()),
        start_date: now,
        end_date: now + Duration::days(30),
        initial_balance: Decimal::new(10000, 0),
        is_active: true,
    }
}

/// Insert plans and an active tournament when the store has none
pub async fn seed_reference_data(storage: &dyn Storage) -> Result<()> {
    if storage.get_trading_plans().await?.is_empty() {
        for plan in default_trading_plans() {
            storage.create_trading_plan(plan).await?;
        }
        info!("Seeded default trading plans");
    }

    if storage.get_active_tournament().await?.is_none() {
        let tournament = storage.create_tournament(default_tournament()).await?;
        info!("Seeded tournament {} ({})", tournament.id, tournament.name);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStorage;

    #[tokio::test]
    async fn test_seeding_is_idempotent() {
        let storage = MemoryStorage::new();
        seed_reference_data(&storage).await.unwrap();
        seed_reference_data(&storage).await.unwrap();

        assert_eq!(storage.get_trading_plans().await.unwrap().len(), 3);
        assert_eq!(storage.get_tournaments().await.unwrap().len(), 1);
        assert!(storage.get_active_tournament().await.unwrap().is_some());
    }
}

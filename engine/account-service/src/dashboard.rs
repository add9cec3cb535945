//! Per-user dashboard assembly

use market_feed::{Instrument, PriceStore};
use serde::Serialize;

use crate::error::{AccountServiceError, Result};
use crate::leaderboard::{rank_participants, RankedEntry};
use crate::models::{FundedAccount, Tournament, TournamentParticipant, TradingPosition, User};
use crate::storage::Storage;

/// Everything the dashboard page shows for one user
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub user: User,
    pub active_tournament: Option<Tournament>,
    /// The user's own leaderboard entry, when they joined the active tournament
    pub participant_data: Option<RankedEntry<TournamentParticipant>>,
    pub leaderboard: Vec<RankedEntry<TournamentParticipant>>,
    pub user_positions: Vec<TradingPosition>,
    pub funded_accounts: Vec<FundedAccount>,
    pub currency_pairs: Vec<Instrument>,
}

async fn fetch_user(storage: &dyn Storage, user_id: &str) -> Result<User> {
    storage
        .get_user(user_id)
        .await?
        .ok_or_else(|| AccountServiceError::UserNotFound { user_id: user_id.to_string() })
}

async fn fetch_active_board(
    storage: &dyn Storage,
) -> Result<(Option<Tournament>, Vec<RankedEntry<TournamentParticipant>>)> {
    let Some(tournament) = storage.get_active_tournament().await? else {
        return Ok((None, Vec::new()));
    };
    let participants = storage.get_tournament_participants(tournament.id).await?;
    Ok((Some(tournament), rank_participants(participants)))
}

async fn fetch_quotes(prices: &PriceStore) -> Result<Vec<Instrument>> {
    Ok(prices.snapshot().await)
}

/// Gather the dashboard for `user_id`.
///
/// The independent reads run concurrently; the first failure aborts the
/// whole snapshot. A missing user is an error, a missing active tournament
/// is not.
pub async fn build_dashboard(
    storage: &dyn Storage,
    prices: &PriceStore,
    user_id: &str,
) -> Result<DashboardSnapshot> {
    let (user, (active_tournament, leaderboard), user_positions, funded_accounts, currency_pairs) = tokio::try_join!(
        fetch_user(storage, user_id),
        fetch_active_board(storage),
        storage.get_user_positions(user_id),
        storage.get_user_funded_accounts(user_id),
        fetch_quotes(prices),
    )?;

    let participant_data = leaderboard.iter().find(|e| e.entry.user_id == user_id).cloned();

    Ok(DashboardSnapshot {
        user,
        active_tournament,
        participant_data,
        leaderboard,
        user_positions,
        funded_accounts,
        currency_pairs,
    })
}

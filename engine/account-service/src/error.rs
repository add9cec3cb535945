//! Error types for AccountService

use thiserror::Error;

/// Broad category of an error, used to pick the response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Persistence,
}

#[derive(Error, Debug)]
pub enum AccountServiceError {
    #[error("User not found: {user_id}")]
    UserNotFound { user_id: String },

    #[error("Tournament not found: {tournament_id}")]
    TournamentNotFound { tournament_id: i32 },

    #[error("No active tournament found")]
    NoActiveTournament,

    #[error("Position not found: {position_id}")]
    PositionNotFound { position_id: i32 },

    #[error("Funded account not found: {account_id}")]
    FundedAccountNotFound { account_id: i32 },

    #[error("Currency pair not found: {currency_pair_id}")]
    CurrencyPairNotFound { currency_pair_id: i32 },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl AccountServiceError {
    /// Shorthand for a validation failure
    pub fn validation(message: impl Into<String>) -> Self {
        AccountServiceError::Validation { message: message.into() }
    }

    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccountServiceError::UserNotFound { .. }
            | AccountServiceError::TournamentNotFound { .. }
            | AccountServiceError::NoActiveTournament
            | AccountServiceError::PositionNotFound { .. }
            | AccountServiceError::FundedAccountNotFound { .. }
            | AccountServiceError::CurrencyPairNotFound { .. } => ErrorKind::NotFound,
            AccountServiceError::Validation { .. } => ErrorKind::Validation,
            AccountServiceError::DatabaseError(_)
            | AccountServiceError::Migration(_)
            | AccountServiceError::InvalidConfig { .. } => ErrorKind::Persistence,
        }
    }
}

pub type Result<T> = std::result::Result<T, AccountServiceError>;

/// A stored enum column held a value this build does not know
#[derive(Error, Debug)]
#[error("unknown {column} value: {value}")]
pub struct UnknownVariant {
    pub column: &'static str,
    pub value: String,
}

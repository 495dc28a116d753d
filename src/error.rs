//! Error types for the sizing and allocation engine

use crate::portfolio::PortfolioError;
use thiserror::Error;

/// Library result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers.
///
/// Only precondition violations and persistence failures end up here. Missing
/// prices, ruined kelly candidates and thin portfolio history degrade
/// gracefully inside the engine instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Strategy {strategy} has no training table")]
    MissingTable { strategy: String },

    #[error("Place threshold must be at least 1")]
    InvalidPlace,

    #[error("Place threshold {place} exceeds participant count {participants} for event {event}")]
    PlaceExceedsParticipants {
        event: String,
        place: usize,
        participants: usize,
    },

    #[error("Strategy {strategy} has not been fitted")]
    NotFitted { strategy: String },

    #[error("Portfolio {portfolio} has no strategies")]
    EmptyPortfolio { portfolio: String },

    #[error("Invalid kelly search: {0}")]
    InvalidSearch(String),

    #[error("Portfolio optimization error: {0}")]
    Portfolio(#[from] PortfolioError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io(err.error)
    }
}

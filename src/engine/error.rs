use thiserror::Error;

/// Business-rule rejections.
///
/// None of these are fatal: every rejected operation leaves the engine state
/// untouched and is reported back to the requesting user or operator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GameError {
    #[error("malformed command: {0}")]
    Validation(String),

    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: i64, need: i64 },

    #[error("bet is below the minimum of {min}")]
    BelowMinimum { min: i64 },

    #[error("user already has a bet in this round")]
    DuplicateBet,

    #[error("invalid option: expected 1..={max}")]
    InvalidOption { max: usize },

    #[error("no points available to bet")]
    NoFunds,

    #[error("item not found in the shop: {0}")]
    ItemNotFound(String),

    #[error("item not owned: {0}")]
    NotOwned(String),

    #[error("unknown user: {0}")]
    UserNotFound(String),

    #[error("no betting round is active")]
    NoActiveRound,

    #[error("the betting round is closed")]
    BettingClosed,

    #[error("{0}")]
    StateConflict(String),
}

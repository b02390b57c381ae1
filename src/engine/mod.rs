pub mod betting;
pub mod commands;
pub mod error;
pub mod ledger;
pub mod shop;
pub mod state;

pub use betting::{BettingEngine, TickOutcome, MIN_BET};
pub use commands::{ChatCommand, OperatorCommand};
pub use error::GameError;
pub use ledger::PointLedger;
pub use shop::Shop;
pub use state::BotState;

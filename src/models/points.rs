use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-user ledger record, persisted in `user_data.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Current spendable balance, never negative
    pub balance: i64,

    /// When the user last received a chat reward
    pub last_reward: Option<DateTime<Utc>>,
}

impl UserRecord {
    pub fn new() -> Self {
        UserRecord {
            balance: 0,
            last_reward: None,
        }
    }
}

impl Default for UserRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a successful chat reward draw
#[derive(Debug, Clone, Copy)]
pub struct RewardGrant {
    /// Points granted, after the event multiplier
    pub amount: i64,

    /// Whether this was the jackpot outcome
    pub jackpot: bool,

    /// Balance after the grant
    pub balance: i64,
}

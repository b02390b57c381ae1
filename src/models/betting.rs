use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Round lifecycle once a round exists; no round at all means Idle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// Accepting bets until the deadline
    Open,
    /// Deadline reached or force-closed; waiting for the operator's verdict
    Closed,
}

/// One user's bet in the active round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bet {
    /// Zero-based option index
    pub option: usize,
    pub amount: i64,
    pub placed_at: DateTime<Utc>,
}

/// Bet amount as written in chat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BetAmount {
    Points(i64),
    /// 올인: stake the full current balance
    AllIn,
}

/// The active round. At most one exists at a time.
#[derive(Debug, Clone)]
pub struct BettingRound {
    pub topic: String,
    pub options: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub phase: RoundPhase,

    /// Keyed by user id: the map itself enforces one bet per user
    pub bets: HashMap<String, Bet>,

    /// Deadline advisories (60s / 30s / 10s) already announced
    pub warned: Vec<i64>,
}

/// Result of a successful bet placement, for the chat reply
#[derive(Debug, Clone)]
pub struct BetReceipt {
    pub option_name: String,
    pub amount: i64,
    pub balance: i64,
}

/// Immutable record of a settled round, appended to `betting_history.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRecord {
    pub topic: String,
    pub options: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub settled_at: DateTime<Utc>,
    pub winning_option: String,
    pub winning_option_idx: usize,
    pub total_pool: i64,
    pub odds: f64,
    pub winners: Vec<WinnerRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WinnerRecord {
    pub user_id: String,
    pub bet_amount: i64,
    pub win_amount: i64,
}

/// What the settlement produced, for announcements
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub record: RoundRecord,
}

/// Read-only view of the active round for the overlay
#[derive(Debug, Clone, Serialize)]
pub struct RoundSnapshot {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub time_left: i64,
    pub total_points: i64,
    pub options: Vec<OptionSnapshot>,
}

impl RoundSnapshot {
    pub fn inactive() -> Self {
        RoundSnapshot {
            active: false,
            message: Some("현재 진행 중인 배팅이 없습니다.".to_string()),
            topic: None,
            time_left: 0,
            total_points: 0,
            options: Vec::new(),
        }
    }
}

/// Per-option view: pool, participants, and display odds (2 decimals)
#[derive(Debug, Clone, Serialize)]
pub struct OptionSnapshot {
    /// One-based index, as typed in chat
    pub idx: usize,
    pub name: String,
    pub bets: i64,
    pub participants: usize,
    pub odds: f64,
}

/// Display row for the recent-history endpoint
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub date: DateTime<Utc>,
    pub topic: String,
    pub options: usize,
    pub total_points: i64,
    pub winning_option: String,
}

impl From<&RoundRecord> for HistoryEntry {
    fn from(record: &RoundRecord) -> Self {
        HistoryEntry {
            date: record.settled_at,
            topic: record.topic.clone(),
            options: record.options.len(),
            total_points: record.total_pool,
            winning_option: record.winning_option.clone(),
        }
    }
}

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::config::Settings;
use crate::engine::GameError;
use crate::models::{RewardGrant, UserRecord};

/// Per-user balances and reward timestamps.
///
/// The ledger is the single owner of every balance: the shop debits
/// purchases through it and the betting engine escrows and pays out through
/// it, so a balance can never go negative anywhere.
#[derive(Debug, Default)]
pub struct PointLedger {
    users: HashMap<String, UserRecord>,
}

impl PointLedger {
    pub fn new() -> Self {
        PointLedger {
            users: HashMap::new(),
        }
    }

    /// Rebuild from the persisted user document
    pub fn from_records(users: HashMap<String, UserRecord>) -> Self {
        PointLedger { users }
    }

    /// Records for persistence
    pub fn records(&self) -> &HashMap<String, UserRecord> {
        &self.users
    }

    pub fn contains(&self, user: &str) -> bool {
        self.users.contains_key(user)
    }

    pub fn balance(&self, user: &str) -> i64 {
        self.users.get(user).map(|u| u.balance).unwrap_or(0)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Ensure the user exists, with a zero balance on first sight
    pub fn register(&mut self, user: &str) -> &mut UserRecord {
        self.users.entry(user.to_string()).or_default()
    }

    /// Add points; a zero amount is a no-op
    pub fn credit(&mut self, user: &str, amount: i64) {
        if amount == 0 {
            return;
        }
        self.register(user).balance += amount;
    }

    /// Remove points; fails without touching the balance if it would go
    /// negative. A zero amount is a no-op.
    pub fn debit(&mut self, user: &str, amount: i64) -> Result<(), GameError> {
        if amount == 0 {
            return Ok(());
        }

        let have = self.balance(user);
        if amount > have {
            return Err(GameError::InsufficientFunds { have, need: amount });
        }

        self.register(user).balance = have - amount;
        Ok(())
    }

    /// Draw a passive chat reward for `user`.
    ///
    /// Returns `None` while the user is still inside the cooldown window.
    /// First sight registers the user (balance 0) and grants immediately.
    /// The jackpot roll wins with `jackpot_chance` percent probability;
    /// otherwise the reward is uniform in `[min_points, max_points]`. Either
    /// amount is scaled by the event multiplier and truncated to an integer.
    pub fn grant_chat_reward<R: Rng>(
        &mut self,
        user: &str,
        now: DateTime<Utc>,
        settings: &Settings,
        rng: &mut R,
    ) -> Option<RewardGrant> {
        let cooldown = settings.cooldown();
        let record = self.register(user);

        if let Some(last) = record.last_reward {
            if now - last < cooldown {
                return None;
            }
        }

        let jackpot = rng.gen_range(1..=100) <= settings.jackpot_chance;
        let base = if jackpot {
            settings.jackpot_points
        } else {
            let lo = settings.min_points;
            let hi = settings.max_points.max(lo);
            rng.gen_range(lo..=hi)
        };
        let amount = (base as f64 * settings.point_multiplier) as i64;

        record.balance += amount;
        record.last_reward = Some(now);

        Some(RewardGrant {
            amount,
            jackpot,
            balance: record.balance,
        })
    }

    /// Admin edit: overwrite a user's balance
    pub fn set_balance(&mut self, user: &str, points: i64) {
        self.register(user).balance = points.max(0);
    }

    /// Admin delete: remove the user record entirely
    pub fn remove_user(&mut self, user: &str) -> bool {
        self.users.remove(user).is_some()
    }

    /// Admin reset: wipe every balance and reward timestamp
    pub fn reset_all(&mut self) {
        self.users.clear();
    }
}

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio::time;
use tracing::info;

use crate::engine::BotState;
use crate::workers::Outbox;

/// Worker that drives the betting countdown.
///
/// Ticks once a second through the same lock as the chat worker, so a
/// timer-driven auto-close can never interleave with a bet on the same
/// round. Checkpoint bookkeeping lives in the round itself: once a round
/// is settled there is no round left for a stale tick to touch.
pub struct RoundTimer {
    state: Arc<RwLock<BotState>>,
    outbox: Outbox,
}

const TICK_INTERVAL: Duration = Duration::from_secs(1);

impl RoundTimer {
    pub fn new(state: Arc<RwLock<BotState>>, outbox: Outbox) -> Self {
        RoundTimer { state, outbox }
    }

    /// Run the worker loop
    pub async fn run(self) {
        info!("Round timer started (interval: {:?})", TICK_INTERVAL);

        let mut interval = time::interval(TICK_INTERVAL);
        loop {
            interval.tick().await;
            self.tick().await;
        }
    }

    async fn tick(&self) {
        let now = Utc::now();
        let mut state = self.state.write().await;

        let outcome = state.betting.tick(now);
        if outcome.closed {
            info!("Betting round auto-closed at the deadline");
        }

        if !state.settings.show_betting_messages {
            return;
        }
        for seconds in outcome.warnings {
            let _ = self
                .outbox
                .send(format!("⏰ 배팅 마감까지 {seconds}초 남았습니다!"));
        }
        if outcome.closed {
            let _ = self.outbox.send("🚨 배팅이 마감되었습니다! 🚨".to_string());
        }
    }
}

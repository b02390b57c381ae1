use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info, warn};

use crate::engine::{commands, BotState};
use crate::models::ChatEvent;
use crate::storage::{persist_dirty, JsonStore};
use crate::workers::Outbox;

/// Worker that consumes chat events strictly in arrival order.
///
/// One event at a time: every mutation of ledger/shop/betting state
/// happens under the single write lock, replies are queued on the outbox
/// after the lock is taken, and the touched documents are persisted after
/// it is released.
pub struct ChatWorker {
    state: Arc<RwLock<BotState>>,
    store: Arc<JsonStore>,
    outbox: Outbox,
    event_rx: mpsc::Receiver<ChatEvent>,
}

impl ChatWorker {
    pub fn new(
        state: Arc<RwLock<BotState>>,
        store: Arc<JsonStore>,
        outbox: Outbox,
        event_rx: mpsc::Receiver<ChatEvent>,
    ) -> Self {
        ChatWorker {
            state,
            store,
            outbox,
            event_rx,
        }
    }

    /// Run the worker loop
    pub async fn run(mut self) {
        info!("Chat worker started");

        while let Some(event) = self.event_rx.recv().await {
            self.process(event).await;
        }

        warn!("Chat event channel closed");
    }

    async fn process(&self, event: ChatEvent) {
        let now = Utc::now();

        let dirty = {
            let mut state = self.state.write().await;
            let (replies, dirty) =
                commands::handle_chat_event(&mut state, &event, now, &mut rand::thread_rng());

            for reply in replies {
                let _ = self.outbox.send(reply);
            }
            dirty
        };

        if dirty.any() {
            let state = self.state.read().await;
            if let Err(e) = persist_dirty(&self.store, &state, dirty) {
                error!("Persistence failed (state kept in memory): {e}");
            }
        }
    }
}

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{error, warn};

use crate::api::ChzzkClient;

/// Handle the mutating side uses to queue outbound chat messages.
///
/// Sends are fire-and-forget: queuing never blocks, the network call
/// happens on the sender worker, and a failure is logged, never retried.
pub type Outbox = mpsc::UnboundedSender<String>;

/// Gap between consecutive sends so the bot does not flood the channel
const SEND_PACING: Duration = Duration::from_millis(300);

/// Worker that drains the outbound queue into the chat-send API
pub struct ChatSender {
    client: ChzzkClient,
    channel_id: String,
    outbox_rx: mpsc::UnboundedReceiver<String>,
}

impl ChatSender {
    pub fn new(
        client: ChzzkClient,
        channel_id: String,
        outbox_rx: mpsc::UnboundedReceiver<String>,
    ) -> Self {
        ChatSender {
            client,
            channel_id,
            outbox_rx,
        }
    }

    /// Run the worker loop
    pub async fn run(mut self) {
        while let Some(message) = self.outbox_rx.recv().await {
            if let Err(e) = self.client.send_chat(&self.channel_id, &message).await {
                error!("Dropped outbound chat message: {e}");
            }
            sleep(SEND_PACING).await;
        }

        warn!("Outbox channel closed");
    }
}

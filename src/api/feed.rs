use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::api::ChzzkClient;
use crate::models::{ChatEvent, ChatEventPayload};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Delivers the channel's chat as an ordered stream of `ChatEvent`s.
///
/// The session service speaks socket.io over websocket; only the subset
/// the chat session actually uses is implemented here: the engine.io open
/// handshake, heartbeats, and `42`-framed CHAT/SYSTEM events. Everything
/// else on the wire is ignored.
pub struct ChatFeed {
    client: ChzzkClient,
    event_tx: mpsc::Sender<ChatEvent>,
}

impl ChatFeed {
    pub fn new(client: ChzzkClient, event_tx: mpsc::Sender<ChatEvent>) -> Self {
        ChatFeed { client, event_tx }
    }

    /// Run the feed forever, reconnecting with a delay on any failure
    pub async fn run(self) {
        loop {
            match self.connect_once().await {
                Ok(()) => warn!("Chat session ended, reconnecting"),
                Err(e) => error!("Chat session failed: {e}"),
            }
            sleep(RECONNECT_DELAY).await;
        }
    }

    async fn connect_once(&self) -> Result<()> {
        let session_url = self.client.create_session().await?;
        let url = socket_url(&session_url);
        debug!("Connecting to chat session: {url}");

        let (mut stream, _) = connect_async(url.as_str())
            .await
            .context("Failed to connect to the session socket")?;
        info!("Chat session socket connected");

        while let Some(frame) = stream.next().await {
            let frame = frame.context("Session socket read failed")?;
            let Message::Text(text) = frame else {
                continue;
            };

            // engine.io framing: open -> join namespace, ping -> pong
            if text.starts_with('0') {
                stream
                    .send(Message::Text("40".to_string()))
                    .await
                    .context("Failed to join the session namespace")?;
                continue;
            }
            if text == "2" {
                stream
                    .send(Message::Text("3".to_string()))
                    .await
                    .context("Failed to answer the session heartbeat")?;
                continue;
            }

            let Some((event, payload)) = parse_event(&text) else {
                continue;
            };

            match event.as_str() {
                "SYSTEM" => self.handle_system(&payload).await,
                "CHAT" => self.handle_chat(&payload).await,
                other => debug!("Ignoring session event {other}"),
            }
        }

        Ok(())
    }

    /// The connected SYSTEM event carries the session key needed to
    /// subscribe this session to the channel's chat
    async fn handle_system(&self, payload: &Value) {
        let payload = materialize(payload);

        if payload["type"].as_str() != Some("connected") {
            return;
        }

        let Some(session_key) = payload["data"]["sessionKey"].as_str() else {
            warn!("Connected event without a session key");
            return;
        };

        match self.client.subscribe_chat(session_key).await {
            Ok(()) => info!("Subscribed to chat events"),
            Err(e) => error!("Chat subscription failed: {e}"),
        }
    }

    async fn handle_chat(&self, payload: &Value) {
        let payload = materialize(payload);

        match serde_json::from_value::<ChatEventPayload>(payload) {
            Ok(raw) => {
                let event = ChatEvent::from(raw);
                debug!("[chat] {}: {}", event.display_name, event.text);
                if self.event_tx.send(event).await.is_err() {
                    warn!("Chat consumer is gone, dropping message");
                }
            }
            Err(e) => warn!("Unparseable chat payload: {e}"),
        }
    }
}

/// Event payloads may arrive as JSON or as a JSON-encoded string
fn materialize(payload: &Value) -> Value {
    match payload {
        Value::String(inner) => serde_json::from_str(inner).unwrap_or(Value::Null),
        other => other.clone(),
    }
}

/// `42["EVENT", payload]` -> (EVENT, payload)
fn parse_event(frame: &str) -> Option<(String, Value)> {
    let body = frame.strip_prefix("42")?;
    let parsed: Value = serde_json::from_str(body).ok()?;
    let array = parsed.as_array()?;

    let event = array.first()?.as_str()?.to_string();
    let payload = array.get(1).cloned().unwrap_or(Value::Null);
    Some((event, payload))
}

/// Turn the session URL into the websocket endpoint
fn socket_url(session_url: &str) -> String {
    let (base, query) = session_url
        .split_once('?')
        .unwrap_or((session_url, ""));

    let base = base
        .replacen("https://", "wss://", 1)
        .replacen("http://", "ws://", 1);
    let base = base.trim_end_matches('/');

    let mut url = format!("{base}/socket.io/?EIO=4&transport=websocket");
    if !query.is_empty() {
        url.push('&');
        url.push_str(query);
    }
    url
}

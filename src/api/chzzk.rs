use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::Settings;

const OPENAPI_BASE: &str = "https://openapi.chzzk.naver.com";

/// Client for the Chzzk Open API: chat send, session create, event
/// subscription. One instance is shared by the sender worker and the feed.
#[derive(Clone)]
pub struct ChzzkClient {
    client: Client,
    access_token: String,
    client_id: String,
    client_secret: String,
}

/// Standard Open API response envelope
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    content: T,
}

#[derive(Debug, Deserialize)]
struct SessionContent {
    url: String,
}

impl ChzzkClient {
    pub fn new(settings: &Settings) -> Self {
        ChzzkClient {
            client: Client::new(),
            access_token: settings.access_token.clone(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
        }
    }

    /// Send one chat message to the channel
    pub async fn send_chat(&self, channel_id: &str, message: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{OPENAPI_BASE}/open/v1/chats/send"))
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({
                "channelId": channel_id,
                "message": message,
            }))
            .send()
            .await
            .context("Failed to send chat message")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Chat send failed: {status} - {text}");
        }

        debug!("[bot] {message}");
        Ok(())
    }

    /// Create a client session and return its socket URL
    pub async fn create_session(&self) -> Result<String> {
        let response = self
            .client
            .get(format!("{OPENAPI_BASE}/open/v1/sessions/auth/client"))
            .header("Client-Id", &self.client_id)
            .header("Client-Secret", &self.client_secret)
            .send()
            .await
            .context("Failed to create chat session")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Session create failed: {status} - {text}");
        }

        let envelope: ApiEnvelope<SessionContent> = response
            .json()
            .await
            .context("Failed to parse session response")?;

        Ok(envelope.content.url)
    }

    /// Subscribe the connected session to the channel's chat events
    pub async fn subscribe_chat(&self, session_key: &str) -> Result<()> {
        let response = self
            .client
            .post(format!(
                "{OPENAPI_BASE}/open/v1/sessions/events/subscribe/chat"
            ))
            .bearer_auth(&self.access_token)
            .query(&[("sessionKey", session_key)])
            .send()
            .await
            .context("Failed to subscribe to chat events")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Chat subscribe failed: {status} - {text}");
        }

        Ok(())
    }
}

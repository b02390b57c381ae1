use serde::Deserialize;

/// One chat message delivered by the session feed, in arrival order.
///
/// `sender_id` is the stable identity key; Chzzk delivers the profile
/// nickname for both fields on the chat-event payload.
#[derive(Debug, Clone)]
pub struct ChatEvent {
    pub sender_id: String,
    pub display_name: String,
    pub text: String,
}

/// Raw CHAT event payload from the session service
#[derive(Debug, Deserialize)]
pub struct ChatEventPayload {
    pub profile: ChatProfile,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatProfile {
    pub nickname: String,
}

impl From<ChatEventPayload> for ChatEvent {
    fn from(payload: ChatEventPayload) -> Self {
        ChatEvent {
            sender_id: payload.profile.nickname.clone(),
            display_name: payload.profile.nickname,
            text: payload.content,
        }
    }
}
